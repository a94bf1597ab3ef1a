//! Error types for the stream-processing engine.
//!
//! Errors travel through streams as data (`Err` items), so [`Error`] is
//! `Clone`: foreign errors are held behind an `Arc`.

use std::sync::Arc;

/// The main error type carried by stream items and returned by configuration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A generator or [`Source`](crate::core::Source) failed to produce an item
    #[error("generator error: {0}")]
    Generator(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// A sink or [`Destination`](crate::core::Destination) failed to consume an item
    #[error("sink error: {0}")]
    Sink(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// A user transform failed
    #[error("processor error: {0}")]
    Processor(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// An I/O operation failed
    #[error("io error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// A CSV record could not be read or written
    #[error("csv error: {0}")]
    Csv(#[source] Arc<csv_async::Error>),

    /// The context was cancelled
    #[error("context cancelled")]
    Cancelled,

    /// The context deadline passed
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Sentinel returned by generator functions to end their stream cleanly.
    ///
    /// It is never emitted as an item.
    #[error("end of stream")]
    EndOfStream,

    /// Pipeline options failed validation
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// A worker task panicked
    #[error("worker panicked: {0}")]
    Panicked(String),

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),
}

// Convenience constructors
impl Error {
    /// Create a generator error from any error type
    pub fn generator<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Generator(Arc::new(error))
    }

    /// Create a sink error from any error type
    pub fn sink<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Sink(Arc::new(error))
    }

    /// Create a processor error from any error type
    pub fn processor<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Processor(Arc::new(error))
    }

    /// Create an invalid options error
    pub fn invalid_options<S: Into<String>>(message: S) -> Self {
        Error::InvalidOptions(message.into())
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }

    /// True for the errors a context reports once it is done.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }

    /// True for the end-of-stream sentinel.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }
}

// Common conversions
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}

impl From<csv_async::Error> for Error {
    fn from(e: csv_async::Error) -> Self {
        Error::Csv(Arc::new(e))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Panicked(e.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Error {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Error::Custom(e.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Custom(s.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Helper trait for converting foreign errors into our Error type
pub trait IntoError<T> {
    fn into_generator_error(self) -> Result<T>;
    fn into_sink_error(self) -> Result<T>;
    fn into_processor_error(self) -> Result<T>;
}

impl<T, E> IntoError<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_generator_error(self) -> Result<T> {
        self.map_err(Error::generator)
    }

    fn into_sink_error(self) -> Result<T> {
        self.map_err(Error::sink)
    }

    fn into_processor_error(self) -> Result<T> {
        self.map_err(Error::processor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_errors_are_classified() {
        assert!(Error::Cancelled.is_cancellation());
        assert!(Error::DeadlineExceeded.is_cancellation());
        assert!(!Error::EndOfStream.is_cancellation());
        assert!(!Error::custom("boom").is_cancellation());
    }

    #[test]
    fn foreign_errors_keep_their_message() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: Error = Err::<(), _>(io).into_processor_error().unwrap_err();
        assert_eq!(err.to_string(), "processor error: disk gone");
    }

    #[test]
    fn wrapped_errors_expose_their_cause() {
        use std::error::Error as _;

        let err = Error::sink(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        let cause = err.source().expect("sink errors carry a source");
        assert_eq!(cause.to_string(), "disk gone");
        assert!(Error::custom("plain").source().is_none());
    }

    #[test]
    fn errors_are_clonable() {
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "x"));
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }
}
