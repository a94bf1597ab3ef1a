//! The data model: items and the streams that carry them.

use crate::error::Result;

/// A single element of a stream: a value or an error.
///
/// Errors are data. A consumer inspects the `Result` before trusting the
/// value, and an error item does not end the stream; only closing does.
pub type Item<T> = Result<T>;

/// The read side of a stream of [`Item`]s.
///
/// The receiver is clonable: several workers may pull from one stream, each
/// item going to exactly one of them. The stream ends once every
/// [`StreamSender`] is dropped.
pub type Stream<T> = flume::Receiver<Item<T>>;

/// The write side of a [`Stream`].
pub type StreamSender<T> = flume::Sender<Item<T>>;

/// Create a stream of capacity `buffer_size`.
///
/// With `buffer_size` 0 the stream is unbuffered: a send completes only once
/// a consumer has taken the item.
pub fn channel<T>(buffer_size: usize) -> (StreamSender<T>, Stream<T>) {
    flume::bounded(buffer_size)
}

/// An already closed stream, the input of generators.
pub fn closed<T>() -> Stream<T> {
    let (_, rx) = channel(0);
    rx
}
