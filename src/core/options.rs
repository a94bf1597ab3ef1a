//! Stage configuration shared by every combinator.

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::core::Context;
use crate::error::{Error, Result};

/// Cleanup callback run once per stage run, after all workers joined and
/// before the output stream closes. An `Err` is emitted as a final item.
pub type BeforeClose = Arc<dyn Fn(Context) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Configuration for a pipeline stage.
///
/// Options are plain values: every combinator copies the value it was given
/// at construction time, so there is no shared mutable default.
///
/// # Examples
///
/// ```rust
/// use channelweld::core::Options;
///
/// let opts = Options::new()
///     .pool_size(4)
///     .buffer_size(16)
///     .stop_on_error(true);
///
/// assert!(opts.validate().is_ok());
/// assert_eq!(opts.pool_size, 4);
/// ```
#[derive(Clone)]
pub struct Options {
    /// Number of concurrent workers pulling from the input
    pub pool_size: usize,
    /// Capacity of the output channel; 0 is unbuffered
    pub buffer_size: usize,
    /// Halt a worker after it emitted an error item
    pub stop_on_error: bool,
    before_close: Option<BeforeClose>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            pool_size: 1,
            buffer_size: 0,
            stop_on_error: false,
            before_close: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("pool_size", &self.pool_size)
            .field("buffer_size", &self.buffer_size)
            .field("stop_on_error", &self.stop_on_error)
            .field("before_close", &self.before_close.is_some())
            .finish()
    }
}

impl Options {
    /// Default options: one worker, unbuffered output, keep going on errors, no hook
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of workers
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the output buffer size
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set whether a worker stops after emitting an error
    pub fn stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    /// Add a before-close hook.
    ///
    /// Calling this twice chains the hooks: the second one only runs if the
    /// first one succeeded.
    pub fn before_close<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let hook: BeforeClose =
            Arc::new(move |ctx| -> BoxFuture<'static, Result<()>> { Box::pin(f(ctx)) });

        self.before_close = Some(match self.before_close.take() {
            Some(first) => {
                let chained: BeforeClose =
                    Arc::new(move |ctx: Context| -> BoxFuture<'static, Result<()>> {
                        let first = first.clone();
                        let second = hook.clone();
                        Box::pin(async move {
                            first(ctx.clone()).await?;
                            second(ctx).await
                        })
                    });
                chained
            }
            None => hook,
        });
        self
    }

    pub(crate) fn hook(&self) -> Option<BeforeClose> {
        self.before_close.clone()
    }

    /// Check the options for values no stage can run with.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size < 1 {
            return Err(Error::invalid_options("pool size must be greater than 0"));
        }

        Ok(())
    }

    /// Validate at construction time; configuration errors never reach run time.
    pub(crate) fn assert_valid(&self, stage: &str) {
        if let Err(e) = self.validate() {
            panic!("{stage}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn defaults() {
        let opts = Options::default();
        assert_eq!(opts.pool_size, 1);
        assert_eq!(opts.buffer_size, 0);
        assert!(!opts.stop_on_error);
        assert!(opts.hook().is_none());
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let err = Options::new().pool_size(0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidOptions(_)));
    }

    #[test]
    #[should_panic(expected = "pool size must be greater than 0")]
    fn assert_valid_panics() {
        Options::new().pool_size(0).assert_valid("map");
    }

    #[tokio::test]
    async fn hooks_are_chained_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let first = calls.clone();
        let second = calls.clone();

        let opts = Options::new()
            .before_close(move |_| {
                let calls = first.clone();
                async move {
                    assert_eq!(calls.fetch_add(1, Ordering::SeqCst), 0);
                    Ok(())
                }
            })
            .before_close(move |_| {
                let calls = second.clone();
                async move {
                    assert_eq!(calls.fetch_add(1, Ordering::SeqCst), 1);
                    Ok(())
                }
            });

        let hook = opts.hook().unwrap();
        hook(Context::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_first_hook_skips_second() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();

        let opts = Options::new()
            .before_close(|_| async { Err(Error::custom("flush failed")) })
            .before_close(move |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });

        let hook = opts.hook().unwrap();
        assert!(hook(Context::new()).await.is_err());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
