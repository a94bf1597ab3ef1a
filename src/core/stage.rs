//! Worker-pool runtime shared by the pooled combinators.
//!
//! A stage owns its output channel. `pool_size` workers write to it through
//! [`Output`] handles; a coordinator task joins them, runs the before-close
//! hook, emits the terminal cancellation item if cancellation was observed,
//! and finally drops the last sender, which closes the stream.

use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, debug_span, error, warn, Instrument};

use crate::core::item::{channel, Item, Stream, StreamSender};
use crate::core::options::BeforeClose;
use crate::core::{Context, Options};
use crate::error::Error;

/// Write side of a stage's output, handed to user functions.
///
/// Every send watches the context. Once [`send`](Self::send) returns `false`
/// the caller must stop producing: the context is done, the consumer went
/// away, or an error was delivered under stop-on-error.
pub struct Output<U> {
    stage: &'static str,
    ctx: Context,
    tx: StreamSender<U>,
    /// Cancellation observed by any worker of the stage
    cancelled: Arc<AtomicBool>,
    /// This worker must stop
    halted: Arc<AtomicBool>,
    stop_on_error: bool,
}

impl<U> Clone for Output<U> {
    fn clone(&self) -> Self {
        Self {
            stage: self.stage,
            ctx: self.ctx.clone(),
            tx: self.tx.clone(),
            cancelled: self.cancelled.clone(),
            halted: self.halted.clone(),
            stop_on_error: self.stop_on_error,
        }
    }
}

impl<U: Send + 'static> Output<U> {
    pub(crate) fn new(
        stage: &'static str,
        ctx: Context,
        tx: StreamSender<U>,
        cancelled: Arc<AtomicBool>,
        stop_on_error: bool,
    ) -> Self {
        Self {
            stage,
            ctx,
            tx,
            cancelled,
            halted: Arc::new(AtomicBool::new(false)),
            stop_on_error,
        }
    }

    /// Deliver an item downstream. Returns whether the caller may keep going.
    pub async fn send(&self, item: Item<U>) -> bool {
        if self.is_halted() {
            return false;
        }

        let failed = item.is_err();

        tokio::select! {
            biased;
            _ = self.ctx.done() => {
                self.mark_cancelled();
                false
            }
            sent = self.tx.send_async(item) => {
                if sent.is_err() {
                    self.halt();
                    return false;
                }

                #[cfg(feature = "metrics")]
                {
                    metrics::counter!("channelweld_items_emitted_total", "stage" => self.stage)
                        .increment(1);
                    if failed {
                        metrics::counter!("channelweld_errors_emitted_total", "stage" => self.stage)
                            .increment(1);
                    }
                }

                if failed && self.stop_on_error {
                    debug!(stage = self.stage, "worker stopping after error");
                    self.halt();
                    return false;
                }

                true
            }
        }
    }

    /// Deliver a value.
    pub async fn send_value(&self, value: U) -> bool {
        self.send(Ok(value)).await
    }

    /// Deliver an error item.
    pub async fn send_error(&self, error: Error) -> bool {
        self.send(Err(error)).await
    }

    /// The stage's context.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Whether this worker must stop producing.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
            || self.cancelled.load(Ordering::Acquire)
            || self.tx.is_disconnected()
    }

    /// Record that the stage saw its context end; the stage then emits one
    /// terminal item before closing.
    pub(crate) fn mark_cancelled(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            debug!(stage = self.stage, "cancellation observed");
        }
    }

    pub(crate) fn halt(&self) {
        self.halted.store(true, Ordering::Release);
    }

    /// Wait for the next upstream item, or `None` once the input closed or
    /// the context ended.
    pub(crate) async fn recv<T>(&self, input: &Stream<T>) -> Option<Item<T>> {
        tokio::select! {
            biased;
            _ = self.ctx.done() => {
                self.mark_cancelled();
                None
            }
            item = input.recv_async() => item.ok(),
        }
    }
}

/// Spawn a stage of `opts.pool_size` workers and return its output stream.
///
/// `worker` is called once per pool slot with that slot's [`Output`].
pub(crate) fn spawn_pool<U, W, Fut>(
    stage: &'static str,
    ctx: Context,
    opts: &Options,
    worker: W,
) -> Stream<U>
where
    U: Send + 'static,
    W: Fn(Output<U>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = channel(opts.buffer_size);
    let pool_size = opts.pool_size;
    let stop_on_error = opts.stop_on_error;
    let hook = opts.hook();
    let cancelled = Arc::new(AtomicBool::new(false));

    tokio::spawn(async move {
        debug!(stage, pool_size, "stage started");

        let workers = (0..pool_size)
            .map(|worker_id| {
                let out = Output::new(stage, ctx.clone(), tx.clone(), cancelled.clone(), stop_on_error);
                tokio::spawn(worker(out).instrument(debug_span!("worker", stage, worker_id)))
            })
            .collect::<Vec<_>>();

        for joined in join_all(workers).await {
            if let Err(e) = joined {
                error!(stage, error = %e, "worker panicked");
                let _ = tx.send_async(Err(Error::from(e))).await;
            }
        }

        finish(stage, &ctx, &tx, hook, cancelled.load(Ordering::Acquire)).await;
    });

    rx
}

/// Close sequence of a stage, run after every worker is done: hook first,
/// then the terminal cancellation item. The stream closes when `tx` and the
/// workers' senders are dropped.
pub(crate) async fn finish<U>(
    stage: &'static str,
    ctx: &Context,
    tx: &StreamSender<U>,
    hook: Option<BeforeClose>,
    cancelled: bool,
) {
    if let Some(hook) = hook {
        if let Err(e) = hook(ctx.clone()).await {
            warn!(stage, error = %e, "before-close hook failed");
            let _ = tx.send_async(Err(e)).await;
        }
    }

    if cancelled {
        let _ = tx.send_async(Err(ctx.cancellation_error())).await;
    }

    debug!(stage, cancelled, "stage finished");
}
