//! Count- and time-triggered batching.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::core::item::{channel, Stream};
use crate::core::stage::{finish, Output};
use crate::core::Options;
use crate::pipeline::Pipeline;

/// Default upper bound on how long a partial batch waits before being emitted.
pub const DEFAULT_BATCH_MAX_WAIT: Duration = Duration::from_secs(1);

const STAGE: &str = "batch";

/// Group values into batches of up to `n`.
///
/// A batch is emitted as soon as it holds `n` values, or once `max_wait`
/// passed since the previous emission with values pending. Error items are
/// emitted immediately and never folded into a batch; with stop-on-error the
/// pending batch is flushed right after the error and the stage ends. When
/// the input closes, a non-empty pending batch is flushed once.
///
/// Batching is inherently sequential: `pool_size` is ignored, the buffer size
/// and before-close hook are honored.
///
/// # Panics
///
/// Panics if `n` is zero, `max_wait` is zero, or `opts` is invalid.
///
/// # Examples
///
/// ```rust
/// use channelweld::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() {
/// let p = of(vec![1, 2, 3, 4, 5]).pipe(batch(2, DEFAULT_BATCH_MAX_WAIT, Options::new()));
///
/// let batches: Vec<Vec<i32>> = collect(p.generate(Context::new()))
///     .await
///     .into_iter()
///     .map(|i| i.unwrap())
///     .collect();
/// assert_eq!(batches, vec![vec![1, 2], vec![3, 4], vec![5]]);
/// # }
/// ```
pub fn batch<T: Send + 'static>(n: usize, max_wait: Duration, opts: Options) -> Pipeline<T, Vec<T>> {
    assert!(n > 0, "{STAGE}: batch size must be greater than 0");
    assert!(!max_wait.is_zero(), "{STAGE}: max wait must be greater than 0");
    opts.assert_valid(STAGE);

    Pipeline::new(move |ctx, input: Stream<T>| {
        let (tx, rx) = channel(opts.buffer_size);
        let stop_on_error = opts.stop_on_error;
        let hook = opts.hook();

        tokio::spawn(async move {
            let cancelled = Arc::new(AtomicBool::new(false));
            // Stop-on-error is handled here so the pending batch can still be flushed.
            let out = Output::new(STAGE, ctx.clone(), tx.clone(), cancelled.clone(), false);

            let mut pending: Vec<T> = Vec::with_capacity(n);
            let timer = sleep(max_wait);
            tokio::pin!(timer);

            debug!(stage = STAGE, n, ?max_wait, "stage started");

            loop {
                tokio::select! {
                    biased;
                    _ = ctx.done() => {
                        out.mark_cancelled();
                        break;
                    }
                    item = input.recv_async() => match item {
                        Ok(Ok(value)) => {
                            pending.push(value);
                            if pending.len() >= n {
                                let full = mem::replace(&mut pending, Vec::with_capacity(n));
                                if !out.send_value(full).await {
                                    break;
                                }
                                timer.as_mut().reset(Instant::now() + max_wait);
                            }
                        }
                        Ok(Err(e)) => {
                            if !out.send_error(e).await {
                                break;
                            }
                            if stop_on_error {
                                debug!(stage = STAGE, "stopping after error");
                                if !pending.is_empty() {
                                    out.send_value(mem::take(&mut pending)).await;
                                }
                                break;
                            }
                        }
                        Err(_) => {
                            if !pending.is_empty() {
                                out.send_value(mem::take(&mut pending)).await;
                            }
                            break;
                        }
                    },
                    _ = &mut timer => {
                        if !pending.is_empty() {
                            let partial = mem::replace(&mut pending, Vec::with_capacity(n));
                            if !out.send_value(partial).await {
                                break;
                            }
                        }
                        timer.as_mut().reset(Instant::now() + max_wait);
                    }
                }
            }

            drop(out);
            finish(STAGE, &ctx, &tx, hook, cancelled.load(Ordering::Acquire)).await;
        });

        rx
    })
}
