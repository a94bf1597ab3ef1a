//! Utility functions: the cancellation wrapper and draining helpers.

use tracing::trace;

use crate::core::item::{channel, Item, Stream};
use crate::core::Context;

/// Wrap `input` so it also ends promptly when `ctx` is done.
///
/// Items are forwarded unchanged. Once cancellation is observed, exactly one
/// `Err(ctx.err())` item is emitted and the stream closes; nothing is
/// forwarded after that, and a pending forward never outlives the context.
///
/// # Examples
///
/// ```rust
/// use channelweld::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() {
/// let ctx = Context::new();
/// let (tx, rx) = channel::<i32>(0);
/// let guarded = or_done(ctx.clone(), rx);
///
/// ctx.cancel();
/// let items = collect(guarded).await;
/// assert!(matches!(items.as_slice(), [Err(Error::Cancelled)]));
/// drop(tx);
/// # }
/// ```
pub fn or_done<T: Send + 'static>(ctx: Context, input: Stream<T>) -> Stream<T> {
    let (tx, rx) = channel(0);

    tokio::spawn(async move {
        let cancelled = loop {
            let item = tokio::select! {
                biased;
                _ = ctx.done() => break true,
                item = input.recv_async() => match item {
                    Ok(item) => item,
                    Err(_) => break false,
                },
            };

            tokio::select! {
                biased;
                _ = ctx.done() => break true,
                sent = tx.send_async(item) => {
                    if sent.is_err() {
                        break false;
                    }
                }
            }
        };

        if cancelled {
            trace!("or_done observed cancellation");
            let _ = tx.send_async(Err(ctx.cancellation_error())).await;
        }
    });

    rx
}

/// Drain a stream into a vector.
pub async fn collect<T>(stream: Stream<T>) -> Vec<Item<T>> {
    let mut items = Vec::new();
    while let Ok(item) = stream.recv_async().await {
        items.push(item);
    }
    items
}

/// Drain a stream into a vector, stopping early once `ctx` is done.
///
/// When cut off, the last item is the cancellation error.
pub async fn collect_with_cancel<T: Send + 'static>(ctx: Context, stream: Stream<T>) -> Vec<Item<T>> {
    collect(or_done(ctx, stream)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::time::Duration;

    #[tokio::test]
    async fn forwards_everything_when_not_cancelled() {
        let (tx, rx) = channel::<i32>(4);
        for i in 0..3 {
            tx.send_async(Ok(i)).await.unwrap();
        }
        tx.send_async(Err(Error::custom("data"))).await.unwrap();
        drop(tx);

        let items = collect(or_done(Context::new(), rx)).await;
        assert_eq!(items.len(), 4);
        assert!(matches!(items[2], Ok(2)));
        assert!(matches!(&items[3], Err(Error::Custom(_))));
    }

    #[tokio::test]
    async fn cancellation_emits_exactly_one_terminal_item() {
        let ctx = Context::new();
        let (tx, rx) = channel::<i32>(0);
        let guarded = or_done(ctx.clone(), rx);

        tx.send_async(Ok(1)).await.unwrap();
        assert!(matches!(guarded.recv_async().await, Ok(Ok(1))));

        ctx.cancel();

        let rest = collect(guarded).await;
        assert_eq!(rest.len(), 1);
        assert!(matches!(rest[0], Err(Error::Cancelled)));
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_reported_as_deadline_exceeded() {
        let ctx = Context::new().with_timeout(Duration::from_millis(10));
        let (_tx, rx) = channel::<i32>(0);

        let items = collect_with_cancel(ctx, rx).await;
        assert!(matches!(items.as_slice(), [Err(Error::DeadlineExceeded)]));
    }

    #[tokio::test]
    async fn stops_when_consumer_goes_away() {
        let (tx, rx) = channel::<i32>(0);
        let guarded = or_done(Context::new(), rx);
        drop(guarded);

        tx.send_async(Ok(1)).await.unwrap();
        // The forwarder drops its receiver once its own send fails.
        tokio::time::timeout(Duration::from_secs(1), async {
            while tx.send_async(Ok(2)).await.is_ok() {}
        })
        .await
        .unwrap();
    }
}
