//! Fan-out and fan-in: routing items between several streams.
//!
//! [`tee_n`] broadcasts one stream to N lock-stepped copies, [`merge`] joins
//! N streams into one, and [`segregate`] splits one stream in two by
//! predicate. [`connect`] and [`with_error_handler`] build pipelines on top
//! of them.

use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, debug_span, error, warn, Instrument};

use crate::core::item::{channel, Item, Stream, StreamSender};
use crate::core::stage::{finish, Output};
use crate::core::Context;
use crate::error::Error;
use crate::pipeline::{Pipeline, Sink};

/// Outcome of writing one item to a branch.
enum Delivery {
    Sent,
    /// The branch's consumer dropped its stream
    Gone,
    Cancelled,
}

async fn deliver<T>(ctx: &Context, tx: &StreamSender<T>, item: Item<T>) -> Delivery {
    tokio::select! {
        biased;
        _ = ctx.done() => Delivery::Cancelled,
        sent = tx.send_async(item) => match sent {
            Ok(()) => Delivery::Sent,
            Err(_) => Delivery::Gone,
        },
    }
}

/// Send the terminal cancellation item to every remaining branch.
async fn broadcast_cancellation<'a, T: 'a>(
    ctx: &Context,
    senders: impl Iterator<Item = &'a StreamSender<T>>,
) {
    let err = ctx.cancellation_error();
    join_all(senders.map(|tx| {
        let err = err.clone();
        async move {
            let _ = tx.send_async(Err(err)).await;
        }
    }))
    .await;
}

/// Broadcast `input` to `n` streams.
///
/// A single task reads one item and writes a clone of it to every output
/// before reading the next, so the slowest consumer sets the pace for all of
/// them. Outputs close together when the input closes; on cancellation each
/// output first receives one terminal item. A dropped output is skipped, and
/// once all of them are dropped the task stops reading.
///
/// # Panics
///
/// Panics if `n` is zero.
///
/// # Examples
///
/// ```rust
/// use channelweld::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() {
/// let ctx = Context::new();
/// let copies = tee_n(ctx.clone(), of(vec![1, 2]).generate(ctx), 3);
///
/// // Branches advance in lock step, so drain them concurrently.
/// let results = futures::future::join_all(copies.into_iter().map(collect)).await;
/// assert!(results.iter().all(|items| items.len() == 2));
/// # }
/// ```
pub fn tee_n<T>(ctx: Context, input: Stream<T>, n: usize) -> Vec<Stream<T>>
where
    T: Clone + Send + 'static,
{
    assert!(n > 0, "tee: number of outputs must be greater than 0");

    let (senders, streams): (Vec<StreamSender<T>>, Vec<Stream<T>>) = (0..n).map(|_| channel(0)).unzip();

    tokio::spawn(
        async move {
            let mut branches: Vec<Option<StreamSender<T>>> = senders.into_iter().map(Some).collect();

            let cancelled = 'run: loop {
                let item = tokio::select! {
                    biased;
                    _ = ctx.done() => break true,
                    item = input.recv_async() => match item {
                        Ok(item) => item,
                        Err(_) => break false,
                    },
                };

                for slot in branches.iter_mut() {
                    let delivery = match slot {
                        Some(tx) => deliver(&ctx, tx, item.clone()).await,
                        None => continue,
                    };
                    match delivery {
                        Delivery::Sent => {}
                        Delivery::Gone => *slot = None,
                        Delivery::Cancelled => break 'run true,
                    }
                }

                if branches.iter().all(Option::is_none) {
                    debug!("every tee branch dropped");
                    break false;
                }
            };

            if cancelled {
                debug!("tee observed cancellation");
                broadcast_cancellation(&ctx, branches.iter().flatten()).await;
            }
        }
        .instrument(debug_span!("tee", n)),
    );

    streams
}

/// Broadcast `input` to two streams. See [`tee_n`].
pub fn tee<T>(ctx: Context, input: Stream<T>) -> (Stream<T>, Stream<T>)
where
    T: Clone + Send + 'static,
{
    let mut streams = tee_n(ctx, input, 2);
    let second = streams.pop();
    let first = streams.pop();
    match (first, second) {
        (Some(first), Some(second)) => (first, second),
        _ => unreachable!("tee_n returns exactly the requested number of streams"),
    }
}

/// Merge several streams into one.
///
/// One forwarder per input; order within an input is kept, order across
/// inputs is not. The output closes once every input closed, or promptly on
/// cancellation, after one terminal item.
pub fn merge<T: Send + 'static>(ctx: Context, inputs: Vec<Stream<T>>) -> Stream<T> {
    const STAGE: &str = "merge";

    let (tx, rx) = channel(0);
    let cancelled = Arc::new(AtomicBool::new(false));

    tokio::spawn(async move {
        debug!(stage = STAGE, inputs = inputs.len(), "stage started");

        let forwarders = inputs
            .into_iter()
            .enumerate()
            .map(|(input_id, input)| {
                let out = Output::new(STAGE, ctx.clone(), tx.clone(), cancelled.clone(), false);
                tokio::spawn(
                    async move {
                        while let Some(item) = out.recv(&input).await {
                            if !out.send(item).await {
                                break;
                            }
                        }
                    }
                    .instrument(debug_span!("forwarder", stage = STAGE, input_id)),
                )
            })
            .collect::<Vec<_>>();

        for joined in join_all(forwarders).await {
            if let Err(e) = joined {
                error!(stage = STAGE, error = %e, "forwarder panicked");
                let _ = tx.send_async(Err(Error::from(e))).await;
            }
        }

        finish(STAGE, &ctx, &tx, None, cancelled.load(Ordering::Acquire)).await;
    });

    rx
}

/// Split `input` by `predicate`: matching items go to the first stream, the
/// rest to the second.
///
/// A single task does the routing, so a stalled consumer on one side stalls
/// both. Items routed to a dropped side are discarded. On cancellation both
/// sides receive one terminal item.
pub fn segregate<T, P>(ctx: Context, input: Stream<T>, predicate: P) -> (Stream<T>, Stream<T>)
where
    T: Send + 'static,
    P: Fn(&Item<T>) -> bool + Send + 'static,
{
    let (matched_tx, matched) = channel(0);
    let (rest_tx, rest) = channel(0);

    tokio::spawn(
        async move {
            let mut sides = [Some(matched_tx), Some(rest_tx)];

            let cancelled = loop {
                let item = tokio::select! {
                    biased;
                    _ = ctx.done() => break true,
                    item = input.recv_async() => match item {
                        Ok(item) => item,
                        Err(_) => break false,
                    },
                };

                let slot = &mut sides[if predicate(&item) { 0 } else { 1 }];
                let delivery = match slot {
                    Some(tx) => deliver(&ctx, tx, item).await,
                    None => continue,
                };
                match delivery {
                    Delivery::Sent => {}
                    Delivery::Gone => *slot = None,
                    Delivery::Cancelled => break true,
                }

                if sides.iter().all(Option::is_none) {
                    break false;
                }
            };

            if cancelled {
                debug!("segregate observed cancellation");
                broadcast_cancellation(&ctx, sides.iter().flatten()).await;
            }
        }
        .instrument(debug_span!("segregate")),
    );

    (matched, rest)
}

/// Run several sinks over the same input.
///
/// The input is teed under a context detached from cancellation, so each
/// branch decides on its own when to stop; the sinks themselves run with the
/// caller's context. Error items of every branch are forwarded to the
/// returned stream, with branch cancellation items collapsed into a single
/// terminal item. The stream closes once every branch finished.
///
/// # Panics
///
/// Panics if `sinks` is empty.
pub fn connect<T>(sinks: Vec<Sink<T>>) -> Sink<T>
where
    T: Clone + Send + 'static,
{
    assert!(!sinks.is_empty(), "connect: at least one sink is required");

    Pipeline::new(move |ctx: Context, input: Stream<T>| {
        let (tx, rx) = channel::<()>(0);
        let branches = tee_n(ctx.without_cancel(), input, sinks.len());
        let outputs: Vec<Stream<()>> = sinks
            .iter()
            .zip(branches)
            .map(|(sink, branch)| sink.run(ctx.clone(), branch))
            .collect();

        tokio::spawn(
            async move {
                let forwarders = outputs.into_iter().map(|output| {
                    let tx = tx.clone();
                    async move {
                        let mut terminal = None;
                        while let Ok(item) = output.recv_async().await {
                            match item {
                                Err(e) if e.is_cancellation() => {
                                    terminal.get_or_insert(e);
                                }
                                item => {
                                    // Keep draining the branch even if nobody listens.
                                    let _ = tx.send_async(item).await;
                                }
                            }
                        }
                        terminal
                    }
                });

                let terminal = join_all(forwarders).await.into_iter().flatten().next();
                if let Some(e) = terminal {
                    debug!("connect observed cancellation");
                    let _ = tx.send_async(Err(e)).await;
                }
            }
            .instrument(debug_span!("connect")),
        );

        rx
    })
}

/// Run `p` and route its data errors to `handler`.
///
/// Values and the terminal cancellation item stay on the returned stream;
/// every other error goes to `handler`, a sink of errors run under a context
/// detached from cancellation. Both outputs are written under the caller's
/// context: once it is done the stage stops routing, and the returned stream
/// gets one terminal item after the handler finished. Errors the handler
/// itself reports, or that could not be handed to it, are logged.
pub fn with_error_handler<T, U>(p: Pipeline<T, U>, handler: Sink<Error>) -> Pipeline<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    Pipeline::new(move |ctx: Context, input: Stream<T>| {
        let (tx, rx) = channel::<U>(0);
        let (err_tx, err_rx) = channel::<Error>(0);

        let handled = handler.run(ctx.without_cancel(), err_rx);
        let drained = tokio::spawn(async move {
            while let Ok(item) = handled.recv_async().await {
                if let Err(e) = item {
                    warn!(error = %e, "error handler failed");
                }
            }
        });

        let source = p.run(ctx.clone(), input);

        tokio::spawn(
            async move {
                let mut terminal_sent = false;
                let cancelled = loop {
                    let item = match source.recv_async().await {
                        Ok(item) => item,
                        Err(_) => break false,
                    };

                    match item {
                        Err(e) if !e.is_cancellation() => match deliver(&ctx, &err_tx, Ok(e.clone())).await {
                            Delivery::Sent => {}
                            Delivery::Gone => warn!(error = %e, "error handler gone, error dropped"),
                            Delivery::Cancelled => {
                                warn!(error = %e, "error dropped on cancellation");
                                break true;
                            }
                        },
                        item => {
                            let terminal = item.is_err();
                            match deliver(&ctx, &tx, item).await {
                                Delivery::Sent => terminal_sent |= terminal,
                                Delivery::Gone => {
                                    debug!("consumer dropped the stream");
                                    break false;
                                }
                                Delivery::Cancelled => break true,
                            }
                        }
                    }
                };

                drop(source);
                drop(err_tx);
                if let Err(e) = drained.await {
                    error!(error = %e, "error handler panicked");
                    let _ = tx.send_async(Err(Error::from(e))).await;
                }

                if cancelled && !terminal_sent {
                    debug!("with_error_handler observed cancellation");
                    let _ = tx.send_async(Err(ctx.cancellation_error())).await;
                }
            }
            .instrument(debug_span!("with_error_handler")),
        );

        rx
    })
}
