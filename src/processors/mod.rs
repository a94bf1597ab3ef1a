//! Processor combinators: per-item transformations run on a worker pool.
//!
//! [`for_each_output`] is the engine; [`map`], [`filter`], [`filter_map`] and
//! [`for_each`] are thin wrappers deciding what to write for each item.

pub mod batch;
pub mod flatten;

pub use batch::{batch, DEFAULT_BATCH_MAX_WAIT};
pub use flatten::flatten;

use std::future::Future;
use std::sync::Arc;

use crate::core::stage::{spawn_pool, Output};
use crate::core::{Context, Item, Options, Stream};
use crate::error::Result;
use crate::pipeline::{Pipeline, Sink};

/// Apply `f` to every item, letting it write any number of items to the output.
///
/// `opts.pool_size` workers pull from the input concurrently; with more than
/// one worker the output order across workers is unspecified. The output
/// closes once every worker is done and the before-close hook ran.
///
/// # Panics
///
/// Panics if `opts` is invalid.
///
/// # Examples
///
/// ```rust
/// use channelweld::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() {
/// // Emit every value twice.
/// let twice = for_each_output(
///     |_, item: Item<u8>, out: Output<u8>| async move {
///         match item {
///             Ok(v) => {
///                 let _ = out.send_value(v).await && out.send_value(v).await;
///             }
///             Err(e) => {
///                 out.send_error(e).await;
///             }
///         }
///     },
///     Options::new(),
/// );
///
/// let items = collect(of(vec![1, 2]).pipe(twice).generate(Context::new())).await;
/// assert_eq!(items.len(), 4);
/// # }
/// ```
pub fn for_each_output<T, U, F, Fut>(f: F, opts: Options) -> Pipeline<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(Context, Item<T>, Output<U>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    pooled("for_each_output", f, opts)
}

/// [`for_each_output`] reporting under `stage` in logs and metrics.
pub(crate) fn pooled<T, U, F, Fut>(stage: &'static str, f: F, opts: Options) -> Pipeline<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(Context, Item<T>, Output<U>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    opts.assert_valid(stage);
    let f = Arc::new(f);

    Pipeline::new(move |ctx, input: Stream<T>| {
        let f = f.clone();
        spawn_pool(stage, ctx, &opts, move |out: Output<U>| {
            let f = f.clone();
            let input = input.clone();
            async move {
                while let Some(item) = out.recv(&input).await {
                    f(out.context().clone(), item, out.clone()).await;
                    if out.is_halted() {
                        break;
                    }
                }
            }
        })
    })
}

/// Transform every item into exactly one output item.
///
/// `f` sees upstream errors too; `item?` propagates them unchanged.
///
/// # Panics
///
/// Panics if `opts` is invalid.
pub fn map<T, U, F, Fut>(f: F, opts: Options) -> Pipeline<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(Context, Item<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<U>> + Send + 'static,
{
    pooled(
        "map",
        move |ctx, item, out: Output<U>| {
            let mapped = f(ctx, item);
            async move {
                out.send(mapped.await).await;
            }
        },
        opts,
    )
}

/// Keep the items for which `f` returns `Ok(true)`, unchanged.
///
/// An `Err` from `f` is emitted in place of the item; with stop-on-error
/// the worker halts after emitting it.
///
/// # Panics
///
/// Panics if `opts` is invalid.
pub fn filter<T, F>(f: F, opts: Options) -> Pipeline<T, T>
where
    T: Send + 'static,
    F: Fn(&Context, &Item<T>) -> Result<bool> + Send + Sync + 'static,
{
    pooled(
        "filter",
        move |ctx, item, out: Output<T>| {
            let verdict = f(&ctx, &item);
            async move {
                match verdict {
                    Ok(true) => {
                        out.send(item).await;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        out.send_error(e).await;
                    }
                }
            }
        },
        opts,
    )
}

/// Filter and transform in one pass.
///
/// `Ok(Some(v))` emits `v`, `Ok(None)` drops the item, `Err(e)` emits `e`.
///
/// # Panics
///
/// Panics if `opts` is invalid.
pub fn filter_map<T, U, F, Fut>(f: F, opts: Options) -> Pipeline<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(Context, Item<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<U>>> + Send + 'static,
{
    pooled(
        "filter_map",
        move |ctx, item, out: Output<U>| {
            let kept = f(ctx, item);
            async move {
                match kept.await {
                    Ok(Some(v)) => {
                        out.send_value(v).await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        out.send_error(e).await;
                    }
                }
            }
        },
        opts,
    )
}

/// Run `f` for its side effects. Emits nothing on success and one error item
/// per failure, which makes it the usual way to build a [`Sink`].
///
/// # Panics
///
/// Panics if `opts` is invalid.
pub fn for_each<T, F, Fut>(f: F, opts: Options) -> Sink<T>
where
    T: Send + 'static,
    F: Fn(Context, Item<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    pooled(
        "for_each",
        move |ctx, item, out: Output<()>| {
            let done = f(ctx, item);
            async move {
                if let Err(e) = done.await {
                    out.send_error(e).await;
                }
            }
        },
        opts,
    )
}
