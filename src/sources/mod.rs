//! Generators: pipelines that ignore their input and produce a stream.
//!
//! [`of`] replays a fixed list, [`from_func`] pulls from an async function,
//! [`from_seq`] from an iterator, [`from_stream`] from an async stream and
//! [`from_source`] from a [`Source`] collaborator. All of them stop cleanly
//! on [`Error::EndOfStream`] and emit every other error as an item.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_stream::StreamExt;
use tracing::debug;

use crate::core::stage::{spawn_pool, Output};
use crate::core::{Context, Options, Source, Stream};
use crate::error::{Error, Result};
use crate::pipeline::{Generator, Pipeline};

/// Worker loop shared by the pull-based generators.
///
/// Calls `next` until it reports end of stream, the worker is halted or the
/// context is done. `exhausted` is shared by the whole pool so that no
/// worker keeps pulling once one of them saw the end.
async fn pull<T, F, Fut>(out: Output<T>, exhausted: Arc<AtomicBool>, next: F)
where
    T: Send + 'static,
    F: Fn(Context) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    while !exhausted.load(Ordering::Acquire) && !out.is_halted() {
        if out.context().is_done() {
            out.mark_cancelled();
            break;
        }

        match next(out.context().clone()).await {
            Err(e) if e.is_end_of_stream() => {
                debug!("end of stream");
                exhausted.store(true, Ordering::Release);
                break;
            }
            item => {
                if !out.send(item).await {
                    break;
                }
            }
        }
    }
}

/// Emit `items` in order, then close.
///
/// The only error this generator can produce is the terminal cancellation
/// item. Every run replays the full list.
///
/// # Examples
///
/// ```rust
/// use channelweld::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() {
/// let letters = of(vec!['a', 'b', 'c']);
/// let items = collect(letters.generate(Context::new())).await;
/// assert_eq!(items.len(), 3);
/// # }
/// ```
pub fn of<T>(items: Vec<T>) -> Generator<T>
where
    T: Clone + Send + Sync + 'static,
{
    let items: Arc<[T]> = items.into();

    Pipeline::new(move |ctx, _input: Stream<()>| {
        let items = items.clone();
        spawn_pool("of", ctx, &Options::new(), move |out: Output<T>| {
            let items = items.clone();
            async move {
                for value in items.iter().cloned() {
                    if !out.send_value(value).await {
                        break;
                    }
                }
            }
        })
    })
}

/// Emit the results of repeatedly awaiting `f`.
///
/// `Err(Error::EndOfStream)` ends the stream without being reported; any
/// other error is emitted as an item. With `pool_size > 1`, `f` is called
/// concurrently; once any worker sees end of stream the pool stops calling it.
///
/// # Panics
///
/// Panics if `opts` is invalid.
///
/// # Examples
///
/// ```rust
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
/// use channelweld::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() {
/// let counter = Arc::new(AtomicU32::new(0));
/// let numbers = from_func(
///     move |_| {
///         let counter = counter.clone();
///         async move {
///             match counter.fetch_add(1, Ordering::SeqCst) {
///                 n if n < 3 => Ok(n),
///                 _ => Err(Error::EndOfStream),
///             }
///         }
///     },
///     Options::new(),
/// );
///
/// let items = collect(numbers.generate(Context::new())).await;
/// assert_eq!(items.len(), 3);
/// # }
/// ```
pub fn from_func<T, F, Fut>(f: F, opts: Options) -> Generator<T>
where
    T: Send + 'static,
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    opts.assert_valid("from_func");
    let f = Arc::new(f);

    Pipeline::new(move |ctx, _input: Stream<()>| {
        let f = f.clone();
        let exhausted = Arc::new(AtomicBool::new(false));
        spawn_pool("from_func", ctx, &opts, move |out: Output<T>| {
            let f = f.clone();
            pull(out, exhausted.clone(), move |ctx| f(ctx))
        })
    })
}

/// Emit the elements of `seq`.
///
/// Every run iterates a fresh clone of `seq`; the iterator is released by the
/// stage's before-close hook, after any hook set in `opts`.
///
/// # Panics
///
/// Panics if `opts` is invalid.
pub fn from_seq<S>(seq: S, opts: Options) -> Generator<S::Item>
where
    S: IntoIterator + Clone + Send + Sync + 'static,
    S::IntoIter: Send + 'static,
    S::Item: Send + 'static,
{
    opts.assert_valid("from_seq");

    Pipeline::new(move |ctx, _input: Stream<()>| {
        let iter = Arc::new(Mutex::new(Some(seq.clone().into_iter())));
        let exhausted = Arc::new(AtomicBool::new(false));

        let release = iter.clone();
        let run_opts = opts.clone().before_close(move |_| {
            let release = release.clone();
            async move {
                release.lock().unwrap_or_else(PoisonError::into_inner).take();
                Ok(())
            }
        });

        spawn_pool("from_seq", ctx, &run_opts, move |out: Output<S::Item>| {
            let iter = iter.clone();
            pull(out, exhausted.clone(), move |_| {
                let next = iter
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .as_mut()
                    .and_then(Iterator::next)
                    .ok_or(Error::EndOfStream);
                async move { next }
            })
        })
    })
}

/// Emit the items of an async stream created per run by `factory`.
///
/// The stream's own `Err` items are forwarded as error items; the generator
/// closes when the stream ends.
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
/// let g = from_stream(
///     || tokio_stream::iter(vec![Ok(1), Ok(2)]),
///     Options::new(),
/// );
/// let items = collect(g.generate(Context::new())).await;
/// assert_eq!(items.len(), 2);
/// # }
/// ```
pub fn from_stream<T, F, St>(factory: F, opts: Options) -> Generator<T>
where
    T: Send + 'static,
    F: Fn() -> St + Send + Sync + 'static,
    St: futures_core::Stream<Item = Result<T>> + Send + 'static,
{
    opts.assert_valid("from_stream");

    Pipeline::new(move |ctx, _input: Stream<()>| {
        let stream = Arc::new(tokio::sync::Mutex::new(Box::pin(factory())));
        let exhausted = Arc::new(AtomicBool::new(false));

        spawn_pool("from_stream", ctx, &opts, move |out: Output<T>| {
            let stream = stream.clone();
            pull(out, exhausted.clone(), move |_| {
                let stream = stream.clone();
                async move {
                    let next = stream.lock().await.next().await;
                    next.unwrap_or(Err(Error::EndOfStream))
                }
            })
        })
    })
}

/// Emit the items produced by `source`.
///
/// The source is shared by every run of the returned generator and
/// [`Source::close`] is called from the before-close hook, after any hook set
/// in `opts`, at the end of each run.
///
/// # Panics
///
/// Panics if `opts` is invalid.
pub fn from_source<S: Source>(source: S, opts: Options) -> Generator<S::Item> {
    opts.assert_valid("from_source");

    let source = Arc::new(tokio::sync::Mutex::new(source));
    let closing = source.clone();
    let opts = opts.before_close(move |_| {
        let closing = closing.clone();
        async move {
            let mut source = closing.lock().await;
            source.close().await
        }
    });

    Pipeline::new(move |ctx, _input: Stream<()>| {
        let source = source.clone();
        let exhausted = Arc::new(AtomicBool::new(false));

        spawn_pool("from_source", ctx, &opts, move |out: Output<S::Item>| {
            let source = source.clone();
            pull(out, exhausted.clone(), move |ctx| {
                let source = source.clone();
                async move {
                    let mut source = source.lock().await;
                    source.next(&ctx).await
                }
            })
        })
    })
}
