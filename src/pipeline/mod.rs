//! Pipeline composition.
//!
//! A [`Pipeline`] turns one stream into another. Pipelines are values: build
//! them once, clone them freely, and run them as many times as needed. The
//! `pipe*` functions chain them; [`fork`] hands out independent copies.

use std::fmt;
use std::sync::Arc;

use crate::core::item::{closed, Stream};
use crate::core::Context;

type RunFn<T, U> = dyn Fn(Context, Stream<T>) -> Stream<U> + Send + Sync;

/// A reusable stream transformation `(Context, Stream<T>) -> Stream<U>`.
///
/// Running a pipeline spawns its tasks on the current tokio runtime and
/// returns immediately; the caller owns the returned stream until it is
/// drained or dropped. Dropping it abandons the run: the stage notices the
/// closed channel and stops pulling from upstream.
///
/// # Examples
///
/// ```rust
/// use channelweld::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() {
/// let double = map(|_, item: Item<i32>| async move { Ok(item? * 2) }, Options::new());
/// let pipeline = of(vec![1, 2, 3]).pipe(double);
///
/// let items = collect(pipeline.generate(Context::new())).await;
/// let values: Vec<i32> = items.into_iter().map(|i| i.unwrap()).collect();
/// assert_eq!(values, vec![2, 4, 6]);
/// # }
/// ```
pub struct Pipeline<T, U> {
    run: Arc<RunFn<T, U>>,
}

/// A pipeline with no real input.
pub type Generator<T> = Pipeline<(), T>;

/// A pipeline with no real output; its stream only carries error items.
pub type Sink<T> = Pipeline<T, ()>;

impl<T, U> Clone for Pipeline<T, U> {
    fn clone(&self) -> Self {
        Self {
            run: self.run.clone(),
        }
    }
}

impl<T, U> fmt::Debug for Pipeline<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("input", &std::any::type_name::<T>())
            .field("output", &std::any::type_name::<U>())
            .finish()
    }
}

impl<T, U> Pipeline<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    /// Create a pipeline from a function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Context, Stream<T>) -> Stream<U> + Send + Sync + 'static,
    {
        Self { run: Arc::new(f) }
    }

    /// Run the pipeline over `input`.
    pub fn run(&self, ctx: Context, input: Stream<T>) -> Stream<U> {
        (self.run)(ctx, input)
    }

    /// Feed this pipeline's output into `next`. Same as [`pipe2`].
    pub fn pipe<V>(self, next: Pipeline<U, V>) -> Pipeline<T, V>
    where
        V: Send + 'static,
    {
        pipe2(self, next)
    }
}

impl<U: Send + 'static> Pipeline<(), U> {
    /// Run a generator; its input is an already closed stream.
    pub fn generate(&self, ctx: Context) -> Stream<U> {
        self.run(ctx, closed())
    }
}

/// Chain two pipelines. Alias of [`pipe2`].
pub fn pipe<A, B, C>(a: Pipeline<A, B>, b: Pipeline<B, C>) -> Pipeline<A, C>
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
{
    pipe2(a, b)
}

/// Chain two pipelines.
///
/// `b` runs under a context detached from the caller's cancellation: when
/// `a` observes cancellation it emits its terminal item and closes, and `b`
/// keeps draining so its flush and before-close hook still run to completion.
pub fn pipe2<A, B, C>(a: Pipeline<A, B>, b: Pipeline<B, C>) -> Pipeline<A, C>
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
{
    Pipeline::new(move |ctx: Context, input| {
        let detached = ctx.without_cancel();
        let mid = a.run(ctx, input);
        b.run(detached, mid)
    })
}

/// Chain three pipelines.
pub fn pipe3<A, B, C, D>(
    a: Pipeline<A, B>,
    b: Pipeline<B, C>,
    c: Pipeline<C, D>,
) -> Pipeline<A, D>
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
    D: Send + 'static,
{
    pipe2(pipe2(a, b), c)
}

/// Chain four pipelines.
pub fn pipe4<A, B, C, D, E>(
    a: Pipeline<A, B>,
    b: Pipeline<B, C>,
    c: Pipeline<C, D>,
    d: Pipeline<D, E>,
) -> Pipeline<A, E>
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
    D: Send + 'static,
    E: Send + 'static,
{
    pipe3(pipe2(a, b), c, d)
}

/// Chain five pipelines.
pub fn pipe5<A, B, C, D, E, F>(
    a: Pipeline<A, B>,
    b: Pipeline<B, C>,
    c: Pipeline<C, D>,
    d: Pipeline<D, E>,
    e: Pipeline<E, F>,
) -> Pipeline<A, F>
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
    D: Send + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    pipe4(pipe2(a, b), c, d, e)
}

/// Two independent handles on the same pipeline.
///
/// Unlike [`tee`](crate::dispatcher::tee), nothing is shared at run time:
/// each handle, when run, performs its own full run.
pub fn fork<T, U>(p: Pipeline<T, U>) -> (Pipeline<T, U>, Pipeline<T, U>)
where
    T: Send + 'static,
    U: Send + 'static,
{
    (p.clone(), p)
}

/// `n` independent handles on the same pipeline.
pub fn fork_n<T, U>(p: Pipeline<T, U>, n: usize) -> Vec<Pipeline<T, U>>
where
    T: Send + 'static,
    U: Send + 'static,
{
    (0..n)
        .map(|_| {
            let p = p.clone();
            Pipeline::new(move |ctx, input| p.run(ctx, input))
        })
        .collect()
}
