//! Sinks: pipelines consuming a stream for its side effects.
//!
//! [`to_destination`] turns any [`Destination`] into a [`Sink`];
//! [`CollectDestination`] is an in-memory destination for tests and small
//! jobs.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;

use crate::core::{Context, Destination, Item, Options};
use crate::error::Result;
use crate::pipeline::Sink;
use crate::processors::for_each;

/// Write every value to `dest`.
///
/// The input is drained fully. Upstream error items and failed writes are
/// emitted as error items. [`Destination::flush`] is called exactly once per
/// run from the before-close hook, after any hook set in `opts`, however the
/// run ended; it receives a context detached from cancellation.
///
/// With `pool_size > 1` the workers take turns on the destination.
///
/// # Panics
///
/// Panics if `opts` is invalid.
///
/// # Examples
///
/// ```rust
/// use channelweld::prelude::*;
/// use channelweld::sinks::CollectDestination;
///
/// # #[tokio::main]
/// # async fn main() {
/// let dest = CollectDestination::new();
/// let p = of(vec![1, 2, 3]).pipe(to_destination(dest.clone(), Options::new()));
///
/// let errors = collect(p.generate(Context::new())).await;
/// assert!(errors.is_empty());
/// assert_eq!(dest.into_items().await, vec![1, 2, 3]);
/// # }
/// ```
pub fn to_destination<D: Destination>(dest: D, opts: Options) -> Sink<D::Item> {
    opts.assert_valid("to_destination");

    let dest = Arc::new(TokioMutex::new(dest));
    let flushing = dest.clone();
    let opts = opts.before_close(move |ctx: Context| {
        let flushing = flushing.clone();
        async move {
            let mut dest = flushing.lock().await;
            dest.flush(&ctx.without_cancel()).await
        }
    });

    for_each(
        move |ctx, item: Item<D::Item>| {
            let dest = dest.clone();
            async move {
                let value = item?;
                let mut dest = dest.lock().await;
                dest.write(&ctx, value).await
            }
        },
        opts,
    )
}

/// A destination that collects values into a shared vector.
pub struct CollectDestination<T> {
    items: Arc<TokioMutex<Vec<T>>>,
}

impl<T: Send + Clone + 'static> CollectDestination<T> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(TokioMutex::new(Vec::new())),
        }
    }

    /// A copy of everything written so far.
    pub async fn snapshot(&self) -> Vec<T> {
        let items = self.items.lock().await;
        items.clone()
    }

    /// Everything written so far. Moves the values out when this is the last
    /// handle, and copies them otherwise.
    pub async fn into_items(self) -> Vec<T> {
        match Arc::try_unwrap(self.items) {
            Ok(items) => items.into_inner(),
            Err(shared) => {
                let items = shared.lock().await;
                items.clone()
            }
        }
    }

    /// Shared handle on the collected values
    pub fn items(&self) -> Arc<TokioMutex<Vec<T>>> {
        self.items.clone()
    }
}

#[async_trait]
impl<T: Send + Clone + 'static> Destination for CollectDestination<T> {
    type Item = T;

    async fn write(&mut self, _ctx: &Context, item: T) -> Result<()> {
        self.items.lock().await.push(item);
        Ok(())
    }
}

impl<T: Send + Clone + 'static> Default for CollectDestination<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CollectDestination<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}
