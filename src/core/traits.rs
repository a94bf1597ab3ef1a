//! Collaborator traits for the two pipeline shapes that touch the outside
//! world.
//!
//! A [`Source`] feeds a generator: it ignores any input and pulls items from
//! a file, socket or iterator. A [`Destination`] backs a sink: it consumes
//! items for their side effects and emits nothing. Both are wrapped into
//! pipelines by [`from_source`](crate::sources::from_source) and
//! [`to_destination`](crate::sinks::to_destination).

use async_trait::async_trait;

use crate::core::Context;
use crate::error::Result;

/// Pull-based producer of items.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use channelweld::core::{Context, Source};
/// use channelweld::{Error, Result};
///
/// struct Countdown(u32);
///
/// #[async_trait]
/// impl Source for Countdown {
///     type Item = u32;
///
///     async fn next(&mut self, _ctx: &Context) -> Result<u32> {
///         if self.0 == 0 {
///             return Err(Error::EndOfStream);
///         }
///         self.0 -= 1;
///         Ok(self.0)
///     }
/// }
/// ```
#[async_trait]
pub trait Source: Send + 'static {
    /// The type of items this source produces
    type Item: Send + 'static;

    /// Produce the next item.
    ///
    /// `Err(Error::EndOfStream)` ends the stream cleanly; any other error is
    /// emitted as an error item and pulling continues.
    async fn next(&mut self, ctx: &Context) -> Result<Self::Item>;

    /// Release the underlying resource. Called once, before the generator's
    /// stream closes.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Side-effecting consumer of items.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use channelweld::core::{Context, Destination};
/// use channelweld::Result;
///
/// struct LogDestination;
///
/// #[async_trait]
/// impl Destination for LogDestination {
///     type Item = String;
///
///     async fn write(&mut self, _ctx: &Context, item: String) -> Result<()> {
///         println!("Logged: {}", item);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Destination: Send + 'static {
    /// The type of items this destination accepts
    type Item: Send + 'static;

    /// Write a single item.
    async fn write(&mut self, ctx: &Context, item: Self::Item) -> Result<()>;

    /// Flush buffered state. Called once, before the sink's stream closes,
    /// whether the input ended, failed or was cancelled.
    async fn flush(&mut self, _ctx: &Context) -> Result<()> {
        Ok(())
    }
}
