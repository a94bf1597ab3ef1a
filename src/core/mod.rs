//! Core types and traits for the channelweld library.
//!
//! This module contains the data model, the cancellation context, stage
//! options, the worker-pool runtime and the collaborator traits.

pub mod context;
pub mod item;
pub mod options;
pub mod stage;
pub mod traits;

// Re-export core items
pub use context::Context;
pub use item::{channel, closed, Item, Stream, StreamSender};
pub use options::{BeforeClose, Options};
pub use stage::Output;
pub use traits::{Destination, Source};
