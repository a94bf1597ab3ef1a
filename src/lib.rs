//! # Composable channel-based stream pipelines for tokio
//!
//! This crate provides a small dataflow algebra: stages connected by bounded
//! channels, each carrying `Result` items, with uniform cooperative
//! cancellation and configurable concurrency.
//!
//! ## Core Concepts
//!
//! - **Item**: `Result<T, Error>`; errors are data and flow downstream
//! - **Stream**: the receiving end of a bounded channel of items
//! - **Pipeline**: a reusable function from one stream to another
//! - **Generator** / **Sink**: pipelines with no real input / output
//! - **Context**: cancellation token plus optional deadline, passed to every stage
//! - **Options**: pool size, buffer size, stop-on-error and before-close hook
//!
//! ## Example
//!
//! ```rust
//! use channelweld::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipeline = pipe3(
//!         of((1..=10).collect()),
//!         filter(|_, item: &Item<i64>| Ok(matches!(item, Ok(v) if v % 2 == 0)), Options::new()),
//!         map(|_, item: Item<i64>| async move { Ok(item? * 10) }, Options::new().pool_size(4)),
//!     );
//!
//!     let mut values: Vec<i64> = collect(pipeline.generate(Context::new()))
//!         .await
//!         .into_iter()
//!         .filter_map(|item| item.ok())
//!         .collect();
//!     values.sort();
//!
//!     assert_eq!(values, vec![20, 40, 60, 80, 100]);
//! }
//! ```

pub mod adapters;
pub mod core;
pub mod dispatcher;
pub mod error;
pub mod pipeline;
pub mod processors;
pub mod sinks;
pub mod sources;
pub mod util;

// Re-export commonly used items
pub mod prelude {
    pub use crate::core::{channel, closed, Context, Destination, Item, Options, Output, Source, Stream};
    pub use crate::dispatcher::{connect, merge, segregate, tee, tee_n, with_error_handler};
    pub use crate::error::{Error, Result};
    pub use crate::pipeline::{fork, fork_n, pipe, pipe2, pipe3, pipe4, pipe5, Generator, Pipeline, Sink};
    pub use crate::processors::{
        batch, filter, filter_map, flatten, for_each, for_each_output, map, DEFAULT_BATCH_MAX_WAIT,
    };
    pub use crate::sinks::to_destination;
    pub use crate::sources::{from_func, from_seq, from_source, from_stream, of};
    pub use crate::util::{collect, collect_with_cancel, or_done};
}

// Re-export main error type
pub use error::{Error, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
