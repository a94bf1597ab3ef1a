//! Reference adapters between pipelines and the outside world.
//!
//! Each adapter is a [`Source`](crate::core::Source) or
//! [`Destination`](crate::core::Destination) plus a constructor wrapping it
//! into a generator or sink.

pub mod csv;
pub mod io;
