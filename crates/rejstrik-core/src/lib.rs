//! Core types and pipeline stages for the rejstrik procurement graph.
//!
//! This crate has no parsing or database dependencies.
//! Parsers (`rejstrik-parse`) produce [`record::Record`]s, the
//! [`transform::Transformer`] resolves them into a [`graph::GraphSnapshot`],
//! and the [`load::Loader`] applies that snapshot to any
//! [`store::GraphStore`] backend.

pub mod error;
pub mod graph;
pub mod ico;
pub mod kind;
pub mod load;
pub mod record;
pub mod resolve;
pub mod source;
pub mod store;
pub mod transform;

pub use error::{Error, Result};
