//! The rejstrik pipeline: discover source files, parse and transform them into
//! a graph snapshot, and load that snapshot into a SQLite graph store.
//!
//! The `rejstrik` binary is a thin clap wrapper around this library.

pub mod error;
pub mod pipeline;
pub mod settings;

pub use error::{Error, Result};
pub use settings::PipelineConfig;
