//! Core types and utilities shared by the tidepool simulation engines.

pub mod config;
pub mod error;
pub mod stats;
pub mod types;

pub use config::*;
pub use error::{Error, Result};
pub use stats::*;
pub use types::*;
