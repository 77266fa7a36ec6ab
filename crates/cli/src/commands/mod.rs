//! Subcommand implementations.

pub mod dataset;
pub mod embed;
pub mod migrate;
