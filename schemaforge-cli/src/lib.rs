//! Library half of the `schemaforge` binary: config loading, the terminal
//! prompt and plugin listing, kept here so they can be tested without
//! spawning the CLI.

pub mod config;
pub mod listing;
pub mod prompt;
