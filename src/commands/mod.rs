//! Command implementations for the CLI
//!
//! - start: Start the API server
//! - test: Test configuration validity
//! - config: Configuration display

pub mod config;
pub mod start;
