//! Command-line interface module.

mod args;
pub mod replay;
pub mod serve;

pub use args::{Cli, Commands};
