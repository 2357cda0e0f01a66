#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

// Used by the main.rs binary
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod handlers;
pub mod parser;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::{Commands, InferArgs};
pub use parser::Cli;
