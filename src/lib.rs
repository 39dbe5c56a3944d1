#[macro_use]
extern crate log;

pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod git;
pub mod glob;
pub mod logger;
pub mod runner;
pub mod workflow;

pub use error::{Error, GitError};
pub use eyre::Result;
