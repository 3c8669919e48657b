//! docvault: command-line front end and S3 storage for the document pipeline
//! in `docvault-core`.

pub mod cli;
pub mod load_config;
pub mod s3;

pub use cli::{run, Cli, Commands};
