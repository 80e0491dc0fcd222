//! Tooling & Integration Layer
//!
//! Command-line surface of the operator and the manifest watcher it drives.

pub mod cli;
pub mod watch;

pub use cli::{Cli, CliContext, Commands};
pub use watch::{ManifestWatcher, WatchConfig};
