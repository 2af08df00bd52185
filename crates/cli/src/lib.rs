//! Library half of the `ccbell` binary: argument parsing, the shared
//! command context, and one handler per subcommand.

pub mod commands;
pub mod context;
pub mod handlers;
pub mod parser;

pub use commands::Commands;
pub use context::CliContext;
pub use parser::Cli;
