//! One module per subcommand.

pub mod catalog;
pub mod export;
pub mod generate;
pub mod library;
pub mod models;
pub mod remove;
