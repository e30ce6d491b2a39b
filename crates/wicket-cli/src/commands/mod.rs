//! CLI subcommands.

pub mod secret;
pub mod serve;
