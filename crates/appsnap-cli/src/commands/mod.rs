//! Subcommand implementations.

pub mod append;
pub mod inspect;
pub mod probe;
pub mod write;
