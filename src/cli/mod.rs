//! Command handlers for the `multisig-vault` binary

pub mod commands;

pub use commands::*;
