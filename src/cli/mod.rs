//! CLI module for director - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running shifts and
//! inspecting configuration.

pub mod commands;

pub use commands::Cli;
