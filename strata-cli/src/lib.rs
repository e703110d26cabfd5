//! Strata CLI - Command-line interface for Strata SQL script migrations.
//!
//! This crate provides the `strata` tool: inspecting the state of a
//! database against its scripts, rendering and recording updates, and
//! repairing the history after a failed script.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
