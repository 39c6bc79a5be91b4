//! Command Line Interface (CLI) layer for LAIPRO.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for the `retrieve` and `mosaic`
//! subcommands. It wires user-provided options to the underlying library
//! functionality exposed via `laipro::api`.
//!
//! If you are embedding LAIPRO into another application, prefer using
//! the high-level `laipro::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
