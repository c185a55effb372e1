//! CLI module for aerodoc
//!
//! Provides command-line interface for:
//! - compile-read: show the native filter and options for a read request
//! - compile-write: show the native filter and update for a write request
//! - find: run a read request against an in-memory fixture

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    compile_read, compile_write, execute_find, find, plan_read, plan_write, run, run_command,
    QueryRequest,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_error, write_response};
