mod catalog;
mod cli;
mod config;
mod error;
mod manifest;
mod relocate;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
