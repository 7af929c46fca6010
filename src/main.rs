use anyhow::Result;
use clap::Parser;
use qbit_remote::core::startup::{run, Cli};
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    run(Cli::parse())
}
