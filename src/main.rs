use std::process::ExitCode;

use brushwork::cli::{self, CliArgs};
use clap::Parser;

fn main() -> ExitCode {
    cli::run(CliArgs::parse())
}
