use clap::Parser;
use methodology::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
