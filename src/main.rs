//! assetline - build and serve front-end assets

use std::process::ExitCode;

use assetline::cli;

fn main() -> ExitCode {
    cli::run()
}
