//! Binary entrypoint for vidrank.

use std::process::ExitCode;

use vidrank::start_vidrank;

/// Parse the command line and run the requested command.
fn main() -> ExitCode {
    start_vidrank::run()
}
