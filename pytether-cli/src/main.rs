// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Parser;
use pytether_cli::PytetherApp;

fn main() {
    let opts = PytetherApp::parse();
    let output = opts.init_output();

    match opts.exec(output) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr(&output.stderr_styles());
            std::process::exit(error.process_exit_code())
        }
    }
}
