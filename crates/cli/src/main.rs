// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use clap::Parser;
use tidewire::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    tidewire::setup_logging(cli.global.verbose);
    if let Err(e) = tidewire::run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
