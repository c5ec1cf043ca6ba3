// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use affinity_lib::commands::{self, ExitStatus};

/// The ovirt_affinity binary adds the VMs matching a search term to an affinity group.
fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("OVIRT_AFFINITY_LOG", "warn"),
    )
    .init();

    let status = match commands::parse_args(std::env::args_os()).and_then(|cli| commands::main(&cli)) {
        Ok(()) => ExitStatus::Success,
        Err(e) => e.status,
    };

    std::process::exit(status.code());
}
