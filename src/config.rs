// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::fmt;

use crate::commands::Cli;

/// The only cluster whose affinity groups are searched.
pub const DEFAULT_CLUSTER: &str = "default";

/// Config holds everything a single run needs. It is built once from the command line and passed
/// to the workflow explicitly, so tests can construct one directly without going through argument
/// parsing.
#[derive(Clone, PartialEq)]
pub struct Config {
    /// Name of the affinity group to add VMs to. Matched exactly.
    pub affinity_group: String,
    /// Search term for VM names.
    pub vm_search: String,
    pub api_url: String,
    pub username: String,
    pub password: String,
    pub cluster: String,
}

impl Config {
    pub fn new(
        affinity_group: &str,
        vm_search: &str,
        api_url: &str,
        username: &str,
        password: &str,
    ) -> Self {
        Config {
            affinity_group: affinity_group.to_string(),
            vm_search: vm_search.to_string(),
            api_url: api_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            cluster: DEFAULT_CLUSTER.to_string(),
        }
    }

    /// The search expression used to find the cluster.
    pub fn cluster_query(&self) -> String {
        format!("name={}", self.cluster)
    }

    /// The search expression used to find VMs. A term without wildcards is searched for as a
    /// substring of the VM name; a term that already has a `*` is passed through as given.
    pub fn vm_query(&self) -> String {
        if self.vm_search.contains('*') {
            format!("name={}", self.vm_search)
        } else {
            format!("name=*{}*", self.vm_search)
        }
    }
}

impl From<&Cli> for Config {
    fn from(cli: &Cli) -> Self {
        Config::new(
            &cli.affinity_group,
            &cli.vm_name_search,
            &cli.api_url,
            &cli.username,
            &cli.password,
        )
    }
}

// The password must never end up in log output.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("affinity_group", &self.affinity_group)
            .field("vm_search", &self.vm_search)
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("cluster", &self.cluster)
            .finish()
    }
}
