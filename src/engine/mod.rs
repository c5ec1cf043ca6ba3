// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod http;
pub mod sso;

pub use http::Connection;

/// A cluster as returned by the engine. Only the fields this tool needs are modeled.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AffinityGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Vm {
    pub id: String,
    pub name: String,
}

impl fmt::Display for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Errors reported by a `ManagementApi` implementation.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("authentication failed: {reason}")]
    Authentication { reason: String },

    #[error("engine returned {status}: {reason}{}", fault_detail(.detail))]
    Fault {
        status: u16,
        reason: String,
        detail: Option<String>,
    },
}

fn fault_detail(detail: &Option<String>) -> String {
    match detail {
        Some(d) if !d.is_empty() => format!(" ({d})"),
        _ => String::new(),
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// The subset of the management API used to update affinity group membership.
///
/// `Connection` talks to a real engine over HTTP; `test_env::FakeEngine` keeps everything in
/// memory so that the workflow can be exercised without a server.
pub trait ManagementApi {
    /// List clusters matching the engine search expression `search`.
    fn list_clusters(&self, search: &str) -> ApiResult<Vec<Cluster>>;

    fn list_affinity_groups(&self, cluster_id: &str) -> ApiResult<Vec<AffinityGroup>>;

    /// List VMs matching the engine search expression `search`.
    fn list_vms(&self, search: &str) -> ApiResult<Vec<Vm>>;

    /// Add the VM with id `vm_id` to the members of an affinity group.
    fn add_affinity_group_vm(&self, cluster_id: &str, group_id: &str, vm_id: &str)
        -> ApiResult<()>;

    /// Release the session. Called at most once, by `session::Session`.
    fn close(&mut self) -> ApiResult<()>;
}
