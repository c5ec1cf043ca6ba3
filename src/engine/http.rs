// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use {
    log::{debug, info},
    reqwest::{
        blocking::{Client, ClientBuilder, RequestBuilder, Response},
        header::ACCEPT,
    },
    serde::{de::DeserializeOwned, Deserialize, Serialize},
};

use super::{sso, AffinityGroup, ApiError, ApiResult, Cluster, ManagementApi, Vm};
use crate::config::Config;

/// The version of the REST API this client speaks, sent in the `Version` header.
const API_VERSION: &str = "4";

/// Collections are returned as an object keyed by the singular entity name. An empty collection
/// may come back as `{}`, hence the defaults.
#[derive(Deserialize, Debug, Default)]
struct Clusters {
    #[serde(default)]
    cluster: Vec<Cluster>,
}

#[derive(Deserialize, Debug, Default)]
struct AffinityGroups {
    #[serde(default)]
    affinity_group: Vec<AffinityGroup>,
}

#[derive(Deserialize, Debug, Default)]
struct Vms {
    #[serde(default)]
    vm: Vec<Vm>,
}

/// The body of an error response.
#[derive(Deserialize, Debug, Default)]
struct Fault {
    reason: Option<String>,
    detail: Option<String>,
}

/// A reference to a VM by id, as sent when adding it to an affinity group.
#[derive(Serialize, Debug)]
struct VmRef<'a> {
    id: &'a str,
}

/// An authenticated connection to the engine's REST API.
pub struct Connection {
    client: Client,
    api_url: String,
    /// `None` once the connection has been closed.
    token: Option<String>,
}

impl Connection {
    /// Open a connection by obtaining an access token with the configured credentials.
    pub fn open(config: &Config) -> ApiResult<Self> {
        let client = ClientBuilder::new().build()?;
        let api_url = config.api_url.trim_end_matches('/').to_string();

        let token = sso::request_token(&client, &api_url, &config.username, &config.password)?;
        info!("Connected to {api_url} as {}", config.username);

        Ok(Self {
            client,
            api_url,
            token: Some(token),
        })
    }

    fn token(&self) -> ApiResult<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| ApiError::Authentication {
                reason: "connection is closed".to_string(),
            })
    }

    /// Add the headers that every API request carries.
    fn prepare(&self, request: RequestBuilder) -> ApiResult<RequestBuilder> {
        Ok(request
            .header(ACCEPT, "application/json")
            .header("Version", API_VERSION)
            .bearer_auth(self.token()?))
    }

    fn get<T: DeserializeOwned>(&self, path: &str, search: Option<&str>) -> ApiResult<T> {
        let url = format!("{}/{path}", self.api_url);
        let mut request = self.prepare(self.client.get(&url))?;
        match search {
            Some(search) => {
                debug!("GET {url} search={search:?}");
                request = request.query(&[("search", search)]);
            }
            None => debug!("GET {url}"),
        }

        let response = check(request.send()?)?;
        Ok(response.json()?)
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> ApiResult<()> {
        let url = format!("{}/{path}", self.api_url);
        debug!("POST {url}");

        let request = self.prepare(self.client.post(&url))?.json(body);
        check(request.send()?)?;
        Ok(())
    }
}

/// Turn a non-success response into an `ApiError::Fault`, using the fault body if the engine sent
/// one.
fn check(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let fault = response.json::<Fault>().unwrap_or_default();
    Err(ApiError::Fault {
        status: status.as_u16(),
        reason: fault
            .reason
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "unknown error".to_string()),
        detail: fault.detail,
    })
}

impl ManagementApi for Connection {
    fn list_clusters(&self, search: &str) -> ApiResult<Vec<Cluster>> {
        let clusters: Clusters = self.get("clusters", Some(search))?;
        Ok(clusters.cluster)
    }

    fn list_affinity_groups(&self, cluster_id: &str) -> ApiResult<Vec<AffinityGroup>> {
        let groups: AffinityGroups =
            self.get(&format!("clusters/{cluster_id}/affinitygroups"), None)?;
        Ok(groups.affinity_group)
    }

    fn list_vms(&self, search: &str) -> ApiResult<Vec<Vm>> {
        let vms: Vms = self.get("vms", Some(search))?;
        Ok(vms.vm)
    }

    fn add_affinity_group_vm(
        &self,
        cluster_id: &str,
        group_id: &str,
        vm_id: &str,
    ) -> ApiResult<()> {
        self.post(
            &format!("clusters/{cluster_id}/affinitygroups/{group_id}/vms"),
            &VmRef { id: vm_id },
        )
    }

    fn close(&mut self) -> ApiResult<()> {
        match self.token.take() {
            Some(token) => sso::revoke_token(&self.client, &self.api_url, &token),
            None => Ok(()),
        }
    }
}
