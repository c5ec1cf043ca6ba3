// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Access tokens for the engine's single sign-on service.
//!
//! The engine does not accept credentials on API requests directly. A client first exchanges the
//! username and password for a bearer token using the OAuth "password" grant, uses that token on
//! every API request, and revokes it when it is done.

use {
    log::debug,
    reqwest::{blocking::Client, header::ACCEPT},
    serde::Deserialize,
};

use super::{ApiError, ApiResult};

/// The scope that grants access to the REST API.
pub const SCOPE: &str = "ovirt-app-api";

/// Given the API URL (e.g., `https://engine.example.org/ovirt-engine/api`, optionally with a
/// version segment such as `/api/v4`), return the root of the engine application that the SSO
/// endpoints live under.
pub fn engine_root(api_url: &str) -> &str {
    let trimmed = api_url.trim_end_matches('/');
    let unversioned = match trimmed.rsplit_once('/') {
        Some((head, last)) if is_version_segment(last) && head.ends_with("/api") => head,
        _ => trimmed,
    };
    unversioned.strip_suffix("/api").unwrap_or(unversioned)
}

/// `v` followed by one or more digits, e.g. `v4`.
fn is_version_segment(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

pub fn token_url(api_url: &str) -> String {
    format!("{}/sso/oauth/token", engine_root(api_url))
}

pub fn revoke_url(api_url: &str) -> String {
    format!("{}/sso/oauth/revoke", engine_root(api_url))
}

#[derive(Deserialize, Debug, Default)]
struct TokenReply {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Exchange a username and password for an access token.
pub fn request_token(
    client: &Client,
    api_url: &str,
    username: &str,
    password: &str,
) -> ApiResult<String> {
    let url = token_url(api_url);
    debug!("POST {url} (user {username})");

    let response = client
        .post(&url)
        .header(ACCEPT, "application/json")
        .form(&[
            ("grant_type", "password"),
            ("scope", SCOPE),
            ("username", username),
            ("password", password),
        ])
        .send()?;

    let status = response.status();
    // A misconfigured URL usually gets an HTML error page back, so a body that isn't JSON is
    // reported using the status code alone.
    let reply = response.json::<TokenReply>().unwrap_or_default();

    if let Some(error) = reply.error {
        let reason = match reply.error_description {
            Some(description) => format!("{error}: {description}"),
            None => error,
        };
        return Err(ApiError::Authentication { reason });
    }

    if !status.is_success() {
        return Err(ApiError::Authentication {
            reason: format!("token endpoint {url} returned {status}"),
        });
    }

    reply
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Authentication {
            reason: "token endpoint did not return an access token".to_string(),
        })
}

/// Revoke a token previously returned by `request_token()`.
pub fn revoke_token(client: &Client, api_url: &str, token: &str) -> ApiResult<()> {
    let url = revoke_url(api_url);
    debug!("POST {url}");

    let response = client
        .post(&url)
        .header(ACCEPT, "application/json")
        .form(&[("scope", SCOPE), ("token", token)])
        .send()?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(ApiError::Fault {
            status: status.as_u16(),
            reason: "token revocation failed".to_string(),
            detail: None,
        })
    }
}
