// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::ops::Deref;

use log::{debug, warn};

use crate::engine::{ApiResult, ManagementApi};

/// A Session owns an open connection for the duration of a run and guarantees that it is closed
/// exactly once.
///
/// The normal path is to call `close()` at the end so that a failure to close can be reported. If
/// the session is dropped without that, e.g. because a `?` returned early, it is closed on drop
/// and any error is only logged.
pub struct Session<A: ManagementApi> {
    api: A,
    closed: bool,
}

impl<A: ManagementApi> Session<A> {
    pub fn new(api: A) -> Self {
        Session { api, closed: false }
    }

    pub fn close(mut self) -> ApiResult<()> {
        self.close_once()
    }

    fn close_once(&mut self) -> ApiResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!("Closing session");
        self.api.close()
    }
}

impl<A: ManagementApi> Deref for Session<A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.api
    }
}

impl<A: ManagementApi> Drop for Session<A> {
    fn drop(&mut self) {
        if let Err(e) = self.close_once() {
            warn!("Failed to close session: {e}");
        }
    }
}
