// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod commands;
pub mod config;
pub mod engine;
pub mod session;
pub mod test_env;
pub mod workflow;
