// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{ffi::OsString, io};

use {
    clap::{error::ErrorKind, Parser},
    log::warn,
};

use crate::{
    config::Config,
    engine::{ApiResult, Connection, ManagementApi},
    session::Session,
    workflow::{self, MembershipReport, WorkflowError},
};

/// The process exit status for each way a run can end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Every add succeeded, or no VM matched the search.
    Success = 0,
    /// Wrong number of arguments.
    Usage = 1,
    /// The connection could not be opened, or a read query failed.
    Connection = 2,
    /// The cluster or the affinity group does not exist.
    NotFound = 3,
    /// At least one VM could not be added.
    PartialFailure = 4,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// A `HandledError` represents an error that has already been handled. When you call a function
/// that returns a `HandledError` or `HandledResult`, you don't need to do anything with that error,
/// other than just be aware that it happened, and return it on to your caller.
///
/// `main()` has a special responsibility: since its "caller" is, in a certain sense, the operating
/// system, `main()` must turn the `status` of a `HandledError` into the process exit status.
///
/// The primary way to construct a `HandledError` is with the `handle_err()` function, which turns a
/// generic error into a `HandledError`, and also runs some caller-provided code to handle the
/// error. That provided code would normally do something like report the error to stderr.
///
/// Apart from the exit status, a `HandledError` intentionally has no data about what the specific
/// error was; the process of handling the error "consumes" that information.
#[derive(Debug, PartialEq)]
pub struct HandledError {
    pub status: ExitStatus,
}

pub type HandledResult<T> = std::result::Result<T, HandledError>;

pub fn handled_error<T>(status: ExitStatus) -> HandledResult<T> {
    HandledResult::Err(HandledError { status })
}

pub trait Handle<T, F> {
    fn handle_err(self, status: ExitStatus, handler: F) -> HandledResult<T>;
}

impl<T, E, F: FnOnce(E)> Handle<T, F> for std::result::Result<T, E> {
    /// Handle an error by running the provided `handler` code, giving it the error.
    ///
    /// Then, return a `HandledResult` carrying `status`, so that transitive callers of this
    /// function know that they do not need to do anything further to handle the error.
    fn handle_err(self, status: ExitStatus, handler: F) -> HandledResult<T> {
        self.map_err(|e| {
            handler(e);
            HandledError { status }
        })
    }
}

/// Add the VMs matching a search term to an affinity group in the "default" cluster.
#[derive(Parser)]
#[command(
    version,
    about,
    long_about = None,
    after_help = "A value that starts with '-' (e.g. a password) must come after '--', \
                  as in: ovirt_affinity web-tier web https://engine/ovirt-engine/api admin@internal -- -secret"
)]
pub struct Cli {
    /// Name of the affinity group, matched exactly
    pub affinity_group: String,

    /// VM name search term; matched as a substring unless it contains a '*' wildcard
    pub vm_name_search: String,

    /// REST API URL, e.g. https://engine.example.org/ovirt-engine/api
    pub api_url: String,

    /// User to authenticate as, including the profile, e.g. admin@internal
    pub username: String,

    /// Password for the user; put '--' before it if it starts with '-'
    pub password: String,
}

/// Parse the command line. Asking for `--help` or `--version` ends the run with a success status;
/// any other parse failure is a usage error.
pub fn parse_args<I, T>(args: I) -> HandledResult<Cli>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args).or_else(|e| {
        let status = match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitStatus::Success,
            _ => ExitStatus::Usage,
        };
        if let Err(print_err) = e.print() {
            warn!("Could not print usage: {print_err}");
        }
        handled_error(status)
    })
}

pub fn main(cli: &Cli) -> HandledResult<()> {
    let config = Config::from(cli);
    update_membership(&config, Connection::open)
}

/// Open a session with `connect`, run the membership workflow, and close the session again.
///
/// The session is closed on every path once it has been opened; a failure to close it is only
/// logged since the work itself has already finished by then.
pub fn update_membership<A, C>(config: &Config, connect: C) -> HandledResult<()>
where
    A: ManagementApi,
    C: FnOnce(&Config) -> ApiResult<A>,
{
    let api = connect(config).handle_err(ExitStatus::Connection, |e| {
        eprintln!("Could not connect to '{}': {e}", config.api_url)
    })?;
    let session = Session::new(api);

    let result = workflow::run(&*session, config, &mut io::stdout().lock());

    if let Err(e) = session.close() {
        warn!("Error closing connection to '{}': {e}", config.api_url);
    }

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            return handled_error(workflow_status(&e));
        }
    };

    print_report(&report);

    if report.is_complete() {
        Ok(())
    } else {
        handled_error(ExitStatus::PartialFailure)
    }
}

fn workflow_status(e: &WorkflowError) -> ExitStatus {
    match e {
        WorkflowError::ClusterNotFound(_) | WorkflowError::AffinityGroupNotFound { .. } => {
            ExitStatus::NotFound
        }
        WorkflowError::Query { .. } => ExitStatus::Connection,
    }
}

fn print_report(report: &MembershipReport) {
    let group = &report.group.name;

    if report.attempted() == 0 {
        println!("No VMs matched; affinity group \"{group}\" was not changed.");
        return;
    }

    println!(
        "Added {} of {} VM(s) to affinity group \"{group}\".",
        report.added.len(),
        report.attempted()
    );

    for failure in report.failed.iter() {
        eprintln!(
            "Could not add {} to affinity group \"{group}\": {}",
            failure.vm, failure.error
        );
    }
}
