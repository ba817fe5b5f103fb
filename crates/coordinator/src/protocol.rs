//! Request/reply types and reply decoding.

use thiserror::Error;
use worker_core::{ProtocolParseError, ResultDelta, Workload};

/// Reply text meaning the coordinator has nothing to hand out.
pub const NO_WORK: &str = "None";
/// Reply text meaning the username/password pair was refused.
pub const BAD_CREDENTIALS: &str = "Bad Credentials";
/// Result upload reply asking the worker to abandon the workload.
pub const STOP: &str = "STOP";
/// Synthesized locally when a result upload cannot reach the coordinator.
pub const UNABLE: &str = "Unable";

/// Login sent with every authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// What the worker advertises when asking for work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadRequest {
    /// `None` until the coordinator registers this machine
    pub machine_id: String,
    pub threads: u32,
    pub os_name: String,
}

/// Decoded `getWorkload` reply.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkloadReply {
    NoWork,
    BadCredentials,
    Assigned(Box<Workload>),
}

/// Decoded `submitResults` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    /// Results were recorded; the checkpoint may advance.
    Acknowledged,
    /// The coordinator could not be reached; keep the delta for later.
    Unreachable,
    /// The workload was cancelled remotely.
    Stop,
}

/// One result upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultReport<'a> {
    pub machine_id: &'a str,
    pub result_id: &'a str,
    pub test_id: &'a str,
    pub delta: ResultDelta,
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} answered with HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error(transparent)]
    Protocol(#[from] ProtocolParseError),
}

impl WorkloadReply {
    pub fn decode(text: &str) -> Result<Self, ProtocolParseError> {
        match text.trim() {
            NO_WORK => Ok(Self::NoWork),
            BAD_CREDENTIALS => Ok(Self::BadCredentials),
            payload => Workload::decode(payload).map(|w| Self::Assigned(Box::new(w))),
        }
    }
}

impl ReportStatus {
    /// `STOP` and `Unable` are matched case-insensitively; anything else is an ack.
    pub fn decode(text: &str) -> Self {
        let reply = text.trim();
        if reply.eq_ignore_ascii_case(STOP) {
            Self::Stop
        } else if reply.eq_ignore_ascii_case(UNABLE) {
            Self::Unreachable
        } else {
            Self::Acknowledged
        }
    }
}

/// Join URL segments with exactly one `/` between them and a trailing `/`.
pub fn url_join(parts: &[&str]) -> String {
    let mut url = parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .collect::<Vec<_>>()
        .join("/");
    url.push('/');
    url
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod protocol_tests;
