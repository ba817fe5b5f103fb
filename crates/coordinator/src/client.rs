//! Blocking HTTP client for the coordinator.

use std::time::Duration;

use tracing::{debug, warn};

use crate::protocol::*;

/// Everything the worker asks of the coordinator.
///
/// `submit_results` never fails: transport errors are folded into
/// [`ReportStatus::Unreachable`] so the caller keeps its pending delta.
/// Speed and bench notifications are best effort.
pub trait Coordinator {
    fn request_workload(&self, request: &WorkloadRequest) -> Result<WorkloadReply, CoordinatorError>;

    fn submit_results(&self, report: &ResultReport<'_>) -> ReportStatus;

    fn submit_nps(&self, machine_id: &str, nps: f64);

    fn wrong_bench(&self, test_id: &str, engine_id: &str);

    /// Base URL hosting the match runner binaries.
    fn runner_files_url(&self) -> Result<String, CoordinatorError>;
}

pub struct HttpCoordinator {
    server: String,
    credentials: Credentials,
    client: reqwest::blocking::Client,
}

impl HttpCoordinator {
    pub fn new(
        server: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, CoordinatorError> {
        let server = server.into();
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| CoordinatorError::Transport {
                endpoint: server.clone(),
                source,
            })?;
        Ok(Self {
            server,
            credentials,
            client,
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    fn post(&self, endpoint: &str, form: &[(&str, &str)]) -> Result<String, CoordinatorError> {
        let url = url_join(&[self.server.as_str(), endpoint]);
        let transport = |source| CoordinatorError::Transport {
            endpoint: endpoint.to_string(),
            source,
        };

        let response = self.client.post(&url).form(form).send().map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(CoordinatorError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().map_err(transport)?;
        debug!(endpoint, reply = %body.trim(), "coordinator reply");
        Ok(body)
    }
}

impl Coordinator for HttpCoordinator {
    fn request_workload(&self, request: &WorkloadRequest) -> Result<WorkloadReply, CoordinatorError> {
        let threads = request.threads.to_string();
        let body = self.post(
            "getWorkload",
            &[
                ("machineid", request.machine_id.as_str()),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
                ("threads", threads.as_str()),
                ("osname", request.os_name.as_str()),
            ],
        )?;
        Ok(WorkloadReply::decode(&body)?)
    }

    fn submit_results(&self, report: &ResultReport<'_>) -> ReportStatus {
        let delta = &report.delta;
        let (wins, losses, draws) = (
            delta.wins.to_string(),
            delta.losses.to_string(),
            delta.draws.to_string(),
        );
        let (crashes, timeloss) = (delta.crashes.to_string(), delta.timelosses.to_string());

        let reply = self.post(
            "submitResults",
            &[
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
                ("machineid", report.machine_id),
                ("resultid", report.result_id),
                ("testid", report.test_id),
                ("wins", wins.as_str()),
                ("losses", losses.as_str()),
                ("draws", draws.as_str()),
                ("crashes", crashes.as_str()),
                ("timeloss", timeloss.as_str()),
            ],
        );

        match reply {
            Ok(text) => ReportStatus::decode(&text),
            Err(e) => {
                warn!(error = %e, "unable to reach coordinator, holding results");
                ReportStatus::Unreachable
            }
        }
    }

    fn submit_nps(&self, machine_id: &str, nps: f64) {
        let nps = format!("{}", nps.round() as u64);
        if let Err(e) = self.post(
            "submitNPS",
            &[
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
                ("machineid", machine_id),
                ("nps", nps.as_str()),
            ],
        ) {
            warn!(error = %e, "failed to report nodes per second");
        }
    }

    fn wrong_bench(&self, test_id: &str, engine_id: &str) {
        if let Err(e) = self.post(
            "wrongBench",
            &[
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
                ("testid", test_id),
                ("engineid", engine_id),
            ],
        ) {
            warn!(error = %e, "failed to report wrong bench");
        }
    }

    fn runner_files_url(&self) -> Result<String, CoordinatorError> {
        let url = url_join(&[self.server.as_str(), "getFiles"]);
        let transport = |source| CoordinatorError::Transport {
            endpoint: "getFiles".to_string(),
            source,
        };
        let response = self.client.get(&url).send().map_err(transport)?;
        if !response.status().is_success() {
            return Err(CoordinatorError::Status {
                endpoint: "getFiles".to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.text().map_err(transport)?.trim().to_string())
    }
}
