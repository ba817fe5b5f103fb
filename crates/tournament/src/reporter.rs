//! Live result reporting.
//!
//! [`SessionReducer`] consumes [`MatchEvent`]s, owns the session's
//! [`MatchTally`], and uploads the unacknowledged delta every time the game
//! count crosses a multiple of the report rate.
//!
//! ```text
//! Running --boundary--> Reporting --ack/unable--> Running
//!                                 --STOP------> Aborted
//! Running --stream closed--> Closed
//! ```

use std::io;
use std::process::ExitStatus;
use std::thread;
use std::time::Duration;

use coordinator::{Coordinator, ReportStatus, ResultReport};
use tracing::{info, warn};
use worker_core::{MatchTally, ResultDelta, WorkerConfig};

use crate::events::{MatchEvent, MatchEvents};
use crate::process::MatchProcess;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Reporting,
    Aborted,
    Closed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Aborted | SessionState::Closed)
    }
}

/// Where result deltas go.
pub trait ResultSink {
    fn submit(&mut self, delta: &ResultDelta) -> ReportStatus;
}

/// Uploads deltas for one workload to the coordinator.
pub struct CoordinatorSink<'a, C: Coordinator + ?Sized> {
    pub coordinator: &'a C,
    pub machine_id: &'a str,
    pub result_id: &'a str,
    pub test_id: &'a str,
}

impl<C: Coordinator + ?Sized> ResultSink for CoordinatorSink<'_, C> {
    fn submit(&mut self, delta: &ResultDelta) -> ReportStatus {
        self.coordinator.submit_results(&ResultReport {
            machine_id: self.machine_id,
            result_id: self.result_id,
            test_id: self.test_id,
            delta: *delta,
        })
    }
}

/// Reporting cadence.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Games between uploads
    pub report_rate: u32,
    /// Upload attempts once the stream has closed
    pub final_attempts: u32,
    /// Pause between final upload attempts
    pub retry_delay: Duration,
}

impl ReporterConfig {
    pub fn from_worker(config: &WorkerConfig) -> Self {
        Self {
            report_rate: config.report_rate.max(1),
            final_attempts: config.final_report_attempts,
            retry_delay: config.error_timeout(),
        }
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self::from_worker(&WorkerConfig::default())
    }
}

/// State machine turning match events into uploads.
#[derive(Debug)]
pub struct SessionReducer {
    tally: MatchTally,
    report_rate: u32,
    /// Highest `games / report_rate` an upload was attempted for
    last_boundary: u32,
    state: SessionState,
}

impl SessionReducer {
    pub fn new(report_rate: u32) -> Self {
        Self {
            tally: MatchTally::new(),
            report_rate: report_rate.max(1),
            last_boundary: 0,
            state: SessionState::Running,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn tally(&self) -> &MatchTally {
        &self.tally
    }

    /// Feed one event. Terminal states ignore everything.
    pub fn apply(&mut self, event: MatchEvent, sink: &mut dyn ResultSink) -> SessionState {
        if self.state.is_terminal() {
            return self.state;
        }

        match event {
            MatchEvent::Crash => self.tally.record_crash(),
            MatchEvent::TimeLoss => self.tally.record_timeloss(),
            MatchEvent::ScoreUpdate(score) => {
                if !self.tally.update_score(score) {
                    warn!(?score, sent = ?self.tally.sent(), "ignoring score below acknowledged results");
                    return self.state;
                }
                let boundary = score.total_games() / self.report_rate;
                if boundary > self.last_boundary {
                    self.last_boundary = boundary;
                    self.report(sink);
                }
            }
            MatchEvent::StreamClosed => self.state = SessionState::Closed,
        }
        self.state
    }

    fn report(&mut self, sink: &mut dyn ResultSink) {
        let delta = self.tally.delta();
        if delta.is_empty() {
            return;
        }

        self.state = SessionState::Reporting;
        match sink.submit(&delta) {
            ReportStatus::Stop => {
                info!("coordinator stopped the workload");
                self.state = SessionState::Aborted;
            }
            ReportStatus::Unreachable => {
                warn!(?delta, "results not delivered, keeping them for the next report");
                self.state = SessionState::Running;
            }
            ReportStatus::Acknowledged => {
                info!(
                    wins = delta.wins,
                    losses = delta.losses,
                    draws = delta.draws,
                    crashes = delta.crashes,
                    timelosses = delta.timelosses,
                    "results reported"
                );
                self.tally.acknowledge(&delta);
                self.state = SessionState::Running;
            }
        }
    }

    /// Try to deliver whatever is still pending once the stream has closed.
    ///
    /// Returns `true` when nothing is left pending. A `STOP` reply moves the
    /// session to `Aborted`.
    pub fn flush(&mut self, sink: &mut dyn ResultSink, config: &ReporterConfig) -> bool {
        if self.state != SessionState::Closed {
            return self.tally.delta().is_empty();
        }

        for attempt in 0..config.final_attempts {
            let delta = self.tally.delta();
            if delta.is_empty() {
                return true;
            }
            if attempt > 0 {
                thread::sleep(config.retry_delay);
            }
            match sink.submit(&delta) {
                ReportStatus::Acknowledged => self.tally.acknowledge(&delta),
                ReportStatus::Stop => {
                    info!("coordinator stopped the workload");
                    self.state = SessionState::Aborted;
                    return false;
                }
                ReportStatus::Unreachable => {}
            }
        }

        let left = self.tally.delta();
        if !left.is_empty() {
            warn!(?left, "match finished with undelivered results");
        }
        left.is_empty()
    }
}

/// Result of draining one session.
#[derive(Debug)]
pub struct SessionOutcome {
    /// `Aborted` or `Closed`
    pub state: SessionState,
    pub tally: MatchTally,
    pub exit: ExitStatus,
}

/// Drive `events` through a reducer until it reaches a terminal state.
///
/// On `Closed` the remaining delta is flushed; on `Aborted` nothing more is
/// sent and the caller must tear down the runner.
pub fn reduce_events<I>(events: I, sink: &mut dyn ResultSink, config: &ReporterConfig) -> SessionReducer
where
    I: IntoIterator<Item = MatchEvent>,
{
    let mut reducer = SessionReducer::new(config.report_rate);
    for event in events {
        if reducer.apply(event, sink).is_terminal() {
            break;
        }
    }
    if !reducer.state().is_terminal() {
        reducer.apply(MatchEvent::StreamClosed, sink);
    }
    if reducer.state() == SessionState::Closed {
        reducer.flush(sink, config);
    }
    reducer
}

/// Consume a running session's output and report its results.
///
/// Returns once the runner has exited: on its own when its output closes, or
/// after the whole process tree was killed because the coordinator said STOP.
pub fn drain_session(
    process: &mut MatchProcess,
    sink: &mut dyn ResultSink,
    config: &ReporterConfig,
) -> io::Result<SessionOutcome> {
    let output = process
        .take_output()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "match output already taken"))?;

    let reducer = reduce_events(MatchEvents::new(output), sink, config);

    let exit = match reducer.state() {
        SessionState::Aborted => process.terminate()?,
        _ => process.wait()?,
    };
    let tally = reducer.tally().clone();
    info!(
        state = ?reducer.state(),
        score = ?tally.cumulative(),
        %exit,
        "match session finished"
    );

    Ok(SessionOutcome {
        state: reducer.state(),
        tally,
        exit,
    })
}

#[cfg(test)]
#[path = "reporter_tests.rs"]
mod reporter_tests;
