//! One workload, end to end.
//!
//! Book check, engine provisioning and bench validation for both sides,
//! speed report, session launch, then live result reporting until the runner
//! finishes or the coordinator stops the test.

use std::path::Path;

use coordinator::Coordinator;
use provisioning::{BenchRunner, BenchValidator, ConsensusError, Downloader, Provisioner};
use tournament::{drain_session, CoordinatorSink, ReporterConfig, SessionParameters, SessionState};
use tracing::{error, info};
use worker_core::{EngineDescriptor, MatchTally, WorkerConfig, Workload};

use crate::book::ensure_book;
use crate::error::WorkloadError;

/// How a workload ended when nothing went wrong locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadOutcome {
    /// The runner played out its games.
    Completed(MatchTally),
    /// The coordinator answered `STOP`.
    Aborted(MatchTally),
}

/// Borrowed collaborators for running workloads on this machine.
pub struct WorkloadPipeline<'a, C: Coordinator + ?Sized, R: BenchRunner + Sync> {
    pub config: &'a WorkerConfig,
    pub coordinator: &'a C,
    pub provisioner: &'a Provisioner,
    pub validator: &'a BenchValidator<R>,
    pub downloader: &'a dyn Downloader,
    /// Directory holding opening books
    pub workdir: &'a Path,
    /// Match runner executable
    pub runner: &'a Path,
    pub threads: u32,
}

impl<C: Coordinator + ?Sized, R: BenchRunner + Sync> WorkloadPipeline<'_, C, R> {
    pub fn process(&self, workload: &Workload) -> Result<WorkloadOutcome, WorkloadError> {
        let test = &workload.test;
        info!(
            test = %test.id,
            engine = %test.engine,
            dev = %test.dev.name,
            base = %test.base.name,
            tc = %test.time_control,
            "starting workload"
        );

        ensure_book(&test.book, self.workdir, self.downloader)?;

        let dev_nps = self.prepare_engine(workload, &test.dev)?;
        let base_nps = self.prepare_engine(workload, &test.base)?;

        let nps = (dev_nps + base_nps) / 2.0;
        info!(dev_nps, base_nps, nps, "machine speed");
        self.coordinator.submit_nps(&workload.machine.id, nps);

        let params = SessionParameters::build(workload, self.threads, dev_nps, base_nps, self.config)?;
        let mut process = params.launch(self.runner)?;

        let mut sink = CoordinatorSink {
            coordinator: self.coordinator,
            machine_id: &workload.machine.id,
            result_id: &workload.result.id,
            test_id: &test.id,
        };
        let outcome = drain_session(&mut process, &mut sink, &ReporterConfig::from_worker(self.config))
            .map_err(WorkloadError::Session)?;

        Ok(match outcome.state {
            SessionState::Aborted => WorkloadOutcome::Aborted(outcome.tally),
            _ => WorkloadOutcome::Completed(outcome.tally),
        })
    }

    /// Provision and validate one side, returning its measured speed.
    fn prepare_engine(&self, workload: &Workload, engine: &EngineDescriptor) -> Result<f64, WorkloadError> {
        let binary = self.provisioner.ensure(engine, &workload.test.engine)?;
        match self.validator.validate(&binary, engine) {
            Ok(summary) => Ok(summary.nps),
            Err(err) => {
                self.report_wrong_bench(workload, engine, &err);
                Err(err.into())
            }
        }
    }

    fn report_wrong_bench(&self, workload: &Workload, engine: &EngineDescriptor, err: &ConsensusError) {
        error!(test = %workload.test.id, engine = %engine.name, %err, "engine failed bench validation");
        self.coordinator.wrong_bench(&workload.test.id, &engine.id);
    }
}
