//! Ordered fallback over several probes.
//!
//! Probes are tried one at a time in configured order. The first conclusive
//! outcome wins; a rate-limit verdict is conclusive, so a throttled source
//! never fans out to the remaining ones.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use handlewatch_schema::{Observation, Target};
use tracing::{debug, warn};

use crate::{Classifier, Probe, ProbeFailure, ProbeOutcome};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(20);

pub struct ProbeChain {
    probes: Vec<Arc<dyn Probe>>,
    probe_timeout: Duration,
}

impl Default for ProbeChain {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl ProbeChain {
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            probes: Vec::new(),
            probe_timeout,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn push(&mut self, probe: Arc<dyn Probe>) {
        self.probes.push(probe);
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.probes.iter().map(|probe| probe.name()).collect()
    }

    pub async fn run(&self, target: &Target) -> Observation {
        let mut last_failure: Option<ProbeFailure> = None;

        for probe in &self.probes {
            let outcome = match tokio::time::timeout(self.probe_timeout, probe.probe(target)).await {
                Ok(outcome) => outcome,
                Err(_) => ProbeOutcome::Inconclusive(ProbeFailure::Transport(format!(
                    "{} timed out after {}s",
                    probe.name(),
                    self.probe_timeout.as_secs()
                ))),
            };

            match outcome {
                ProbeOutcome::Conclusive(observation) => {
                    debug!(
                        probe = probe.name(),
                        target = %target,
                        status = %observation.kind,
                        "probe concluded"
                    );
                    return observation;
                }
                ProbeOutcome::Inconclusive(failure) => {
                    debug!(
                        probe = probe.name(),
                        target = %target,
                        reason = failure.detail(),
                        "probe inconclusive, falling back"
                    );
                    last_failure = Some(failure);
                }
                ProbeOutcome::Fatal(cause) => {
                    warn!(probe = probe.name(), target = %target, "probe chain aborted: {cause}");
                    return Observation::transport_error(cause);
                }
            }
        }

        match last_failure {
            Some(ProbeFailure::Transport(cause)) => Observation::transport_error(cause),
            Some(ProbeFailure::Mechanism(detail)) => Observation::unknown(detail),
            None => Observation::unknown("no probes configured"),
        }
    }
}

#[async_trait]
impl Classifier for ProbeChain {
    async fn classify(&self, target: &Target) -> Observation {
        self.run(target).await
    }
}
