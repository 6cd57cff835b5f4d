use std::time::Instant;

use anyhow::Result;
use tracing::instrument;

use crate::context::Context;
use crate::observability::MetricsCollector;
use crate::pipetree::Pipetree;
use crate::step::Flow;

/// Terminal value of a run. Built once when the run ends and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    signal: Flow,
    context: Context,
}

impl Outcome {
    pub fn new(signal: Flow, context: Context) -> Self {
        Self { signal, context }
    }

    /// `true` iff no step halted the run.
    pub fn succeeded(&self) -> bool {
        self.signal.is_continue()
    }

    pub fn failed(&self) -> bool {
        self.signal.is_halt()
    }

    pub fn signal(&self) -> Flow {
        self.signal
    }

    /// Final context, holding the effects of the steps that actually ran.
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn into_context(self) -> Context {
        self.context
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.context.get(key)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Executor {
    metrics: MetricsCollector,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(metrics: MetricsCollector) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> MetricsCollector {
        self.metrics.clone()
    }

    /// Runs every step of `pipetree` in order until one halts.
    ///
    /// Errors returned by a step are propagated as-is; the steps after it do
    /// not run.
    #[instrument(skip_all, fields(steps = pipetree.len()))]
    pub fn run(&self, pipetree: &Pipetree, context: Context) -> Result<Outcome> {
        let started = Instant::now();
        let mut context = context;
        let mut signal = Flow::Continue;

        for step in pipetree {
            let span = tracing::span!(tracing::Level::DEBUG, "step", step = step.name());
            let _span_guard = span.enter();
            let mut timer = self.metrics.start_step(step.name());
            tracing::debug!(mode = ?step.mode(), "Dispatching step");
            signal = step.call(&mut context)?;
            if signal.is_halt() {
                timer.mark_halted();
                tracing::debug!("Step halted the pipetree");
                break;
            }
        }

        self.metrics.record_run(signal, started.elapsed());
        tracing::debug!(signal = signal.as_str(), "Pipetree finished");
        Ok(Outcome::new(signal, context))
    }
}

/// Runs `pipetree` with a throwaway executor.
pub fn run(pipetree: &Pipetree, context: Context) -> Result<Outcome> {
    Executor::new().run(pipetree, context)
}
