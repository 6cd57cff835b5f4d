use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::step::Flow;

#[derive(Debug, Default, Serialize, Clone)]
pub struct MetricsSnapshot {
    pub steps: BTreeMap<String, StepMetrics>,
    pub runs: u64,
    pub succeeded: u64,
    pub halted: u64,
    pub total_duration_ms: f64,
}

#[derive(Debug, Default, Serialize, Clone)]
pub struct StepMetrics {
    pub calls: u64,
    pub halts: u64,
    pub total_duration_ms: f64,
    pub max_duration_ms: f64,
}

/// Shared, cloneable sink for run and step measurements.
#[derive(Debug, Default, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsSnapshot>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts timing one step invocation. The call is recorded when the
    /// timer is dropped, so a step whose error propagates still counts.
    pub fn start_step(&self, step_name: &str) -> StepTimer {
        StepTimer {
            step: step_name.to_string(),
            started_at: Instant::now(),
            collector: self.inner.clone(),
            halted: false,
            recorded: false,
        }
    }

    pub fn record_run(&self, flow: Flow, duration: Duration) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.runs += 1;
            match flow {
                Flow::Continue => guard.succeeded += 1,
                Flow::Halt => guard.halted += 1,
            }
            guard.total_duration_ms += duration.as_secs_f64() * 1_000.0;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn reset(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = MetricsSnapshot::default();
        }
    }
}

pub struct StepTimer {
    step: String,
    started_at: Instant,
    collector: Arc<Mutex<MetricsSnapshot>>,
    halted: bool,
    recorded: bool,
}

impl StepTimer {
    pub fn mark_halted(&mut self) {
        self.halted = true;
    }

    fn record(&mut self) {
        if self.recorded {
            return;
        }
        let duration = self.started_at.elapsed();
        let duration_ms = duration.as_secs_f64() * 1_000.0;
        if let Ok(mut guard) = self.collector.lock() {
            let metrics = guard.steps.entry(self.step.clone()).or_default();
            metrics.calls += 1;
            if self.halted {
                metrics.halts += 1;
            }
            metrics.total_duration_ms += duration_ms;
            if duration_ms > metrics.max_duration_ms {
                metrics.max_duration_ms = duration_ms;
            }
        }
        debug!(
            step = self.step.as_str(),
            duration_ms,
            halted = self.halted,
            "Step duration recorded"
        );
        self.recorded = true;
    }
}

impl Drop for StepTimer {
    fn drop(&mut self) {
        self.record();
    }
}

pub fn log_snapshot(snapshot: &MetricsSnapshot) {
    info!(
        runs = snapshot.runs,
        succeeded = snapshot.succeeded,
        halted = snapshot.halted,
        total_duration_ms = snapshot.total_duration_ms,
        step_count = snapshot.steps.len(),
        "Pipetree metrics summary"
    );
    for (step, metrics) in &snapshot.steps {
        info!(
            step = step.as_str(),
            calls = metrics.calls,
            halts = metrics.halts,
            total_ms = metrics.total_duration_ms,
            max_ms = metrics.max_duration_ms,
            "Step metrics"
        );
    }
}

impl MetricsSnapshot {
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();
        output.push_str("# HELP pipetree_runs_total Total number of pipetree runs\n");
        output.push_str("# TYPE pipetree_runs_total counter\n");
        output.push_str(&format!("pipetree_runs_total {}\n", self.runs));
        output.push_str("# HELP pipetree_runs_halted_total Runs stopped by a halting step\n");
        output.push_str("# TYPE pipetree_runs_halted_total counter\n");
        output.push_str(&format!("pipetree_runs_halted_total {}\n", self.halted));
        output.push_str("# HELP pipetree_step_calls_total Step invocation count\n");
        output.push_str("# TYPE pipetree_step_calls_total counter\n");
        output.push_str("# HELP pipetree_step_halts_total Step halt count\n");
        output.push_str("# TYPE pipetree_step_halts_total counter\n");
        output.push_str(
            "# HELP pipetree_step_duration_seconds_total Accumulated step duration in seconds\n",
        );
        output.push_str("# TYPE pipetree_step_duration_seconds_total counter\n");
        output.push_str("# HELP pipetree_step_duration_seconds_max Maximum step duration in seconds\n");
        output.push_str("# TYPE pipetree_step_duration_seconds_max gauge\n");
        for (step, metrics) in &self.steps {
            output.push_str(&format!(
                "pipetree_step_calls_total{{step=\"{}\"}} {}\n",
                step, metrics.calls
            ));
            output.push_str(&format!(
                "pipetree_step_halts_total{{step=\"{}\"}} {}\n",
                step, metrics.halts
            ));
            output.push_str(&format!(
                "pipetree_step_duration_seconds_total{{step=\"{}\"}} {:.6}\n",
                step,
                metrics.total_duration_ms / 1_000.0
            ));
            output.push_str(&format!(
                "pipetree_step_duration_seconds_max{{step=\"{}\"}} {:.6}\n",
                step,
                metrics.max_duration_ms / 1_000.0
            ));
        }
        output.push_str("# HELP pipetree_run_duration_seconds_total Accumulated run duration\n");
        output.push_str("# TYPE pipetree_run_duration_seconds_total counter\n");
        output.push_str(&format!(
            "pipetree_run_duration_seconds_total {:.6}\n",
            self.total_duration_ms / 1_000.0
        ));
        output
    }
}
