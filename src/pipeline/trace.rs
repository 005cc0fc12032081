//! Per-request stage trace.
//!
//! Every triage request produces a [`PipelineTrace`] recording which
//! stages ran and how long each took. The trace goes into the audit
//! record, never into the HTTP response (responses stay byte-identical
//! for identical inputs).

use serde::Serialize;
use std::time::Duration;

/// One stage entry in a trace.
#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    /// Stage name, e.g. `rules_check`.
    pub stage: &'static str,
    /// Wall-clock time spent in the stage, in milliseconds.
    pub elapsed_ms: u64,
}

/// Ordered record of the stages a request passed through.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct PipelineTrace {
    stages: Vec<StageTiming>,
}

impl PipelineTrace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage with its elapsed time.
    pub fn record(&mut self, stage: &'static str, elapsed: Duration) {
        self.stages.push(StageTiming {
            stage,
            elapsed_ms: elapsed.as_millis() as u64,
        });
    }

    /// Whether the named stage appears in the trace.
    #[must_use]
    pub fn contains(&self, stage: &str) -> bool {
        self.stages.iter().any(|s| s.stage == stage)
    }

    /// The recorded stages, in order.
    #[must_use]
    pub fn stages(&self) -> &[StageTiming] {
        &self.stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let mut trace = PipelineTrace::new();
        trace.record("preprocess", Duration::from_millis(1));
        trace.record("rules_check", Duration::from_millis(2));
        let names: Vec<&str> = trace.stages().iter().map(|s| s.stage).collect();
        assert_eq!(names, vec!["preprocess", "rules_check"]);
        assert!(trace.contains("rules_check"));
        assert!(!trace.contains("llm_parse"));
    }

    #[test]
    fn serializes_as_array() {
        let mut trace = PipelineTrace::new();
        trace.record("execute", Duration::from_millis(3));
        let json = serde_json::to_value(&trace).expect("serialize");
        assert!(json.is_array());
        assert_eq!(json[0]["stage"], "execute");
    }
}
