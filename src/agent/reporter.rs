//! Reported-state construction and publishing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::{DesiredContainerSpec, DesiredSet};
use crate::error::Result;

use super::transport::ReportSink;

/// The document published upstream after a pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateReport {
    /// Name of the agent that ran the pass.
    pub agent: String,
    /// Identifier of the pass that produced this report.
    pub pass_id: Uuid,
    /// Per-container reported state, keyed by logical name.
    pub containers: BTreeMap<String, ReportedContainer>,
}

/// Reported state for a single container: the applied spec fields plus the
/// time the pass acted on them.
#[derive(Debug, Clone, Serialize)]
pub struct ReportedContainer {
    /// The spec the pass converged toward.
    #[serde(flatten)]
    pub spec: DesiredContainerSpec,
    /// When the pass acted on this entry.
    pub timestamp: DateTime<Utc>,
}

/// Builds and publishes state reports.
#[derive(Debug)]
pub struct StateReporter<S: ReportSink> {
    /// Sink the reports go to.
    sink: S,
    /// Agent name stamped on every report.
    agent_name: String,
}

impl<S: ReportSink> StateReporter<S> {
    /// Creates a new reporter.
    #[must_use]
    pub const fn new(sink: S, agent_name: String) -> Self {
        Self { sink, agent_name }
    }

    /// Builds the report for a pass.
    ///
    /// The report mirrors the applied delta, not the runtime's
    /// post-execution state: the remote store owns history, and per-entry
    /// execution failures surface through the pass summary and logs rather
    /// than this document.
    #[must_use]
    pub fn build_report(&self, pass_id: Uuid, delta: &DesiredSet) -> StateReport {
        let now = Utc::now();

        let containers = delta
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    ReportedContainer {
                        spec: spec.clone(),
                        timestamp: now,
                    },
                )
            })
            .collect();

        StateReport {
            agent: self.agent_name.clone(),
            pass_id,
            containers,
        }
    }

    /// Publishes a report through the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink rejects the report.
    pub async fn publish(&self, report: &StateReport) -> Result<()> {
        self.sink.publish(report).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::transport::LogReportSink;
    use crate::config::DesiredRunState;

    #[test]
    fn test_report_mirrors_delta_entries() {
        let mut delta = DesiredSet::new();
        delta.insert(
            "app",
            DesiredContainerSpec {
                image: String::from("myrepo/app"),
                tag: Some(String::from("v2")),
                state: DesiredRunState::Running,
                ..DesiredContainerSpec::default()
            },
        );
        delta.insert("worker", DesiredContainerSpec::default());

        let reporter = StateReporter::new(LogReportSink::new(), String::from("test-agent"));
        let report = reporter.build_report(Uuid::new_v4(), &delta);

        assert_eq!(report.agent, "test-agent");
        assert_eq!(report.containers.len(), 2);
        assert_eq!(
            report.containers.get("app").unwrap().spec.tag.as_deref(),
            Some("v2")
        );
    }

    #[test]
    fn test_report_serializes_with_wire_field_names() {
        let mut delta = DesiredSet::new();
        delta.insert(
            "app",
            DesiredContainerSpec {
                image: String::from("myrepo/app"),
                network_mode: Some(String::from("host")),
                ..DesiredContainerSpec::default()
            },
        );

        let reporter = StateReporter::new(LogReportSink::new(), String::from("test-agent"));
        let report = reporter.build_report(Uuid::new_v4(), &delta);

        let json = serde_json::to_value(&report).unwrap();
        let app = &json["containers"]["app"];
        assert_eq!(app["networkMode"], "host");
        assert!(app["timestamp"].is_string());
        assert!(json["passId"].is_string());
    }
}
