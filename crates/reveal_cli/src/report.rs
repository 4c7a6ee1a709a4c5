//! JSON summary printed after a simulated session.

use html::{DOM, NodeKey};
use reveal::{DispatchOutcome, DispatchReport};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub containers: usize,
    pub frames: u64,
    pub deferred_frames: u64,
    pub dispatches: Vec<DispatchEntry>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DispatchEntry {
    pub container: String,
    pub target: Option<String>,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// `#id` when the element has one, otherwise its tag and arena key.
pub fn describe(dom: &DOM, key: NodeKey) -> String {
    match dom.attr(key, "id") {
        Some(id) if !id.is_empty() => format!("#{id}"),
        _ => format!("<{}> {key}", dom.tag_name(key).unwrap_or("node")),
    }
}

impl DispatchEntry {
    pub fn new(dom: &DOM, report: &DispatchReport) -> Self {
        let (outcome, detail) = match &report.outcome {
            DispatchOutcome::Started { frame, .. } => ("started", Some(format!("frame {frame}"))),
            DispatchOutcome::AlreadyRunning { .. } => ("already-running", None),
            DispatchOutcome::Failed { error, .. } => ("failed", Some(error.to_string())),
            DispatchOutcome::Abandoned { .. } => ("abandoned", None),
            DispatchOutcome::Skipped => ("skipped", None),
        };
        Self {
            container: describe(dom, report.container),
            target: report.outcome.target().map(|target| describe(dom, target)),
            outcome,
            detail,
        }
    }
}
