use crate::core::{Finding, Grouped};
use serde::{Deserialize, Serialize};

/// The document written by `cost --export`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub analysis_date: String,
    pub scope: String,
    pub tool_version: String,
    pub total_findings: usize,
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl CostReport {
    /// Findings grouped by resource type, in the order the types first appeared.
    pub fn by_type(&self) -> Grouped<&Finding> {
        self.findings
            .iter()
            .map(|f| (f.resource_type.clone(), f))
            .collect()
    }
}
