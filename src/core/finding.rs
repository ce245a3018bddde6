use crate::core::SavingsEstimate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "resource")]
    pub resource_id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub issue: String,
    pub recommendation: String,
    pub potential_savings: SavingsEstimate,
}

impl Finding {
    pub fn new(
        resource_id: impl Into<String>,
        resource_type: impl Into<String>,
        issue: impl Into<String>,
        recommendation: impl Into<String>,
        potential_savings: SavingsEstimate,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_type: resource_type.into(),
            issue: issue.into(),
            recommendation: recommendation.into(),
            potential_savings,
        }
    }
}
