use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
}

/// One line of validator output.
///
/// `detail` is what gets printed; `entry` is the short text recorded in the
/// category results, if the check records anything at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub status: CheckStatus,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
}

impl Check {
    pub fn pass(detail: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Pass,
            detail: detail.into(),
            entry: Some(entry.into()),
        }
    }

    pub fn fail(detail: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Fail,
            detail: detail.into(),
            entry: Some(entry.into()),
        }
    }

    pub fn warn(detail: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Warn,
            detail: detail.into(),
            entry: Some(entry.into()),
        }
    }

    /// A warning shown on the console but not recorded.
    pub fn notice(detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Warn,
            detail: detail.into(),
            entry: None,
        }
    }

    pub fn info(detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Info,
            detail: detail.into(),
            entry: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryResults {
    pub passed: Vec<String>,
    pub failed: Vec<String>,
    pub warnings: Vec<String>,
}

impl CategoryResults {
    pub fn record(&mut self, check: &Check) {
        let Some(entry) = &check.entry else {
            return;
        };
        match check.status {
            CheckStatus::Pass => self.passed.push(entry.clone()),
            CheckStatus::Fail => self.failed.push(entry.clone()),
            CheckStatus::Warn => self.warnings.push(entry.clone()),
            CheckStatus::Info => {}
        }
    }

    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len() + self.warnings.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SectionStatus {
    Completed,
    Skipped { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionOutcome {
    pub category: String,
    pub path: String,
    pub status: SectionStatus,
    pub checks: Vec<Check>,
}

impl SectionOutcome {
    pub fn completed(category: &str, path: &str, checks: Vec<Check>) -> Self {
        Self {
            category: category.to_string(),
            path: path.to_string(),
            status: SectionStatus::Completed,
            checks,
        }
    }

    pub fn skipped(category: &str, path: &str, message: impl Into<String>) -> Self {
        Self {
            category: category.to_string(),
            path: path.to_string(),
            status: SectionStatus::Skipped {
                message: message.into(),
            },
            checks: Vec::new(),
        }
    }
}

/// Category -> passed/failed/warnings, in category registration order.
///
/// This is the document written by `validate --json-output`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResults {
    categories: Vec<(String, CategoryResults)>,
}

impl ValidationResults {
    pub fn with_categories(categories: &[&str]) -> Self {
        let mut results = Self::default();
        for category in categories {
            results.category_mut(category);
        }
        results
    }

    pub fn category_mut(&mut self, category: &str) -> &mut CategoryResults {
        let idx = match self.categories.iter().position(|(c, _)| c == category) {
            Some(idx) => idx,
            None => {
                self.categories
                    .push((category.to_string(), CategoryResults::default()));
                self.categories.len() - 1
            }
        };
        &mut self.categories[idx].1
    }

    pub fn get(&self, category: &str) -> Option<&CategoryResults> {
        self.categories
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CategoryResults)> {
        self.categories.iter().map(|(c, r)| (c.as_str(), r))
    }

    pub fn record_section(&mut self, section: &SectionOutcome) {
        let results = self.category_mut(&section.category);
        for check in &section.checks {
            results.record(check);
        }
    }

    pub fn total_failures(&self) -> usize {
        self.iter().map(|(_, r)| r.failed.len()).sum()
    }

    pub fn has_failures(&self) -> bool {
        self.total_failures() > 0
    }
}

impl Serialize for ValidationResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for (category, results) in &self.categories {
            map.serialize_entry(category, results)?;
        }
        map.end()
    }
}

struct ValidationResultsVisitor;

impl<'de> Visitor<'de> for ValidationResultsVisitor {
    type Value = ValidationResults;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of category to passed/failed/warnings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut out = ValidationResults::default();
        while let Some((category, results)) = access.next_entry::<String, CategoryResults>()? {
            *out.category_mut(&category) = results;
        }
        Ok(out)
    }
}

impl<'de> Deserialize<'de> for ValidationResults {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ValidationResultsVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub sections: Vec<SectionOutcome>,
    pub results: ValidationResults,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_routes_entries_by_status() {
        let mut r = CategoryResults::default();
        r.record(&Check::pass("ok", "Formatting correct"));
        r.record(&Check::fail("bad", "Run terraform fmt"));
        r.record(&Check::warn("meh", "Pin provider versions"));
        r.record(&Check::notice("Terraform not installed"));
        r.record(&Check::info("Uses privilege escalation"));

        assert_eq!(r.passed, vec!["Formatting correct"]);
        assert_eq!(r.failed, vec!["Run terraform fmt"]);
        assert_eq!(r.warnings, vec!["Pin provider versions"]);
        assert_eq!(r.total(), 3);
    }

    #[test]
    fn failures_counted_across_categories() {
        let mut results = ValidationResults::with_categories(&["terraform", "kubernetes"]);
        assert!(!results.has_failures());

        results
            .category_mut("kubernetes")
            .failed
            .push("app.yaml: Add resource limits".to_string());
        assert_eq!(results.total_failures(), 1);
        assert!(results.has_failures());
    }

    #[test]
    fn json_shape_is_category_map() {
        let mut results = ValidationResults::with_categories(&["terraform", "ansible"]);
        results
            .category_mut("terraform")
            .passed
            .push("Remote state configured".to_string());

        let v = serde_json::to_value(&results).expect("serialize");
        assert_eq!(
            v,
            serde_json::json!({
                "terraform": {"passed": ["Remote state configured"], "failed": [], "warnings": []},
                "ansible": {"passed": [], "failed": [], "warnings": []}
            })
        );

        let s = serde_json::to_string(&results).expect("serialize");
        let back: ValidationResults = serde_json::from_str(&s).expect("deserialize");
        assert_eq!(back, results);
        let cats: Vec<&str> = back.iter().map(|(c, _)| c).collect();
        assert_eq!(cats, vec!["terraform", "ansible"]);
    }
}
