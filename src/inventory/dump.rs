use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

use super::{Address, CpuWindow, Instance, Inventory, RawMetricStatistics, Snapshot, Volume};

/// Inventory read from saved `aws ... --output json` responses.
///
/// Layout: `instances.json`, `volumes.json`, `snapshots.json`,
/// `addresses.json`, and optionally `metrics.json` mapping instance id to a
/// `get-metric-statistics` response. The CPU window is not applied to dumps.
#[derive(Debug, Clone)]
pub struct DumpInventory {
    dir: PathBuf,
    scope: String,
    metrics: OnceCell<BTreeMap<String, Option<f64>>>,
}

impl DumpInventory {
    pub fn new(dir: impl Into<PathBuf>, scope: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            scope: scope.into(),
            metrics: OnceCell::new(),
        }
    }

    fn read(&self, file: &str) -> Result<String> {
        let path = self.dir.join(file);
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read inventory dump: {}", path.display()))
    }
}

impl Inventory for DumpInventory {
    fn scope(&self) -> &str {
        &self.scope
    }

    fn instances(&self) -> Result<Vec<Instance>> {
        super::parse_instances(&self.read("instances.json")?)
    }

    fn volumes(&self) -> Result<Vec<Volume>> {
        super::parse_volumes(&self.read("volumes.json")?)
    }

    fn snapshots(&self) -> Result<Vec<Snapshot>> {
        super::parse_snapshots(&self.read("snapshots.json")?)
    }

    fn addresses(&self) -> Result<Vec<Address>> {
        super::parse_addresses(&self.read("addresses.json")?)
    }

    fn average_cpu(&self, instance_id: &str, _window: CpuWindow) -> Result<Option<f64>> {
        Ok(self.metrics()?.get(instance_id).copied().flatten())
    }
}

impl DumpInventory {
    /// Mean CPU per instance from `metrics.json`, parsed on first use.
    /// A missing file means no instance has metrics.
    fn metrics(&self) -> Result<&BTreeMap<String, Option<f64>>> {
        if let Some(metrics) = self.metrics.get() {
            return Ok(metrics);
        }
        let loaded = if self.dir.join("metrics.json").exists() {
            let raw: BTreeMap<String, RawMetricStatistics> =
                serde_json::from_str(&self.read("metrics.json")?)
                    .context("malformed metrics.json")?;
            raw.into_iter()
                .map(|(id, stats)| (id, stats.mean_average()))
                .collect()
        } else {
            BTreeMap::new()
        };
        Ok(self.metrics.get_or_init(|| loaded))
    }
}
