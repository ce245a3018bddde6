use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::{CostReport, Finding, SectionOutcome, ValidationReport, ValidationResults};
use crate::inventory::{CpuWindow, Inventory, ResourceKind};
use crate::rules::{self, ObservedInstance, RuleContext};
use crate::validate::{self, ValidateContext};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub show_progress: bool,
}

#[derive(Debug, Clone)]
pub struct Engine {
    opts: EngineOptions,
}

type Validator = fn(&Path, &ValidateContext) -> SectionOutcome;

#[derive(Debug, Clone)]
pub struct ValidateRequest {
    pub terraform_path: PathBuf,
    pub ansible_path: PathBuf,
    pub k8s_path: PathBuf,
}

impl Engine {
    pub fn new(opts: EngineOptions) -> Self {
        Self { opts }
    }

    /// Runs every cost rule over every resource kind. A kind that cannot be
    /// enumerated is logged, noted in the report, and skipped.
    pub fn analyze_costs(&self, inventory: &dyn Inventory, ctx: &RuleContext) -> CostReport {
        let mut findings = Vec::new();
        let mut notes = Vec::new();

        for kind in ResourceKind::ALL {
            let pb = self.spinner(format!("Analyzing {kind}..."));
            log::info!("analyzing {kind} in {}", inventory.scope());

            let result = analyze_kind(inventory, kind, ctx);

            if let Some(pb) = pb {
                pb.finish_and_clear();
            }
            match result {
                Ok(mut found) => {
                    log::info!("{kind}: {} finding(s)", found.len());
                    findings.append(&mut found);
                }
                Err(err) => {
                    log::warn!("error analyzing {kind}: {err:#}");
                    notes.push(format!("Error analyzing {kind}: {err:#}"));
                }
            }
        }

        let analysis_date = ctx
            .now
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());

        CostReport {
            analysis_date,
            scope: inventory.scope().to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            total_findings: findings.len(),
            findings,
            notes,
        }
    }

    pub fn validate(&self, req: &ValidateRequest, ctx: &ValidateContext) -> ValidationReport {
        let mut results = ValidationResults::with_categories(&validate::CATEGORIES);
        let mut sections = Vec::new();

        let steps: [(&str, &PathBuf, Validator); 3] = [
            (validate::TERRAFORM, &req.terraform_path, validate::validate_terraform),
            (validate::ANSIBLE, &req.ansible_path, validate::validate_ansible),
            (validate::KUBERNETES, &req.k8s_path, validate::validate_kubernetes),
        ];

        for (category, path, run) in steps {
            let pb = self.spinner(format!("Validating {category} in {}...", path.display()));
            let section = run(path, ctx);
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }
            log::info!(
                "{category}: {} check(s) in {}",
                section.checks.len(),
                path.display()
            );
            results.record_section(&section);
            sections.push(section);
        }

        ValidationReport { sections, results }
    }

    fn spinner(&self, message: String) -> Option<indicatif::ProgressBar> {
        use std::io::IsTerminal;
        if !(self.opts.show_progress && std::io::stderr().is_terminal()) {
            return None;
        }
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}

pub fn rule_context_now(thresholds: rules::CostThresholds) -> RuleContext {
    RuleContext {
        now: OffsetDateTime::now_utc(),
        thresholds,
    }
}

fn analyze_kind(
    inventory: &dyn Inventory,
    kind: ResourceKind,
    ctx: &RuleContext,
) -> Result<Vec<Finding>> {
    let mut out = Vec::new();
    match kind {
        ResourceKind::Instances => {
            let lookback = ctx.thresholds.cpu_lookback_days;
            let window = CpuWindow::trailing_days(ctx.now, lookback);
            if window.is_none() {
                log::warn!("CPU lookback of {lookback} days is out of range; skipping CPU metrics");
            }
            for instance in inventory.instances()? {
                let average_cpu = match window {
                    Some(window) if instance.state.as_deref() == Some("running") => {
                        average_cpu_or_none(inventory, &instance.instance_id, window)
                    }
                    _ => None,
                };
                let observed = ObservedInstance {
                    instance,
                    average_cpu,
                };
                out.extend(rules::evaluate(rules::INSTANCE_RULES, &observed, ctx));
            }
        }
        ResourceKind::Volumes => {
            for volume in inventory.volumes()? {
                out.extend(rules::evaluate(rules::VOLUME_RULES, &volume, ctx));
            }
        }
        ResourceKind::Snapshots => {
            for snapshot in inventory.snapshots()? {
                out.extend(rules::evaluate(rules::SNAPSHOT_RULES, &snapshot, ctx));
            }
        }
        ResourceKind::Addresses => {
            for address in inventory.addresses()? {
                out.extend(rules::evaluate(rules::ADDRESS_RULES, &address, ctx));
            }
        }
    }
    Ok(out)
}

fn average_cpu_or_none(inventory: &dyn Inventory, instance_id: &str, window: CpuWindow) -> Option<f64> {
    match inventory.average_cpu(instance_id, window) {
        Ok(avg) => avg,
        Err(err) => {
            log::warn!("no CPU metrics for {instance_id}: {err:#}");
            None
        }
    }
}
