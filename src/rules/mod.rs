//! Cost heuristics.
//!
//! Each rule is a pure function of one descriptor and the context, returning
//! at most one finding. Rules for a kind live in a fixed slice and are all
//! evaluated; slice order is report order.

use time::OffsetDateTime;

use crate::core::{Finding, SavingsEstimate};
use crate::inventory::{Address, Instance, ResourceKind, Snapshot, Volume};

#[derive(Debug, Clone, PartialEq)]
pub struct CostThresholds {
    pub cpu_threshold_percent: f64,
    pub cpu_lookback_days: u32,
    pub snapshot_max_age_days: u32,
    pub ebs_price_per_gib_month: f64,
    pub snapshot_price_per_gib_month: f64,
    pub eip_price_month: f64,
}

impl Default for CostThresholds {
    fn default() -> Self {
        Self {
            cpu_threshold_percent: 10.0,
            cpu_lookback_days: 7,
            snapshot_max_age_days: 90,
            ebs_price_per_gib_month: 0.10,
            snapshot_price_per_gib_month: 0.05,
            eip_price_month: 3.60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuleContext {
    pub now: OffsetDateTime,
    pub thresholds: CostThresholds,
}

/// An instance together with the metrics gathered for it.
#[derive(Debug, Clone)]
pub struct ObservedInstance {
    pub instance: Instance,
    pub average_cpu: Option<f64>,
}

pub struct Rule<D> {
    pub id: &'static str,
    pub check: fn(&D, &RuleContext) -> Option<Finding>,
}

pub fn evaluate<D>(rules: &[Rule<D>], descriptor: &D, ctx: &RuleContext) -> Vec<Finding> {
    rules
        .iter()
        .filter_map(|rule| {
            let finding = (rule.check)(descriptor, ctx);
            if finding.is_some() {
                log::debug!("rule {} fired", rule.id);
            }
            finding
        })
        .collect()
}

pub const INSTANCE_RULES: &[Rule<ObservedInstance>] = &[
    Rule {
        id: "ec2-stopped",
        check: stopped_instance,
    },
    Rule {
        id: "ec2-old-generation",
        check: old_generation_instance,
    },
    Rule {
        id: "ec2-low-cpu",
        check: low_cpu_instance,
    },
];

pub const VOLUME_RULES: &[Rule<Volume>] = &[
    Rule {
        id: "ebs-unattached",
        check: unattached_volume,
    },
    Rule {
        id: "ebs-old-type",
        check: old_volume_type,
    },
];

pub const SNAPSHOT_RULES: &[Rule<Snapshot>] = &[Rule {
    id: "snapshot-stale",
    check: stale_snapshot,
}];

pub const ADDRESS_RULES: &[Rule<Address>] = &[Rule {
    id: "eip-unassociated",
    check: unassociated_address,
}];

fn stopped_instance(obs: &ObservedInstance, _ctx: &RuleContext) -> Option<Finding> {
    let instance = &obs.instance;
    if instance.state.as_deref() != Some("stopped") {
        return None;
    }
    if instance.root_device_type.as_deref() == Some("instance-store") {
        return None;
    }
    Some(Finding::new(
        &instance.instance_id,
        ResourceKind::Instances.category(),
        "Stopped instance still incurring EBS costs",
        "Terminate if not needed or create AMI and terminate",
        SavingsEstimate::LOW,
    ))
}

fn old_generation_instance(obs: &ObservedInstance, _ctx: &RuleContext) -> Option<Finding> {
    let instance_type = obs.instance.instance_type.as_deref()?;
    let upgrade = current_generation_of(instance_type)?;
    Some(Finding::new(
        &obs.instance.instance_id,
        ResourceKind::Instances.category(),
        format!("Old generation instance type: {instance_type}"),
        format!("Upgrade to {upgrade} for better price/performance"),
        SavingsEstimate::MEDIUM,
    ))
}

fn low_cpu_instance(obs: &ObservedInstance, ctx: &RuleContext) -> Option<Finding> {
    if obs.instance.state.as_deref() != Some("running") {
        return None;
    }
    let avg = obs.average_cpu?;
    if avg >= ctx.thresholds.cpu_threshold_percent {
        return None;
    }
    Some(Finding::new(
        &obs.instance.instance_id,
        ResourceKind::Instances.category(),
        format!("Low CPU utilization: {avg:.1}%"),
        "Consider downsizing or terminating",
        SavingsEstimate::HIGH,
    ))
}

fn unattached_volume(volume: &Volume, ctx: &RuleContext) -> Option<Finding> {
    if volume.state.as_deref() != Some("available") {
        return None;
    }
    let size = volume.size_gib?;
    Some(Finding::new(
        &volume.volume_id,
        ResourceKind::Volumes.category(),
        format!("Unattached {size}GB volume"),
        "Delete if not needed (create snapshot first)",
        SavingsEstimate::monthly(size as f64 * ctx.thresholds.ebs_price_per_gib_month),
    ))
}

fn old_volume_type(volume: &Volume, _ctx: &RuleContext) -> Option<Finding> {
    let volume_type = volume.volume_type.as_deref()?;
    let replacement = match volume_type {
        "standard" => "gp3",
        "io1" => "io2",
        _ => return None,
    };
    Some(Finding::new(
        &volume.volume_id,
        ResourceKind::Volumes.category(),
        format!("Old volume type: {volume_type}"),
        format!("Migrate to {replacement} for better cost/performance"),
        SavingsEstimate::LOW_MEDIUM,
    ))
}

fn stale_snapshot(snapshot: &Snapshot, ctx: &RuleContext) -> Option<Finding> {
    let started = snapshot.start_time?;
    let size = snapshot.volume_size_gib?;
    let max_age = ctx.thresholds.snapshot_max_age_days;
    let threshold = ctx
        .now
        .checked_sub(time::Duration::days(i64::from(max_age)))?;
    if started >= threshold {
        return None;
    }
    Some(Finding::new(
        &snapshot.snapshot_id,
        ResourceKind::Snapshots.category(),
        format!("Snapshot older than {max_age} days ({size}GB)"),
        "Review if still needed, delete if not",
        SavingsEstimate::monthly(size as f64 * ctx.thresholds.snapshot_price_per_gib_month),
    ))
}

fn unassociated_address(address: &Address, ctx: &RuleContext) -> Option<Finding> {
    if address.association_id.is_some() {
        return None;
    }
    Some(Finding::new(
        address.public_ip.as_deref().unwrap_or("Unknown"),
        ResourceKind::Addresses.category(),
        "Unassociated Elastic IP",
        "Release if not needed",
        SavingsEstimate::monthly(ctx.thresholds.eip_price_month),
    ))
}

/// Maps `t2`/`m4`/`c4` instance types to their successor family, keeping the size.
pub fn current_generation_of(instance_type: &str) -> Option<String> {
    const UPGRADES: [(&str, &str); 3] = [("t2", "t3"), ("m4", "m5"), ("c4", "c5")];
    UPGRADES.iter().find_map(|(old, new)| {
        instance_type
            .strip_prefix(old)
            .map(|rest| format!("{new}{rest}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn ctx() -> RuleContext {
        RuleContext {
            now: datetime!(2026-06-01 00:00 UTC),
            thresholds: CostThresholds::default(),
        }
    }

    fn instance(id: &str, ty: &str, state: &str) -> ObservedInstance {
        ObservedInstance {
            instance: Instance {
                instance_id: id.to_string(),
                instance_type: Some(ty.to_string()),
                state: Some(state.to_string()),
                root_device_type: Some("ebs".to_string()),
            },
            average_cpu: None,
        }
    }

    #[test]
    fn stopped_ebs_instance_is_flagged_low() {
        let findings = evaluate(INSTANCE_RULES, &instance("i-1", "m5.large", "stopped"), &ctx());
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.resource_id, "i-1");
        assert_eq!(f.resource_type, "EC2");
        assert_eq!(f.issue, "Stopped instance still incurring EBS costs");
        assert_eq!(f.potential_savings, SavingsEstimate::LOW);
    }

    #[test]
    fn stopped_instance_store_instance_is_not_flagged() {
        let mut obs = instance("i-1", "m5.large", "stopped");
        obs.instance.root_device_type = Some("instance-store".to_string());
        assert!(evaluate(INSTANCE_RULES, &obs, &ctx()).is_empty());
    }

    #[test]
    fn old_generation_suggests_successor_with_same_size() {
        let findings = evaluate(INSTANCE_RULES, &instance("i-2", "c4.2xlarge", "pending"), &ctx());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].issue, "Old generation instance type: c4.2xlarge");
        assert_eq!(
            findings[0].recommendation,
            "Upgrade to c5.2xlarge for better price/performance"
        );
        assert_eq!(findings[0].potential_savings, SavingsEstimate::MEDIUM);
    }

    #[test]
    fn current_generation_mapping() {
        assert_eq!(current_generation_of("t2.micro").as_deref(), Some("t3.micro"));
        assert_eq!(current_generation_of("m4.large").as_deref(), Some("m5.large"));
        assert_eq!(current_generation_of("m5.large"), None);
        assert_eq!(current_generation_of("t3a.nano"), None);
    }

    #[test]
    fn low_cpu_only_for_running_instances_below_threshold() {
        let mut obs = instance("i-3", "m5.large", "running");
        obs.average_cpu = Some(4.26);
        let findings = evaluate(INSTANCE_RULES, &obs, &ctx());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].issue, "Low CPU utilization: 4.3%");
        assert_eq!(findings[0].potential_savings, SavingsEstimate::HIGH);

        obs.average_cpu = Some(10.0);
        assert!(evaluate(INSTANCE_RULES, &obs, &ctx()).is_empty());

        obs.average_cpu = None;
        assert!(evaluate(INSTANCE_RULES, &obs, &ctx()).is_empty());

        let mut stopped = instance("i-4", "m5.large", "stopped");
        stopped.average_cpu = Some(1.0);
        let findings = evaluate(INSTANCE_RULES, &stopped, &ctx());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].issue, "Stopped instance still incurring EBS costs");
    }

    #[test]
    fn old_generation_and_stopped_fire_in_rule_order() {
        let findings = evaluate(INSTANCE_RULES, &instance("i-5", "t2.micro", "stopped"), &ctx());
        let issues: Vec<&str> = findings.iter().map(|f| f.issue.as_str()).collect();
        assert_eq!(
            issues,
            vec![
                "Stopped instance still incurring EBS costs",
                "Old generation instance type: t2.micro"
            ]
        );
    }

    #[test]
    fn missing_fields_never_fire() {
        let bare = ObservedInstance {
            instance: Instance {
                instance_id: "i-6".to_string(),
                ..Instance::default()
            },
            average_cpu: Some(0.0),
        };
        assert!(evaluate(INSTANCE_RULES, &bare, &ctx()).is_empty());

        let volume = Volume {
            volume_id: "vol-0".to_string(),
            state: Some("available".to_string()),
            ..Volume::default()
        };
        assert!(evaluate(VOLUME_RULES, &volume, &ctx()).is_empty());
    }

    #[test]
    fn unattached_standard_volume_yields_two_findings() {
        let volume = Volume {
            volume_id: "vol-1".to_string(),
            volume_type: Some("standard".to_string()),
            size_gib: Some(100),
            state: Some("available".to_string()),
        };
        let findings = evaluate(VOLUME_RULES, &volume, &ctx());
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].issue, "Unattached 100GB volume");
        assert_eq!(findings[0].potential_savings.to_string(), "~$10.00/month");
        assert_eq!(findings[1].issue, "Old volume type: standard");
        assert_eq!(
            findings[1].recommendation,
            "Migrate to gp3 for better cost/performance"
        );
    }

    #[test]
    fn io1_in_use_suggests_io2() {
        let volume = Volume {
            volume_id: "vol-2".to_string(),
            volume_type: Some("io1".to_string()),
            size_gib: Some(50),
            state: Some("in-use".to_string()),
        };
        let findings = evaluate(VOLUME_RULES, &volume, &ctx());
        assert_eq!(findings.len(), 1);
        assert!(findings[0].recommendation.contains("io2"));
    }

    #[test]
    fn snapshot_age_boundary() {
        let old = Snapshot {
            snapshot_id: "snap-old".to_string(),
            start_time: Some(datetime!(2026-03-02 23:59 UTC)),
            volume_size_gib: Some(20),
        };
        let findings = evaluate(SNAPSHOT_RULES, &old, &ctx());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].issue, "Snapshot older than 90 days (20GB)");
        assert_eq!(findings[0].potential_savings.to_string(), "~$1.00/month");

        let fresh = Snapshot {
            snapshot_id: "snap-new".to_string(),
            start_time: Some(datetime!(2026-03-03 00:00 UTC)),
            volume_size_gib: Some(20),
        };
        assert!(evaluate(SNAPSHOT_RULES, &fresh, &ctx()).is_empty());
    }

    #[test]
    fn snapshot_age_beyond_calendar_range_does_not_fire() {
        let mut ctx = ctx();
        ctx.thresholds.snapshot_max_age_days = 10_000_000;
        let ancient = Snapshot {
            snapshot_id: "snap-ancient".to_string(),
            start_time: Some(datetime!(2000-01-01 00:00 UTC)),
            volume_size_gib: Some(20),
        };
        assert!(evaluate(SNAPSHOT_RULES, &ancient, &ctx).is_empty());
    }

    #[test]
    fn unassociated_address_uses_public_ip_or_unknown() {
        let free = Address {
            public_ip: Some("203.0.113.5".to_string()),
            allocation_id: Some("eipalloc-1".to_string()),
            association_id: None,
        };
        let findings = evaluate(ADDRESS_RULES, &free, &ctx());
        assert_eq!(findings[0].resource_id, "203.0.113.5");
        assert_eq!(findings[0].potential_savings.to_string(), "~$3.60/month");

        let anonymous = Address::default();
        let findings = evaluate(ADDRESS_RULES, &anonymous, &ctx());
        assert_eq!(findings[0].resource_id, "Unknown");

        let bound = Address {
            association_id: Some("eipassoc-1".to_string()),
            ..Address::default()
        };
        assert!(evaluate(ADDRESS_RULES, &bound, &ctx()).is_empty());
    }
}
