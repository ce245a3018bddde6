use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::rules::CostThresholds;
use crate::validate::ToolCommands;

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub ui: UiConfig,
    pub cost: CostConfig,
    pub validate: ValidateConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
    pub max_warnings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostConfig {
    pub region: String,
    pub aws_command: Vec<String>,
    pub cpu_threshold_percent: f64,
    pub cpu_lookback_days: u32,
    pub snapshot_max_age_days: u32,
    pub ebs_price_per_gib_month: f64,
    pub snapshot_price_per_gib_month: f64,
    pub eip_price_month: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateConfig {
    pub terraform_path: String,
    pub ansible_path: String,
    pub k8s_path: String,
    pub run_external_tools: bool,
    pub terraform_command: String,
    pub ansible_lint_command: String,
    pub exclude: Vec<String>,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        let thresholds = CostThresholds::default();
        let tools = ToolCommands::default();
        Self {
            ui: UiConfig {
                color: true,
                max_warnings: 5,
            },
            cost: CostConfig {
                region: "us-east-1".to_string(),
                aws_command: vec!["aws".to_string()],
                cpu_threshold_percent: thresholds.cpu_threshold_percent,
                cpu_lookback_days: thresholds.cpu_lookback_days,
                snapshot_max_age_days: thresholds.snapshot_max_age_days,
                ebs_price_per_gib_month: thresholds.ebs_price_per_gib_month,
                snapshot_price_per_gib_month: thresholds.snapshot_price_per_gib_month,
                eip_price_month: thresholds.eip_price_month,
            },
            validate: ValidateConfig {
                terraform_path: "projects".to_string(),
                ansible_path: "projects".to_string(),
                k8s_path: "projects".to_string(),
                run_external_tools: true,
                terraform_command: tools.terraform.join(" "),
                ansible_lint_command: tools.ansible_lint.join(" "),
                exclude: vec![],
            },
            config_path: None,
        }
    }
}

impl CostConfig {
    pub fn thresholds(&self) -> CostThresholds {
        CostThresholds {
            cpu_threshold_percent: self.cpu_threshold_percent,
            cpu_lookback_days: self.cpu_lookback_days,
            snapshot_max_age_days: self.snapshot_max_age_days,
            ebs_price_per_gib_month: self.ebs_price_per_gib_month,
            snapshot_price_per_gib_month: self.snapshot_price_per_gib_month,
            eip_price_month: self.eip_price_month,
        }
    }
}

impl ValidateConfig {
    pub fn tools(&self) -> ToolCommands {
        let defaults = ToolCommands::default();
        ToolCommands {
            terraform: ToolCommands::parse_command(&self.terraform_command, &defaults.terraform),
            ansible_lint: ToolCommands::parse_command(
                &self.ansible_lint_command,
                &defaults.ansible_lint,
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    ui: Option<RawUiConfig>,
    cost: Option<RawCostConfig>,
    validate: Option<RawValidateConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUiConfig {
    color: Option<bool>,
    max_warnings: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCostConfig {
    region: Option<String>,
    aws_command: Option<Vec<String>>,
    cpu_threshold_percent: Option<f64>,
    cpu_lookback_days: Option<u32>,
    snapshot_max_age_days: Option<u32>,
    ebs_price_per_gib_month: Option<f64>,
    snapshot_price_per_gib_month: Option<f64>,
    eip_price_month: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawValidateConfig {
    terraform_path: Option<String>,
    ansible_path: Option<String>,
    k8s_path: Option<String>,
    run_external_tools: Option<bool>,
    terraform_command: Option<String>,
    ansible_lint_command: Option<String>,
    exclude: Option<Vec<String>>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/infracheck/config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: Option<&Path>) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .or_else(|| home_dir.map(default_config_path));

    if let Some(path) = path.filter(|p| p.exists()) {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s)
            .with_context(|| format!("failed to parse config file (TOML): {}", path.display()))?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    } else if let Some(explicit) = config_path {
        return Err(anyhow::anyhow!(
            "config file not found: {}",
            explicit.display()
        ));
    }

    apply_env_overrides(&mut cfg)?;
    check_ranges(&cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(max_warnings) = ui.max_warnings {
            cfg.ui.max_warnings = max_warnings;
        }
    }

    if let Some(cost) = raw.cost {
        let c = &mut cfg.cost;
        if let Some(v) = cost.region {
            c.region = v;
        }
        if let Some(v) = cost.aws_command.filter(|v| !v.is_empty()) {
            c.aws_command = v;
        }
        if let Some(v) = cost.cpu_threshold_percent {
            c.cpu_threshold_percent = v;
        }
        if let Some(v) = cost.cpu_lookback_days {
            c.cpu_lookback_days = v;
        }
        if let Some(v) = cost.snapshot_max_age_days {
            c.snapshot_max_age_days = v;
        }
        if let Some(v) = cost.ebs_price_per_gib_month {
            c.ebs_price_per_gib_month = v;
        }
        if let Some(v) = cost.snapshot_price_per_gib_month {
            c.snapshot_price_per_gib_month = v;
        }
        if let Some(v) = cost.eip_price_month {
            c.eip_price_month = v;
        }
    }

    if let Some(validate) = raw.validate {
        let v = &mut cfg.validate;
        if let Some(p) = validate.terraform_path {
            v.terraform_path = p;
        }
        if let Some(p) = validate.ansible_path {
            v.ansible_path = p;
        }
        if let Some(p) = validate.k8s_path {
            v.k8s_path = p;
        }
        if let Some(run) = validate.run_external_tools {
            v.run_external_tools = run;
        }
        if let Some(cmd) = validate.terraform_command {
            v.terraform_command = cmd;
        }
        if let Some(cmd) = validate.ansible_lint_command {
            v.ansible_lint_command = cmd;
        }
        if let Some(exclude) = validate.exclude {
            v.exclude = exclude;
        }
    }
}

pub const MAX_DAYS: u32 = 36_500;

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Some(v) = env_var("INFRACHECK_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "INFRACHECK_UI_COLOR")?;
    }
    env_parse("INFRACHECK_UI_MAX_WARNINGS", &mut cfg.ui.max_warnings)?;

    let c = &mut cfg.cost;
    env_string("INFRACHECK_COST_REGION", &mut c.region);
    if let Some(v) = env_var("INFRACHECK_COST_AWS_COMMAND") {
        let parts: Vec<String> = v.split_whitespace().map(ToString::to_string).collect();
        if !parts.is_empty() {
            c.aws_command = parts;
        }
    }
    env_parse("INFRACHECK_COST_CPU_THRESHOLD_PERCENT", &mut c.cpu_threshold_percent)?;
    env_parse("INFRACHECK_COST_CPU_LOOKBACK_DAYS", &mut c.cpu_lookback_days)?;
    env_parse("INFRACHECK_COST_SNAPSHOT_MAX_AGE_DAYS", &mut c.snapshot_max_age_days)?;
    env_parse("INFRACHECK_COST_EBS_PRICE_PER_GIB_MONTH", &mut c.ebs_price_per_gib_month)?;
    env_parse(
        "INFRACHECK_COST_SNAPSHOT_PRICE_PER_GIB_MONTH",
        &mut c.snapshot_price_per_gib_month,
    )?;
    env_parse("INFRACHECK_COST_EIP_PRICE_MONTH", &mut c.eip_price_month)?;

    let v = &mut cfg.validate;
    env_string("INFRACHECK_VALIDATE_TERRAFORM_PATH", &mut v.terraform_path);
    env_string("INFRACHECK_VALIDATE_ANSIBLE_PATH", &mut v.ansible_path);
    env_string("INFRACHECK_VALIDATE_K8S_PATH", &mut v.k8s_path);
    env_string("INFRACHECK_VALIDATE_TERRAFORM_COMMAND", &mut v.terraform_command);
    env_string("INFRACHECK_VALIDATE_ANSIBLE_LINT_COMMAND", &mut v.ansible_lint_command);
    if let Some(s) = env_var("INFRACHECK_VALIDATE_RUN_EXTERNAL_TOOLS") {
        v.run_external_tools =
            parse_bool(&s).with_context(|| "INFRACHECK_VALIDATE_RUN_EXTERNAL_TOOLS")?;
    }
    if let Some(s) = env_var("INFRACHECK_VALIDATE_EXCLUDE") {
        let parts: Vec<String> = s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        if !parts.is_empty() {
            v.exclude = parts;
        }
    }

    Ok(())
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Blank values leave the setting unchanged.
fn env_string(key: &str, target: &mut String) {
    if let Some(v) = env_var(key) {
        let v = v.trim();
        if !v.is_empty() {
            *target = v.to_string();
        }
    }
}

fn env_parse<T>(key: &str, target: &mut T) -> Result<()>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(v) = env_var(key) {
        *target = v.trim().parse::<T>().with_context(|| key.to_string())?;
    }
    Ok(())
}

fn check_ranges(cfg: &EffectiveConfig) -> Result<()> {
    let c = &cfg.cost;
    for (key, days) in [
        ("cost.cpu_lookback_days", c.cpu_lookback_days),
        ("cost.snapshot_max_age_days", c.snapshot_max_age_days),
    ] {
        if days == 0 || days > MAX_DAYS {
            return Err(anyhow::anyhow!(
                "{key} must be between 1 and {MAX_DAYS} (got {days})"
            ));
        }
    }
    for (key, value) in [
        ("cost.cpu_threshold_percent", c.cpu_threshold_percent),
        ("cost.ebs_price_per_gib_month", c.ebs_price_per_gib_month),
        ("cost.snapshot_price_per_gib_month", c.snapshot_price_per_gib_month),
        ("cost.eip_price_month", c.eip_price_month),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow::anyhow!(
                "{key} must be a non-negative number (got {value})"
            ));
        }
    }
    Ok(())
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}
