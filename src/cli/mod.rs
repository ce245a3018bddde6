use std::io;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};

use crate::config::EffectiveConfig;
use crate::engine::{Engine, EngineOptions, ValidateRequest};
use crate::exit::ExitCode;
use crate::inventory::{AwsCliInventory, DumpInventory, Inventory};
use crate::ui::UiConfig;
use crate::validate::ValidateContext;

#[derive(Debug, Parser)]
#[command(
    name = "infracheck",
    version,
    about = "Flag cloud cost waste and check infrastructure-as-code against best practices"
)]
pub struct Cli {
    /// Print the JSON document to stdout instead of the text report
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Per-subprocess timeout in seconds
    #[arg(long, default_value_t = 120, global = true)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Analyze cloud resources for cost optimization opportunities
    Cost(CostArgs),
    /// Validate Terraform, Ansible and Kubernetes files
    Validate(ValidateArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct CostArgs {
    #[arg(long)]
    pub region: Option<String>,
    /// Write the findings as JSON to this file
    #[arg(long)]
    pub export: Option<PathBuf>,
    /// Read saved `aws ... --output json` responses from this directory
    #[arg(long)]
    pub inventory_dir: Option<PathBuf>,
    /// Exit with status 1 when any finding is reported
    #[arg(long)]
    pub fail_on_findings: bool,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[arg(long)]
    pub terraform_path: Option<PathBuf>,
    #[arg(long)]
    pub ansible_path: Option<PathBuf>,
    #[arg(long)]
    pub k8s_path: Option<PathBuf>,
    /// Write the per-category results as JSON to this file
    #[arg(long)]
    pub json_output: Option<PathBuf>,
    /// Do not run terraform or ansible-lint
    #[arg(long)]
    pub no_external: bool,
    #[arg(long)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(&cli);

    let home_dir = crate::platform::home_dir().ok();
    let env_config_path = std::env::var_os("INFRACHECK_CONFIG").map(PathBuf::from);
    let cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        home_dir.as_deref(),
    )
    .map_err(crate::exit::invalid_args_err)?;

    let stdout_is_tty = io::stdout().is_terminal();
    let ui_cfg = UiConfig {
        color: stdout_is_tty && cfg.ui.color && !cli.no_color,
        max_warnings: cfg.ui.max_warnings,
        quiet: cli.quiet,
    };

    let engine = Engine::new(EngineOptions {
        show_progress: !cli.quiet && !cli.json,
    });
    let timeout = Duration::from_secs(cli.timeout.max(1));

    match cli.command {
        Commands::Cost(args) => run_cost(args, &cfg, &ui_cfg, &engine, timeout, cli.json),
        Commands::Validate(args) => {
            run_validate(args, &cfg, &ui_cfg, &engine, timeout, cli.json)
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "infracheck", &mut out);
            Ok(ExitCode::Success)
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    crate::export::write_json_stdout(&cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !ui_cfg.quiet {
                eprintln!("config: use `infracheck config --show`");
            }
            Ok(ExitCode::Success)
        }
    }
}

fn run_cost(
    args: CostArgs,
    cfg: &EffectiveConfig,
    ui_cfg: &UiConfig,
    engine: &Engine,
    timeout: Duration,
    json: bool,
) -> Result<ExitCode> {
    let region = args.region.unwrap_or_else(|| cfg.cost.region.clone());
    if region.trim().is_empty() {
        return Err(crate::exit::invalid_args("cost: --region must not be empty"));
    }

    let inventory: Box<dyn Inventory> = match args.inventory_dir {
        Some(dir) => {
            if !dir.is_dir() {
                return Err(crate::exit::invalid_args(format!(
                    "cost: --inventory-dir is not a directory: {}",
                    dir.display()
                )));
            }
            Box::new(DumpInventory::new(dir, region))
        }
        None => Box::new(
            AwsCliInventory::new(region, timeout).with_command(cfg.cost.aws_command.clone()),
        ),
    };

    let ctx = crate::engine::rule_context_now(cfg.cost.thresholds());
    let report = engine.analyze_costs(inventory.as_ref(), &ctx);

    if json {
        crate::export::write_json_stdout(&report)?;
    } else {
        crate::ui::print_cost_report(&report, ui_cfg);
    }

    if let Some(path) = args.export {
        crate::export::write_json_file(&path, &report).map_err(crate::exit::report_write_err)?;
        if !ui_cfg.quiet && !json {
            println!();
            println!("Report exported to {}", path.display());
        }
    }

    Ok(ExitCode::from_failures(
        args.fail_on_findings && !report.findings.is_empty(),
    ))
}

fn run_validate(
    args: ValidateArgs,
    cfg: &EffectiveConfig,
    ui_cfg: &UiConfig,
    engine: &Engine,
    timeout: Duration,
    json: bool,
) -> Result<ExitCode> {
    let mut exclude = cfg.validate.exclude.clone();
    exclude.extend(args.exclude);
    exclude.sort();
    exclude.dedup();
    crate::validate::validate_excludes(&exclude).map_err(crate::exit::invalid_args_err)?;

    let ctx = ValidateContext::new(
        timeout,
        cfg.validate.run_external_tools && !args.no_external,
        cfg.validate.tools(),
        &exclude,
    )
    .map_err(crate::exit::invalid_args_err)?;

    let req = ValidateRequest {
        terraform_path: args
            .terraform_path
            .unwrap_or_else(|| PathBuf::from(&cfg.validate.terraform_path)),
        ansible_path: args
            .ansible_path
            .unwrap_or_else(|| PathBuf::from(&cfg.validate.ansible_path)),
        k8s_path: args
            .k8s_path
            .unwrap_or_else(|| PathBuf::from(&cfg.validate.k8s_path)),
    };

    let report = engine.validate(&req, &ctx);

    if json {
        crate::export::write_json_stdout(&report.results)?;
    } else {
        crate::ui::print_sections(&report.sections, ui_cfg);
        crate::ui::print_validation_summary(&report.results, ui_cfg);
    }

    if let Some(path) = args.json_output {
        crate::export::write_json_file(&path, &report.results)
            .map_err(crate::exit::report_write_err)?;
        if !ui_cfg.quiet && !json {
            println!();
            println!("Detailed results saved to {}", path.display());
        }
    }

    Ok(ExitCode::from_failures(report.results.has_failures()))
}

fn init_logging(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .try_init();
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (expected bash|zsh|fish)"
        ))),
    }
}
