use std::path::Path;

use crate::core::{Check, SectionOutcome};
use crate::platform::{self, CommandRunOptions};

use super::{TERRAFORM, ValidateContext, discover, file_label, run_tool};

pub fn validate_terraform(path: &Path, ctx: &ValidateContext) -> SectionOutcome {
    let path_s = path.display().to_string();
    let files = discover(path, &["tf"], &ctx.excludes);
    if files.is_empty() {
        return SectionOutcome::skipped(TERRAFORM, &path_s, "No Terraform files found");
    }

    let mut checks = Vec::new();
    let mut sources = Vec::new();
    for file in &files {
        match std::fs::read_to_string(file) {
            Ok(text) => sources.push((file_label(file), text)),
            Err(err) => {
                log::warn!("terraform: failed to read {}: {err}", file.display());
                checks.push(Check::notice(format!(
                    "{}: Could not read: {err}",
                    file_label(file)
                )));
            }
        }
    }

    checks.push(remote_state_check(&sources));
    checks.push(provider_pinning_check(&sources));
    checks.extend(tagging_checks(&sources));

    if ctx.run_external_tools {
        checks.push(fmt_check(path, ctx));
        checks.push(validate_check(path, ctx));
    }

    SectionOutcome::completed(TERRAFORM, &path_s, checks)
}

fn remote_state_check(sources: &[(String, String)]) -> Check {
    if sources.iter().any(|(_, text)| text.contains("backend")) {
        Check::pass("Remote state backend configured", "Remote state configured")
    } else {
        Check::fail("No remote state backend found", "Missing remote state backend")
    }
}

fn provider_pinning_check(sources: &[(String, String)]) -> Check {
    if sources
        .iter()
        .any(|(_, text)| text.contains("required_providers"))
    {
        Check::pass("Provider versions pinned", "Provider versions pinned")
    } else {
        Check::warn("Provider versions not explicitly set", "Pin provider versions")
    }
}

fn tagging_checks(sources: &[(String, String)]) -> Vec<Check> {
    sources
        .iter()
        .filter(|(_, text)| text.contains("resource ") && !text.contains("tags"))
        .map(|(name, _)| {
            Check::warn(
                format!("{name}: Resources may be missing tags"),
                format!("{name}: Add tags"),
            )
        })
        .collect()
}

fn fmt_check(path: &Path, ctx: &ValidateContext) -> Check {
    let path_s = path.display().to_string();
    let args = ["fmt", "-check", "-recursive", path_s.as_str()];
    match run_tool(
        &ctx.tools.terraform,
        &args,
        ctx.timeout,
        &CommandRunOptions::default(),
    ) {
        Ok(out) if out.success() => {
            Check::pass("Terraform formatting is correct", "Formatting correct")
        }
        Ok(_) => Check::fail("Terraform needs formatting", "Run terraform fmt"),
        Err(err) if platform::is_not_found(&err) => Check::notice("Terraform not installed"),
        Err(err) => {
            log::warn!("terraform fmt: {err:#}");
            Check::notice(format!("Could not check formatting: {err}"))
        }
    }
}

fn validate_check(path: &Path, ctx: &ValidateContext) -> Check {
    let options = CommandRunOptions {
        current_dir: Some(path.to_path_buf()),
        env: vec![],
    };
    match run_tool(&ctx.tools.terraform, &["validate"], ctx.timeout, &options) {
        Ok(out) if out.success() => {
            Check::pass("Terraform configuration is valid", "Configuration valid")
        }
        Ok(out) => Check::fail(
            format!("Validation failed: {}", out.stderr.trim()),
            "Configuration invalid",
        ),
        Err(err) => {
            log::warn!("terraform validate: {err:#}");
            Check::notice(format!("Could not validate: {err}"))
        }
    }
}
