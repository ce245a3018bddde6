use std::path::Path;

use serde_yaml::Value;

use crate::core::{Check, SectionOutcome};
use crate::platform::{self, CommandRunOptions};

use super::{ANSIBLE, ValidateContext, discover, file_label, parse_yaml_documents, run_tool};

pub fn validate_ansible(path: &Path, ctx: &ValidateContext) -> SectionOutcome {
    let path_s = path.display().to_string();
    let files = discover(path, &["yml", "yaml"], &ctx.excludes);
    if files.is_empty() {
        return SectionOutcome::skipped(ANSIBLE, &path_s, "No Ansible files found");
    }

    let mut checks = Vec::new();
    for file in &files {
        let name = file_label(file);
        let content = match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(err) => {
                log::warn!("ansible: failed to read {}: {err}", file.display());
                checks.push(Check::notice(format!("{name}: Could not parse: {err}")));
                continue;
            }
        };
        match parse_yaml_documents(&content) {
            Ok(docs) => {
                for doc in &docs {
                    checks.extend(playbook_checks(&name, doc));
                }
            }
            Err(err) => checks.push(Check::fail(
                format!("{name}: YAML syntax error: {err}"),
                format!("{name}: YAML error"),
            )),
        }
    }

    if ctx.run_external_tools {
        checks.extend(ansible_lint_check(ctx));
    }

    SectionOutcome::completed(ANSIBLE, &path_s, checks)
}

/// Checks for one YAML document. Only sequences of plays are playbooks;
/// anything else (inventories, vars files, manifests) yields nothing.
fn playbook_checks(name: &str, doc: &Value) -> Vec<Check> {
    let Some(plays) = doc.as_sequence() else {
        return Vec::new();
    };

    let mut checks = Vec::new();
    for play in plays.iter().filter(|p| p.is_mapping()) {
        if play.get("name").is_some() {
            checks.push(Check::pass(
                format!("{name}: Has descriptive name"),
                format!("{name}: Named"),
            ));
        } else {
            checks.push(Check::warn(
                format!("{name}: Missing name"),
                format!("{name}: Add name"),
            ));
        }

        if play.get("become").is_some() {
            checks.push(Check::info(format!("{name}: Uses privilege escalation")));
        }

        let unnamed_task = play
            .get("tasks")
            .and_then(Value::as_sequence)
            .is_some_and(|tasks| {
                tasks
                    .iter()
                    .any(|task| task.is_mapping() && task.get("name").is_none())
            });
        if unnamed_task {
            checks.push(Check::warn(
                format!("{name}: Task missing name"),
                format!("{name}: Name all tasks"),
            ));
        }
    }
    checks
}

fn ansible_lint_check(ctx: &ValidateContext) -> Option<Check> {
    match run_tool(
        &ctx.tools.ansible_lint,
        &["--version"],
        ctx.timeout,
        &CommandRunOptions::default(),
    ) {
        Ok(out) if out.success() => Some(Check::pass(
            "ansible-lint is available",
            "ansible-lint available",
        )),
        Ok(out) => {
            log::warn!("ansible-lint --version exited with {}", out.exit_code);
            None
        }
        Err(err) if platform::is_not_found(&err) => Some(Check::warn(
            "ansible-lint not installed - install for better validation",
            "Install ansible-lint",
        )),
        Err(err) => {
            log::warn!("ansible-lint: {err:#}");
            Some(Check::notice(format!("Could not run ansible-lint: {err}")))
        }
    }
}
