//! Infrastructure-as-code checklists.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::platform::{self, CommandOutput, CommandRunOptions};

mod ansible;
mod kubernetes;
mod terraform;

pub use ansible::validate_ansible;
pub use kubernetes::validate_kubernetes;
pub use terraform::validate_terraform;

pub const TERRAFORM: &str = "terraform";
pub const ANSIBLE: &str = "ansible";
pub const KUBERNETES: &str = "kubernetes";

pub const CATEGORIES: [&str; 3] = [TERRAFORM, ANSIBLE, KUBERNETES];

/// Command prefixes for the external validators, e.g. `["terraform"]` or
/// `["docker", "run", "--rm", "hashicorp/terraform"]`.
#[derive(Debug, Clone)]
pub struct ToolCommands {
    pub terraform: Vec<String>,
    pub ansible_lint: Vec<String>,
}

impl Default for ToolCommands {
    fn default() -> Self {
        Self {
            terraform: vec!["terraform".to_string()],
            ansible_lint: vec!["ansible-lint".to_string()],
        }
    }
}

impl ToolCommands {
    /// Splits a configured command line on whitespace; blank keeps `fallback`.
    pub fn parse_command(line: &str, fallback: &[String]) -> Vec<String> {
        let parts: Vec<String> = line.split_whitespace().map(ToString::to_string).collect();
        if parts.is_empty() {
            fallback.to_vec()
        } else {
            parts
        }
    }
}

pub(crate) fn run_tool(
    command: &[String],
    args: &[&str],
    timeout: Duration,
    options: &CommandRunOptions,
) -> Result<CommandOutput> {
    let (program, prefix) = command
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("tool command is empty"))?;
    let mut argv: Vec<&str> = prefix.iter().map(String::as_str).collect();
    argv.extend_from_slice(args);
    platform::run_command_with_options(program, &argv, timeout, options)
}

#[derive(Debug, Clone)]
pub struct ValidateContext {
    pub timeout: Duration,
    pub run_external_tools: bool,
    pub tools: ToolCommands,
    pub excludes: GlobSet,
}

impl ValidateContext {
    pub fn new(
        timeout: Duration,
        run_external_tools: bool,
        tools: ToolCommands,
        excludes: &[String],
    ) -> Result<Self> {
        Ok(Self {
            timeout,
            run_external_tools,
            tools,
            excludes: build_exclude_set(excludes)?,
        })
    }
}

pub fn validate_excludes(excludes: &[String]) -> Result<()> {
    let _ = build_exclude_set(excludes)?;
    Ok(())
}

fn build_exclude_set(excludes: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in [
        "**/.git",
        "**/.git/**",
        "**/.terraform",
        "**/.terraform/**",
        "**/node_modules",
        "**/node_modules/**",
    ] {
        builder.add(Glob::new(pat).with_context(|| format!("invalid exclude glob: {pat}"))?);
    }
    for pat in excludes {
        builder.add(Glob::new(pat).with_context(|| format!("invalid exclude glob: {pat}"))?);
    }
    Ok(builder.build()?)
}

/// Files under `root` with one of `extensions`, sorted by path.
pub fn discover(root: &Path, extensions: &[&str], excludes: &GlobSet) -> Vec<PathBuf> {
    if !root.exists() {
        log::debug!("{} does not exist", root.display());
        return Vec::new();
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !excludes.is_match(e.path()));

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("skipping unreadable entry under {}: {err}", root.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| extensions.contains(&ext));
        if matches {
            files.push(entry.into_path());
        }
    }
    files
}

pub(crate) fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parses every document of a YAML stream, failing on the first bad one.
pub(crate) fn parse_yaml_documents(content: &str) -> Result<Vec<serde_yaml::Value>, serde_yaml::Error> {
    use serde::Deserialize;

    let mut docs = Vec::new();
    for doc in serde_yaml::Deserializer::from_str(content) {
        docs.push(serde_yaml::Value::deserialize(doc)?);
    }
    Ok(docs)
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use super::{ToolCommands, ValidateContext};

    pub fn make_temp_dir(tag: &str) -> PathBuf {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "infracheck-{tag}-{}-{seq}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create dir");
        dir
    }

    pub fn write_file(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdirs");
        }
        std::fs::write(path, contents).expect("write");
    }

    pub fn offline_ctx() -> ValidateContext {
        ValidateContext::new(Duration::from_secs(5), false, ToolCommands::default(), &[])
            .expect("ctx")
    }

    pub fn missing_tools_ctx() -> ValidateContext {
        tools_ctx(ToolCommands {
            terraform: vec!["infracheck-missing-terraform".to_string()],
            ansible_lint: vec!["infracheck-missing-ansible-lint".to_string()],
        })
    }

    pub fn tools_ctx(tools: ToolCommands) -> ValidateContext {
        ValidateContext::new(Duration::from_secs(5), true, tools, &[]).expect("ctx")
    }

    /// A stand-in executable run through `sh`, so it needs no exec bit.
    pub fn fake_tool(dir: &Path, name: &str, body: &str) -> Vec<String> {
        let path = dir.join(format!("{name}.sh"));
        write_file(&path, &format!("{body}\n"));
        vec!["sh".to_string(), path.display().to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;

    #[test]
    fn discover_filters_extensions_and_default_excludes() {
        let dir = make_temp_dir("discover");
        write_file(&dir.join("b.yaml"), "a: 1\n");
        write_file(&dir.join("a.yml"), "a: 1\n");
        write_file(&dir.join("notes.txt"), "x\n");
        write_file(&dir.join(".terraform/modules/m.yaml"), "a: 1\n");
        write_file(&dir.join("nested/c.yaml"), "a: 1\n");

        let set = build_exclude_set(&[]).expect("globs");
        let files = discover(&dir, &["yml", "yaml"], &set);
        let names: Vec<String> = files.iter().map(|p| file_label(p)).collect();
        assert_eq!(names, vec!["a.yml", "b.yaml", "c.yaml"]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn user_excludes_apply() {
        let dir = make_temp_dir("discover-exclude");
        write_file(&dir.join("keep/main.tf"), "");
        write_file(&dir.join("vendor/main.tf"), "");

        let set = build_exclude_set(&["**/vendor/**".to_string()]).expect("globs");
        let files = discover(&dir, &["tf"], &set);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep/main.tf"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_exclude_is_rejected() {
        assert!(validate_excludes(&["[".to_string()]).is_err());
    }

    #[test]
    fn missing_root_yields_nothing() {
        let set = build_exclude_set(&[]).expect("globs");
        let files = discover(Path::new("/nonexistent/infracheck/root"), &["tf"], &set);
        assert!(files.is_empty());
    }

    #[test]
    fn multi_document_yaml_is_split() {
        let docs = parse_yaml_documents("a: 1\n---\nb: 2\n").expect("parse");
        assert_eq!(docs.len(), 2);
        assert!(parse_yaml_documents("a: [1, 2\n").is_err());
    }
}
