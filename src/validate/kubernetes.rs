use std::path::Path;

use serde_yaml::Value;

use crate::core::{Check, SectionOutcome};

use super::{KUBERNETES, ValidateContext, discover, file_label, parse_yaml_documents};

const WORKLOAD_KINDS: [&str; 3] = ["Deployment", "StatefulSet", "DaemonSet"];

pub fn validate_kubernetes(path: &Path, ctx: &ValidateContext) -> SectionOutcome {
    let path_s = path.display().to_string();
    let files = discover(path, &["yaml", "yml"], &ctx.excludes);
    if files.is_empty() {
        return SectionOutcome::skipped(KUBERNETES, &path_s, "No Kubernetes manifests found");
    }

    let mut checks = Vec::new();
    for file in &files {
        let name = file_label(file);
        let content = match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(err) => {
                log::warn!("kubernetes: failed to read {}: {err}", file.display());
                checks.push(Check::notice(format!("{name}: Could not parse: {err}")));
                continue;
            }
        };
        match parse_yaml_documents(&content) {
            Ok(docs) => {
                for doc in &docs {
                    checks.extend(manifest_checks(&name, doc));
                }
            }
            Err(err) => {
                log::debug!("kubernetes: {}: {err}", file.display());
                checks.push(Check::fail(
                    format!("{name}: YAML syntax error"),
                    format!("{name}: YAML error"),
                ));
            }
        }
    }

    SectionOutcome::completed(KUBERNETES, &path_s, checks)
}

fn manifest_checks(file: &str, doc: &Value) -> Vec<Check> {
    let Some(kind) = doc.get("kind").and_then(Value::as_str) else {
        return Vec::new();
    };
    if !WORKLOAD_KINDS.contains(&kind) {
        return Vec::new();
    }
    let name = doc
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("unnamed");
    let containers: &[Value] = doc
        .get("spec")
        .and_then(|s| s.get("template"))
        .and_then(|t| t.get("spec"))
        .and_then(|s| s.get("containers"))
        .and_then(Value::as_sequence)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let object = format!("{kind}/{name}");

    let mut checks = Vec::new();

    let has_limits = containers
        .iter()
        .all(|c| c.get("resources").and_then(|r| r.get("limits")).is_some());
    checks.push(if has_limits {
        Check::pass(
            format!("{file}: {object} has resource limits"),
            format!("{file}: Resource limits"),
        )
    } else {
        Check::fail(
            format!("{file}: {object} missing resource limits"),
            format!("{file}: Add resource limits"),
        )
    });

    let has_probes = containers
        .iter()
        .all(|c| c.get("livenessProbe").is_some() || c.get("readinessProbe").is_some());
    checks.push(if has_probes {
        Check::pass(
            format!("{file}: {object} has health checks"),
            format!("{file}: Health checks"),
        )
    } else {
        Check::warn(
            format!("{file}: {object} missing health checks"),
            format!("{file}: Add health checks"),
        )
    });

    let has_security_context = containers.iter().any(|c| c.get("securityContext").is_some());
    checks.push(if has_security_context {
        Check::pass(
            format!("{file}: {object} has security context"),
            format!("{file}: Security context"),
        )
    } else {
        Check::warn(
            format!("{file}: {object} missing security context"),
            format!("{file}: Add security context"),
        )
    });

    checks
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;
    use crate::core::{CategoryResults, CheckStatus};

    fn record(outcome: &SectionOutcome) -> CategoryResults {
        let mut results = CategoryResults::default();
        for check in &outcome.checks {
            results.record(check);
        }
        results
    }

    #[test]
    fn deployment_without_limits_fails() {
        let dir = make_temp_dir("k8s-nolimits");
        write_file(
            &dir.join("web.yaml"),
            r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  template:
    spec:
      containers:
        - name: app
          image: nginx
          resources:
            requests:
              cpu: 100m
"#,
        );
        let outcome = validate_kubernetes(&dir, &offline_ctx());
        let failing: Vec<&Check> = outcome
            .checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
            .collect();
        assert_eq!(failing.len(), 1);
        assert_eq!(failing[0].detail, "web.yaml: Deployment/web missing resource limits");

        let results = record(&outcome);
        assert_eq!(results.failed, vec!["web.yaml: Add resource limits"]);
        assert_eq!(
            results.warnings,
            vec!["web.yaml: Add health checks", "web.yaml: Add security context"]
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn hardened_statefulset_passes_everything() {
        let dir = make_temp_dir("k8s-good");
        write_file(
            &dir.join("db.yml"),
            r#"kind: StatefulSet
metadata:
  name: db
spec:
  template:
    spec:
      containers:
        - name: pg
          resources:
            limits: { cpu: "1", memory: 1Gi }
          readinessProbe: { tcpSocket: { port: 5432 } }
          securityContext: { runAsNonRoot: true }
"#,
        );
        let results = record(&validate_kubernetes(&dir, &offline_ctx()));
        assert_eq!(
            results.passed,
            vec![
                "db.yml: Resource limits",
                "db.yml: Health checks",
                "db.yml: Security context"
            ]
        );
        assert!(results.failed.is_empty());
        assert!(results.warnings.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn multi_document_manifest_checks_each_workload() {
        let dir = make_temp_dir("k8s-multi");
        write_file(
            &dir.join("all.yaml"),
            r#"kind: Service
metadata: { name: web }
---
kind: DaemonSet
spec:
  template:
    spec:
      containers:
        - name: agent
          resources: { limits: { cpu: 100m } }
          livenessProbe: { httpGet: { path: /, port: 80 } }
        - name: sidecar
          livenessProbe: { httpGet: { path: /, port: 81 } }
          securityContext: {}
---
"#,
        );
        let outcome = validate_kubernetes(&dir, &offline_ctx());
        let details: Vec<&str> = outcome.checks.iter().map(|c| c.detail.as_str()).collect();
        assert_eq!(
            details,
            vec![
                "all.yaml: DaemonSet/unnamed missing resource limits",
                "all.yaml: DaemonSet/unnamed has health checks",
                "all.yaml: DaemonSet/unnamed has security context",
            ]
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn non_workloads_and_playbooks_are_ignored() {
        let dir = make_temp_dir("k8s-ignore");
        write_file(&dir.join("svc.yaml"), "kind: Service\nmetadata: { name: x }\n");
        write_file(&dir.join("site.yml"), "- hosts: all\n  tasks: []\n");
        let outcome = validate_kubernetes(&dir, &offline_ctx());
        assert!(outcome.checks.is_empty(), "{:?}", outcome.checks);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn broken_manifest_is_recorded_as_yaml_error() {
        let dir = make_temp_dir("k8s-broken");
        write_file(&dir.join("bad.yaml"), "kind: Deployment\nspec: {template: \n");
        let results = record(&validate_kubernetes(&dir, &offline_ctx()));
        assert_eq!(results.failed, vec!["bad.yaml: YAML error"]);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
