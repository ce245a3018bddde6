use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use time::format_description::well_known::Rfc3339;

use super::{Address, CpuWindow, Instance, Inventory, Snapshot, Volume};
use crate::platform;

/// Inventory backed by the `aws` command line, one subprocess per call.
///
/// The command is a prefix such as `["aws"]` or
/// `["aws-vault", "exec", "prod", "--", "aws"]`; service arguments follow it.
#[derive(Debug, Clone)]
pub struct AwsCliInventory {
    command: Vec<String>,
    region: String,
    timeout: Duration,
}

impl AwsCliInventory {
    pub fn new(region: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: vec!["aws".to_string()],
            region: region.into(),
            timeout,
        }
    }

    /// Replaces the command prefix. An empty prefix keeps the current one.
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        if !command.is_empty() {
            self.command = command;
        }
        self
    }

    fn call(&self, service: &str, operation: &str, extra: &[&str]) -> Result<String> {
        let (program, prefix) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("aws command is empty"))?;
        let mut args: Vec<&str> = prefix.iter().map(String::as_str).collect();
        args.extend_from_slice(&[service, operation]);
        args.extend_from_slice(extra);
        args.extend_from_slice(&["--region", self.region.as_str(), "--output", "json"]);

        let out = platform::run_command(program, &args, self.timeout)
            .with_context(|| format!("{program} {service} {operation}"))?;
        if !out.success() {
            let stderr = out.stderr.trim();
            return Err(anyhow!(
                "{program} {service} {operation} exited with {}{}",
                out.exit_code,
                if stderr.is_empty() {
                    String::new()
                } else {
                    format!(": {stderr}")
                }
            ));
        }
        Ok(out.stdout)
    }
}

impl Inventory for AwsCliInventory {
    fn scope(&self) -> &str {
        &self.region
    }

    fn instances(&self) -> Result<Vec<Instance>> {
        super::parse_instances(&self.call("ec2", "describe-instances", &[])?)
    }

    fn volumes(&self) -> Result<Vec<Volume>> {
        super::parse_volumes(&self.call("ec2", "describe-volumes", &[])?)
    }

    fn snapshots(&self) -> Result<Vec<Snapshot>> {
        super::parse_snapshots(&self.call(
            "ec2",
            "describe-snapshots",
            &["--owner-ids", "self"],
        )?)
    }

    fn addresses(&self) -> Result<Vec<Address>> {
        super::parse_addresses(&self.call("ec2", "describe-addresses", &[])?)
    }

    fn average_cpu(&self, instance_id: &str, window: CpuWindow) -> Result<Option<f64>> {
        let start = window.start.format(&Rfc3339)?;
        let end = window.end.format(&Rfc3339)?;
        let dimensions = format!("Name=InstanceId,Value={instance_id}");
        let period = window.period_secs.to_string();
        let stdout = self.call(
            "cloudwatch",
            "get-metric-statistics",
            &[
                "--namespace",
                "AWS/EC2",
                "--metric-name",
                "CPUUtilization",
                "--dimensions",
                dimensions.as_str(),
                "--start-time",
                start.as_str(),
                "--end-time",
                end.as_str(),
                "--period",
                period.as_str(),
                "--statistics",
                "Average",
            ],
        )?;
        super::parse_average_cpu(&stdout)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn fake_aws(body: &str) -> Vec<String> {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "infracheck-fake-aws-{}-{seq}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create dir");
        let path = dir.join("aws.sh");
        std::fs::write(&path, format!("{body}\n")).expect("write script");
        vec!["sh".to_string(), path.display().to_string()]
    }

    #[test]
    fn passes_region_and_parses_stdout() {
        let command = fake_aws(
            r#"case "$*" in
  *"describe-volumes --region eu-west-1 --output json"*) echo '{"Volumes":[{"VolumeId":"vol-1","Size":5,"State":"available"}]}' ;;
  *) echo "unexpected: $*" >&2; exit 9 ;;
esac"#,
        );
        let inv = AwsCliInventory::new("eu-west-1", Duration::from_secs(5)).with_command(command);
        let volumes = inv.volumes().expect("volumes");
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].volume_id, "vol-1");
        assert_eq!(inv.scope(), "eu-west-1");
    }

    #[test]
    fn snapshots_are_limited_to_own_account() {
        let command = fake_aws(
            r#"case "$*" in
  *"describe-snapshots --owner-ids self"*) echo '{"Snapshots":[]}' ;;
  *) exit 9 ;;
esac"#,
        );
        let inv = AwsCliInventory::new("us-east-1", Duration::from_secs(5)).with_command(command);
        assert!(inv.snapshots().expect("snapshots").is_empty());
    }

    #[test]
    fn non_zero_exit_carries_stderr() {
        let command = fake_aws("echo 'Unable to locate credentials' >&2; exit 255");
        let inv = AwsCliInventory::new("us-east-1", Duration::from_secs(5)).with_command(command);
        let err = inv.instances().expect_err("should fail");
        let msg = format!("{err:#}");
        assert!(msg.contains("255"), "{msg}");
        assert!(msg.contains("Unable to locate credentials"), "{msg}");
    }
}
