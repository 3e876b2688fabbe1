//! `docker` CLI backend for [`WorkloadRuntime`]

use dmc_config::Config;
use once_cell::sync::OnceCell;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::errors::RuntimeError;
use crate::runtime::{RemoveOptions, WorkloadHandle, WorkloadRuntime, WorkloadSpec};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

struct CommandOutput {
    status: Option<i32>,
    success: bool,
    stdout: String,
    stderr: String,
}

/// Drives the container runtime through its command-line client
///
/// The binary is resolved once, on first use, so constructing a `DockerCli`
/// never fails even when no runtime is installed.
#[derive(Debug)]
pub struct DockerCli {
    config: Config,
    binary: OnceCell<PathBuf>,
    timeout: Duration,
}

impl DockerCli {
    pub fn from_config(config: &Config) -> Self {
        DockerCli {
            config: config.clone(),
            binary: OnceCell::new(),
            timeout: config.get_runtime_timeout(),
        }
    }

    fn binary(&self) -> Result<&Path, RuntimeError> {
        self.binary
            .get_or_try_init(|| {
                self.config
                    .resolve_runtime_path()
                    .map_err(|e| RuntimeError::Unavailable(e.to_string()))
            })
            .map(PathBuf::as_path)
    }

    fn run(
        &self,
        operation: &'static str,
        target: &str,
        args: &[String],
    ) -> Result<CommandOutput, RuntimeError> {
        let binary = self.binary()?;
        debug!(runtime = %binary.display(), operation, workload = target, "Running runtime command");

        let mut child = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                RuntimeError::Unavailable(format!("failed to launch {}: {}", binary.display(), e))
            })?;

        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    kill_and_reap(&mut child);
                    warn!(operation, workload = target, "Runtime command timed out, killed");
                    return Err(RuntimeError::Timeout {
                        operation,
                        target: target.to_string(),
                        seconds: self.timeout.as_secs(),
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    kill_and_reap(&mut child);
                    return Err(RuntimeError::Failed {
                        operation,
                        target: target.to_string(),
                        status: None,
                        stderr: e.to_string(),
                    });
                }
            }
        };

        Ok(CommandOutput {
            status: status.code(),
            success: status.success(),
            stdout: collect(stdout_reader),
            stderr: collect(stderr_reader),
        })
    }

    fn failed(operation: &'static str, target: &str, output: &CommandOutput) -> RuntimeError {
        RuntimeError::Failed {
            operation,
            target: target.to_string(),
            status: output.status,
            stderr: output.stderr.trim().to_string(),
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = pipe.read_to_end(&mut buffer);
        buffer
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    let bytes = reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn is_conflict(stderr: &str) -> bool {
    stderr.contains("Conflict") || stderr.contains("already in use")
}

fn is_missing(stderr: &str) -> bool {
    stderr.contains("No such")
}

/// Arguments for `docker create` from a [`WorkloadSpec`]
pub fn create_args(spec: &WorkloadSpec) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "--restart".to_string(),
        spec.restart_policy.clone(),
        "--log-driver".to_string(),
        spec.log_driver.clone(),
    ];
    for (key, value) in &spec.env {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }
    for mount in &spec.mounts {
        args.push("--mount".to_string());
        args.push(format!(
            "type=bind,source={},target={}",
            mount.source.display(),
            mount.target
        ));
    }
    for port in &spec.ports {
        args.push("-p".to_string());
        args.push(format!(
            "{}:{}:{}/{}",
            port.host_ip, port.host_port, port.container_port, port.protocol
        ));
    }
    args.push(spec.image.clone());
    args
}

impl WorkloadRuntime for DockerCli {
    fn name(&self) -> &str {
        "docker"
    }

    fn create_workload(&self, spec: &WorkloadSpec) -> Result<WorkloadHandle, RuntimeError> {
        let output = self.run("create", &spec.name, &create_args(spec))?;
        if !output.success {
            if is_conflict(&output.stderr) {
                return Err(RuntimeError::Conflict {
                    name: spec.name.clone(),
                });
            }
            return Err(Self::failed("create", &spec.name, &output));
        }

        let id = output.stdout.trim();
        if id.is_empty() {
            return Err(RuntimeError::Failed {
                operation: "create",
                target: spec.name.clone(),
                status: output.status,
                stderr: "runtime returned no workload id".to_string(),
            });
        }
        Ok(WorkloadHandle::new(id))
    }

    fn start_workload(&self, handle: &WorkloadHandle) -> Result<(), RuntimeError> {
        let args = ["start".to_string(), handle.to_string()];
        let output = self.run("start", handle.as_str(), &args)?;
        if output.success {
            Ok(())
        } else {
            Err(Self::failed("start", handle.as_str(), &output))
        }
    }

    fn inspect_workload(&self, name: &str) -> Result<bool, RuntimeError> {
        let args = [
            "container".to_string(),
            "inspect".to_string(),
            "--format".to_string(),
            "{{.Id}}".to_string(),
            name.to_string(),
        ];
        let output = self.run("inspect", name, &args)?;
        if output.success {
            Ok(true)
        } else if is_missing(&output.stderr) {
            Ok(false)
        } else {
            Err(Self::failed("inspect", name, &output))
        }
    }

    fn remove_workload(&self, name: &str, options: RemoveOptions) -> Result<(), RuntimeError> {
        let mut args = vec!["rm".to_string()];
        if options.force {
            args.push("--force".to_string());
        }
        if options.remove_volumes {
            args.push("--volumes".to_string());
        }
        args.push(name.to_string());

        let output = self.run("remove", name, &args)?;
        if output.success {
            Ok(())
        } else {
            Err(Self::failed("remove", name, &output))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::WorkloadSettings;
    use crate::tenant::TenantId;

    #[test]
    fn test_create_args_layout() {
        let Ok(tenant) = TenantId::parse("0b4e7a0e-5c1f-4c1a-9f59-8f3f0f7d3a11") else {
            panic!("valid uuid");
        };
        let spec = WorkloadSettings::default().build_spec(&tenant, Path::new("/srv/storage/t"));
        let args = create_args(&spec);

        assert_eq!(args[0], "create");
        assert_eq!(args[1..3], ["--name", "dmc-0b4e7a0e-5c1f-4c1a-9f59-8f3f0f7d3a11"]);
        assert!(args.windows(2).any(|w| w == ["--restart", "always"]));
        assert!(args.windows(2).any(|w| w == ["--log-driver", "json-file"]));
        assert!(args.windows(2).any(|w| w == ["-e", "EULA=TRUE"]));
        assert!(args.windows(2).any(|w| w == ["-e", "MODE=CREATIVE"]));
        assert!(args
            .windows(2)
            .any(|w| w == ["--mount", "type=bind,source=/srv/storage/t,target=/data"]));
        assert!(args
            .windows(2)
            .any(|w| w == ["-p", "0.0.0.0:25565:25565/tcp"]));
        assert_eq!(args.last().map(String::as_str), Some("itzg/minecraft-server:java17"));
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let config = Config {
            runtime_path: Some("/nonexistent/dmc-test/docker".to_string()),
            ..Default::default()
        };
        let cli = DockerCli::from_config(&config);
        assert!(matches!(
            cli.inspect_workload("dmc-anything"),
            Err(RuntimeError::Unavailable(_))
        ));
    }

    #[test]
    fn test_stderr_classification() {
        assert!(is_conflict(
            "Error response from daemon: Conflict. The container name \"/dmc-x\" is already in use"
        ));
        assert!(is_missing("Error: No such container: dmc-x"));
        assert!(!is_conflict("permission denied"));
    }

    #[cfg(unix)]
    mod fake_runtime {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn temp_dir() -> TempDir {
            match TempDir::new() {
                Ok(dir) => dir,
                Err(err) => panic!("failed to create temp dir: {err}"),
            }
        }

        /// A `DockerCli` whose binary is a shell script running `body`
        fn fake_cli(dir: &TempDir, body: &str, timeout_secs: u64) -> DockerCli {
            let script = dir.path().join("docker");
            let written = fs::write(&script, format!("#!/bin/sh\n{}\n", body))
                .and_then(|()| fs::set_permissions(&script, fs::Permissions::from_mode(0o755)));
            if let Err(err) = written {
                panic!("failed to write fake runtime: {err}");
            }
            let config = Config {
                runtime_path: Some(script.to_string_lossy().into_owned()),
                runtime_timeout_secs: Some(timeout_secs),
                ..Default::default()
            };
            DockerCli::from_config(&config)
        }

        fn spec() -> WorkloadSpec {
            WorkloadSettings::default().build_spec(&TenantId::generate(), Path::new("/tmp/t"))
        }

        #[test]
        fn test_create_returns_trimmed_id() {
            let dir = temp_dir();
            let cli = fake_cli(&dir, "echo 3f2a9c01\nexit 0", 10);
            let handle = cli.create_workload(&spec());
            assert!(handle.is_ok_and(|h| h.as_str() == "3f2a9c01"));
        }

        #[test]
        fn test_create_name_in_use_is_conflict() {
            let dir = temp_dir();
            let body = "echo 'Error response from daemon: Conflict. The container name is already in use' >&2\nexit 1";
            let cli = fake_cli(&dir, body, 10);
            assert!(matches!(
                cli.create_workload(&spec()),
                Err(RuntimeError::Conflict { .. })
            ));
        }

        #[test]
        fn test_inspect_missing_is_false() {
            let dir = temp_dir();
            let cli = fake_cli(&dir, "echo 'Error: No such container: x' >&2\nexit 1", 10);
            assert!(cli.inspect_workload("dmc-x").is_ok_and(|exists| !exists));
        }

        #[test]
        fn test_remove_failure_keeps_exit_status() {
            let dir = temp_dir();
            let cli = fake_cli(&dir, "echo 'daemon unreachable' >&2\nexit 3", 10);
            let result = cli.remove_workload("dmc-x", RemoveOptions::FORCED);
            let Err(RuntimeError::Failed { status, stderr, .. }) = result else {
                panic!("expected a failed removal");
            };
            assert_eq!(status, Some(3));
            assert_eq!(stderr, "daemon unreachable");
        }

        #[test]
        fn test_slow_runtime_times_out() {
            let dir = temp_dir();
            let cli = fake_cli(&dir, "exec sleep 30", 1);
            let started = Instant::now();
            let result = cli.start_workload(&WorkloadHandle::new("abc"));
            assert!(matches!(result, Err(RuntimeError::Timeout { seconds: 1, .. })));
            assert!(started.elapsed() < Duration::from_secs(10));
        }
    }
}
