//! ssh execution backend
//!
//! A session is an ssh control master; the build, artifact listing and
//! artifact fetches are multiplexed over its control socket.

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use nightshift_core::config::RemoteConfig;
use nightshift_core::error::RemoteError;
use nightshift_core::{BuildArtifact, RemoteTarget};

use crate::traits::{BuildRequest, RemoteExecutor, RemoteSession};

/// Opens control-master ssh sessions
#[derive(Debug, Clone)]
pub struct SshExecutor {
    config: RemoteConfig,
    sessions: Arc<AtomicU64>,
}

impl SshExecutor {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config,
            sessions: Arc::new(AtomicU64::new(0)),
        }
    }

    fn control_path(&self, target: &RemoteTarget) -> PathBuf {
        let dir = self
            .config
            .control_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let id = self.sessions.fetch_add(1, Ordering::Relaxed);
        dir.join(format!(
            "nightshift-{}-{}-{}.sock",
            target.name,
            std::process::id(),
            id
        ))
    }
}

impl RemoteExecutor for SshExecutor {
    fn name(&self) -> &'static str {
        "ssh"
    }

    #[instrument(skip(self, target), fields(host = %target.host))]
    fn open_session(&self, target: &RemoteTarget) -> Result<Box<dyn RemoteSession>, RemoteError> {
        let session = SshSession {
            config: self.config.clone(),
            destination: target.destination(),
            host: target.host.clone(),
            port: target.port,
            control_path: self.control_path(target),
            open: false,
        };

        let mut cmd = session.ssh();
        cmd.args(["-o", "ControlMaster=yes", "-o", "ControlPersist=yes", "-N", "-f"])
            .arg(&session.destination);
        let output = run(cmd, &self.config.ssh_command)?;
        if !output.status.success() {
            return Err(RemoteError::ConnectFailed {
                host: session.host.clone(),
                reason: failure_reason(&output),
            });
        }

        info!(control = %session.control_path.display(), "ssh session opened");
        Ok(Box::new(SshSession {
            open: true,
            ..session
        }))
    }
}

/// A control-master connection to one host
#[derive(Debug)]
pub struct SshSession {
    config: RemoteConfig,
    destination: String,
    host: String,
    port: u16,
    control_path: PathBuf,
    open: bool,
}

impl SshSession {
    /// ssh invocation sharing this session's control socket
    fn ssh(&self) -> Command {
        let mut cmd = Command::new(&self.config.ssh_command);
        cmd.arg("-o")
            .arg(format!("ControlPath={}", self.control_path.display()))
            .args(["-o", "BatchMode=yes"])
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.config.connect_timeout))
            .arg("-p")
            .arg(self.port.to_string());
        cmd
    }

    /// Run `remote_command` on the host and capture its output
    fn exec(&self, remote_command: &str) -> Result<Output, RemoteError> {
        debug!(host = %self.host, command = %remote_command, "ssh exec");
        let mut cmd = self.ssh();
        cmd.arg(&self.destination).arg(remote_command);
        run(cmd, &self.config.ssh_command)
    }

    fn output_dir(&self, request: &BuildRequest) -> String {
        format!(
            "{}/{}",
            self.config.remote_dir.trim_end_matches('/'),
            request.invocation
        )
    }

    fn fetch(&self, dir: &str, name: &str) -> Result<BuildArtifact, RemoteError> {
        let output = self.exec(&format!("cat {}", shell_quote(&format!("{}/{}", dir, name))))?;
        if !output.status.success() {
            return Err(RemoteError::FetchFailed {
                artifact: name.to_string(),
                host: self.host.clone(),
                reason: failure_reason(&output),
            });
        }
        Ok(BuildArtifact::new(name, output.stdout))
    }
}

impl RemoteSession for SshSession {
    fn host(&self) -> &str {
        &self.host
    }

    #[instrument(skip(self, target), fields(host = %self.host, invocation = %request.invocation))]
    fn run_remote_build(
        &mut self,
        target: &RemoteTarget,
        request: &BuildRequest,
    ) -> Result<Vec<BuildArtifact>, RemoteError> {
        let dir = self.output_dir(request);
        let command = build_command_line(&self.config.build_command, target, request, &dir);

        let output = self.exec(&command)?;
        if !output.status.success() {
            return Err(RemoteError::BuildFailed {
                name: request.invocation.clone(),
                host: self.host.clone(),
                reason: failure_reason(&output),
            });
        }

        let listing = self.exec(&format!("ls -1 {}", shell_quote(&dir)))?;
        if !listing.status.success() {
            return Err(RemoteError::FetchFailed {
                artifact: dir,
                host: self.host.clone(),
                reason: failure_reason(&listing),
            });
        }
        let names = String::from_utf8_lossy(&listing.stdout).into_owned();
        let artifacts = names
            .lines()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| self.fetch(&dir, name))
            .collect::<Result<Vec<_>, _>>()?;

        info!(artifacts = artifacts.len(), "remote build finished");
        Ok(artifacts)
    }

    fn close(&mut self) -> Result<(), RemoteError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;

        let mut cmd = self.ssh();
        cmd.args(["-O", "exit"]).arg(&self.destination);
        let output = run(cmd, &self.config.ssh_command)?;
        if !output.status.success() {
            return Err(RemoteError::ConnectFailed {
                host: self.host.clone(),
                reason: failure_reason(&output),
            });
        }
        Ok(())
    }
}

/// Remote command line of one build invocation
pub fn build_command_line(
    build_command: &str,
    target: &RemoteTarget,
    request: &BuildRequest,
    output_dir: &str,
) -> String {
    let mut parts: Vec<String> = vec![build_command.to_string()];
    // options and args are shell fragments from the configuration
    for fragment in [&target.options, &target.args] {
        if !fragment.trim().is_empty() {
            parts.push(fragment.trim().to_string());
        }
    }
    parts.push(format!("--name {}", shell_quote(&request.invocation)));
    parts.push(format!("--rev {}", shell_quote(&request.pair.revision)));
    if let Some(lib) = &request.pair.library_revision {
        parts.push(format!("--library-rev {}", shell_quote(lib)));
    }
    for host in &target.extra_hosts {
        parts.push(format!("--extra-host {}", shell_quote(host)));
    }
    parts.push(format!("--output {}", shell_quote(output_dir)));
    parts.join(" ")
}

/// Quote a word for a POSIX shell unless it is plainly safe
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:@=+,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

fn run(mut cmd: Command, program: &str) -> Result<Output, RemoteError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd.output().map_err(|source| RemoteError::Spawn {
        command: program.to_string(),
        source,
    })
}

/// First stderr line, or the exit status when stderr is empty
fn failure_reason(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| output.status.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightshift_core::config::TargetConfig;
    use nightshift_core::RevisionPair;

    fn target() -> RemoteTarget {
        RemoteTarget::from_config(&TargetConfig {
            name: "linux".to_string(),
            host: "linux.example.org".to_string(),
            options: "--jobs 8".to_string(),
            extra_hosts: vec!["db.example.org".to_string()],
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_build_command_line() {
        let request = BuildRequest::new(
            "build-linux_1",
            RevisionPair::new("abc123", Some("def456".to_string())),
        );
        let line = build_command_line("nightly-build", &target(), &request, "/tmp/ns/build-linux_1");
        assert_eq!(
            line,
            "nightly-build --jobs 8 --name build-linux_1 --rev abc123 --library-rev def456 \
             --extra-host db.example.org --output /tmp/ns/build-linux_1"
        );
    }

    #[test]
    fn test_build_command_line_without_library() {
        let request = BuildRequest::new("build-linux", RevisionPair::new("abc123", None));
        let line = build_command_line("nb", &target(), &request, "/out");
        assert!(!line.contains("--library-rev"));
        assert!(line.ends_with("--output /out"));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("abc123"), "abc123");
        assert_eq!(shell_quote("/tmp/a b"), "'/tmp/a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_missing_ssh_binary() {
        let executor = SshExecutor::new(RemoteConfig {
            ssh_command: "/nonexistent/nightshift-ssh".to_string(),
            ..Default::default()
        });
        assert!(matches!(
            executor.open_session(&target()),
            Err(RemoteError::Spawn { .. })
        ));
    }

    #[test]
    fn test_control_paths_are_unique() {
        let executor = SshExecutor::new(RemoteConfig::default());
        let a = executor.control_path(&target());
        let b = executor.control_path(&target());
        assert_ne!(a, b);
    }
}
