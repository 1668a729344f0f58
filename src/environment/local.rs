//! Local environment - a fresh workspace directory on this host per job

use crate::core::Job;
use crate::environment::command::CapturedOutput;
use crate::environment::{
    CommandOutput, CommandSpec, Environment, EnvironmentError, EnvironmentProvider, LogSink,
    OutputStream, RunnerConfig,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Instant;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Provider that runs jobs as host subprocesses in temporary workspaces
#[derive(Debug, Clone)]
pub struct LocalProvider {
    config: RunnerConfig,
}

impl LocalProvider {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }
}

#[async_trait]
impl EnvironmentProvider for LocalProvider {
    async fn provision(&self, job: &Job) -> Result<Box<dyn Environment>, EnvironmentError> {
        if !self.config.accepts(&job.runs_on) {
            return Err(EnvironmentError::UnsupportedLabels {
                job: job.id.clone(),
                labels: job.runs_on_label(),
            });
        }

        let root = self
            .config
            .workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        tokio::fs::create_dir_all(&root).await?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", workspace_prefix(&job.id)))
            .keep(self.config.keep_workspaces)
            .tempdir_in(&root)
            .map_err(|e| EnvironmentError::Provision(e.to_string()))?;

        info!("Provisioned workspace {} for job {}", dir.path().display(), job.id);

        Ok(Box::new(LocalEnvironment::new(dir, self.config.max_output_bytes)))
    }
}

fn workspace_prefix(job_id: &str) -> String {
    job_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// A job workspace on the local host
#[derive(Debug)]
pub struct LocalEnvironment {
    path: PathBuf,
    dir: Mutex<Option<TempDir>>,
    max_output_bytes: usize,
}

impl LocalEnvironment {
    pub fn new(dir: TempDir, max_output_bytes: usize) -> Self {
        Self {
            path: dir.path().to_path_buf(),
            dir: Mutex::new(Some(dir)),
            max_output_bytes,
        }
    }
}

#[async_trait]
impl Environment for LocalEnvironment {
    fn workspace(&self) -> &Path {
        &self.path
    }

    async fn run(
        &self,
        command: &CommandSpec,
        sink: &dyn LogSink,
    ) -> Result<CommandOutput, EnvironmentError> {
        let dir = match &command.working_dir {
            Some(relative) => self.path.join(relative),
            None => self.path.clone(),
        };
        if !dir.is_dir() {
            return Err(EnvironmentError::MissingWorkingDirectory(dir));
        }

        debug!("Spawning {} in {}", command.program, dir.display());
        let started = Instant::now();

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .envs(&command.env)
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EnvironmentError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr was not piped"))?;
        let limit = self.max_output_bytes;

        // Dropping this future on timeout drops the child, which kills it
        let collect = async move {
            let mut out_lines = BufReader::new(stdout).split(b'\n');
            let mut err_lines = BufReader::new(stderr).split(b'\n');
            let mut out = CapturedOutput::new(limit);
            let mut err = CapturedOutput::new(limit);
            let (mut out_open, mut err_open) = (true, true);

            while out_open || err_open {
                tokio::select! {
                    segment = out_lines.next_segment(), if out_open => {
                        match segment {
                            Ok(Some(bytes)) => {
                                let line = decode_line(&bytes);
                                sink.on_line(OutputStream::Stdout, &line);
                                out.push_line(&line);
                            }
                            Ok(None) => out_open = false,
                            Err(e) => {
                                warn!("Failed to read stdout: {}", e);
                                out_open = false;
                            }
                        }
                    }
                    segment = err_lines.next_segment(), if err_open => {
                        match segment {
                            Ok(Some(bytes)) => {
                                let line = decode_line(&bytes);
                                sink.on_line(OutputStream::Stderr, &line);
                                err.push_line(&line);
                            }
                            Ok(None) => err_open = false,
                            Err(e) => {
                                warn!("Failed to read stderr: {}", e);
                                err_open = false;
                            }
                        }
                    }
                }
            }

            let status = child.wait().await?;
            Ok::<_, EnvironmentError>((status, out, err))
        };

        match timeout(command.timeout, collect).await {
            Ok(result) => {
                let (status, out, err) = result?;
                let output = CommandOutput {
                    exit_code: status.code(),
                    truncated: out.truncated || err.truncated,
                    stdout: out.into_string(),
                    stderr: err.into_string(),
                    duration: started.elapsed(),
                };
                debug!(
                    "{} exited with {:?} after {:?}",
                    command.program, output.exit_code, output.duration
                );
                Ok(output)
            }
            Err(_) => {
                warn!("{} timed out after {:?}, killed", command.program, command.timeout);
                Err(EnvironmentError::Timeout(command.timeout))
            }
        }
    }

    async fn teardown(&self) -> Result<(), EnvironmentError> {
        let dir = self
            .dir
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(dir) = dir {
            debug!("Tearing down workspace {}", self.path.display());
            drop(dir);
        }
        Ok(())
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let line = String::from_utf8_lossy(bytes);
    line.strip_suffix('\r').unwrap_or(&line).to_string()
}
