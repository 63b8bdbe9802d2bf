// Process capture - Records live channels with an external tool such as streamlink

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::{SightclipError, SightclipResult};
use crate::ports::{CaptureBackend, CaptureExit, CaptureSession};
use crate::utils::path::expand_template;

/// Starts a capture command built from a `{channel}`/`{output}` template
#[derive(Debug, Clone)]
pub struct CommandCaptureBackend {
    template: Vec<String>,
}

impl CommandCaptureBackend {
    pub fn new(template: Vec<String>) -> Self {
        Self { template }
    }
}

#[async_trait]
impl CaptureBackend for CommandCaptureBackend {
    async fn start(&self, channel: &str, output: &Path) -> SightclipResult<Box<dyn CaptureSession>> {
        let output_arg = output.display().to_string();
        let command = expand_template(
            &self.template,
            &[("channel", channel), ("output", &output_arg)],
        );
        let (program, args) = command.split_first().ok_or_else(|| SightclipError::Capture {
            channel: channel.to_string(),
            message: "capture command is empty".to_string(),
        })?;

        debug!(channel = %channel, program = %program, ?args, "Starting capture");
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SightclipError::Capture {
                channel: channel.to_string(),
                message: format!("failed to start {}: {}", program, e),
            })?;

        info!(channel = %channel, pid = ?child.id(), "Capture process started");
        Ok(Box::new(ProcessCaptureSession {
            channel: channel.to_string(),
            output: output.to_path_buf(),
            child,
        }))
    }
}

pub struct ProcessCaptureSession {
    channel: String,
    output: PathBuf,
    child: Child,
}

impl ProcessCaptureSession {
    fn capture_error(&self, message: impl Into<String>) -> SightclipError {
        SightclipError::Capture {
            channel: self.channel.clone(),
            message: message.into(),
        }
    }
}

fn exit_of(status: ExitStatus) -> CaptureExit {
    CaptureExit {
        success: status.success(),
        code: status.code(),
    }
}

#[async_trait]
impl CaptureSession for ProcessCaptureSession {
    fn output_path(&self) -> &Path {
        &self.output
    }

    #[cfg(unix)]
    fn interrupt(&mut self) -> SightclipResult<()> {
        let Some(pid) = self.child.id() else {
            // Already reaped
            return Ok(());
        };
        // SAFETY: kill(2) has no memory effects; the pid belongs to our unreaped child
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
        if rc != 0 {
            return Err(self.capture_error(format!(
                "SIGINT failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn interrupt(&mut self) -> SightclipResult<()> {
        // No console interrupt for detached children here; terminate instead
        self.child
            .start_kill()
            .map_err(|e| self.capture_error(format!("terminate failed: {}", e)))
    }

    async fn wait(&mut self) -> SightclipResult<CaptureExit> {
        let status = self.child.wait().await?;
        Ok(exit_of(status))
    }

    async fn kill(&mut self) -> SightclipResult<()> {
        self.child.kill().await?;
        Ok(())
    }

    fn try_exit(&mut self) -> SightclipResult<Option<CaptureExit>> {
        Ok(self.child.try_wait()?.map(exit_of))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_template_is_expanded_into_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("chan.mp4");
        let backend = CommandCaptureBackend::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "printf {channel} > {output}".to_string(),
        ]);

        let mut session = backend.start("somechannel", &output).await.unwrap();
        let exit = session.wait().await.unwrap();
        assert!(exit.success);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "somechannel");
    }

    #[tokio::test]
    async fn test_interrupt_stops_a_running_capture() {
        let dir = tempfile::tempdir().unwrap();
        let backend = CommandCaptureBackend::new(vec!["sleep".to_string(), "30".to_string()]);
        let mut session = backend.start("c", &dir.path().join("c.mp4")).await.unwrap();
        assert_eq!(session.try_exit().unwrap(), None);

        session.interrupt().unwrap();
        let exit = tokio::time::timeout(Duration::from_secs(5), session.wait())
            .await
            .unwrap()
            .unwrap();
        assert!(!exit.success);
        assert_eq!(exit.code, None);
    }

    #[tokio::test]
    async fn test_missing_program_is_a_capture_error() {
        let backend = CommandCaptureBackend::new(vec!["sightclip-no-such-recorder".to_string()]);
        let result = backend.start("c", Path::new("c.mp4")).await;
        assert!(matches!(result, Err(SightclipError::Capture { .. })));
    }
}
