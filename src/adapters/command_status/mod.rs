// Command status probe - Asks an external tool whether a channel is live

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::trace;

use crate::domain::model::StreamStatus;
use crate::error::{SightclipError, SightclipResult};
use crate::ports::StatusProbe;
use crate::utils::path::expand_template;

/// Runs a `{channel}` command template: exit 0 is online, exit 1 is offline
#[derive(Debug, Clone)]
pub struct CommandStatusProbe {
    template: Vec<String>,
}

impl CommandStatusProbe {
    pub fn new(template: Vec<String>) -> Self {
        Self { template }
    }
}

#[async_trait]
impl StatusProbe for CommandStatusProbe {
    async fn status(&self, channel: &str) -> SightclipResult<StreamStatus> {
        let command = expand_template(&self.template, &[("channel", channel)]);
        let (program, args) = command.split_first().ok_or_else(|| SightclipError::Capture {
            channel: channel.to_string(),
            message: "status command is empty".to_string(),
        })?;

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| SightclipError::Capture {
                channel: channel.to_string(),
                message: format!("failed to run {}: {}", program, e),
            })?;

        trace!(channel = %channel, ?status, "Status command finished");
        match status.code() {
            Some(0) => Ok(StreamStatus::Online),
            Some(1) => Ok(StreamStatus::Offline),
            _ => Err(SightclipError::ProcessFailed {
                program: program.clone(),
                status: status.to_string(),
            }),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn probe(script: &str) -> CommandStatusProbe {
        CommandStatusProbe::new(vec!["sh".to_string(), "-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_exit_codes_map_to_status() {
        assert_eq!(probe("exit 0").status("c").await.unwrap(), StreamStatus::Online);
        assert_eq!(probe("exit 1").status("c").await.unwrap(), StreamStatus::Offline);
        assert!(probe("exit 3").status("c").await.is_err());
    }

    #[tokio::test]
    async fn test_channel_is_substituted() {
        let online = probe("test {channel} = live").status("live").await.unwrap();
        let offline = probe("test {channel} = live").status("other").await.unwrap();
        assert_eq!(online, StreamStatus::Online);
        assert_eq!(offline, StreamStatus::Offline);
    }
}
