//! Host network reload (`netplan apply`).

use tokio::process::Command;

use crate::error::{Result, UacError};

/// Outcome reported back to the operator. No verification of the resulting
/// host state is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub applied: bool,
    pub message: String,
}

/// Runs the configured reload command.
#[derive(Debug, Clone)]
pub struct HostReloader {
    command: Vec<String>,
    dry_run: bool,
}

impl HostReloader {
    pub fn new(command: Vec<String>, dry_run: bool) -> Self {
        Self { command, dry_run }
    }

    fn display(&self) -> String {
        self.command.join(" ")
    }

    pub async fn apply(&self) -> Result<ApplyOutcome> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(UacError::invalid("apply_command", "reload command is empty"));
        };

        if self.dry_run {
            tracing::info!(command = %self.display(), "dry run, skipping host reload");
            return Ok(ApplyOutcome {
                applied: true,
                message: format!("Dry run: would run `{}`", self.display()),
            });
        }

        tracing::info!(command = %self.display(), "reloading host network configuration");
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| UacError::CommandFailed {
                command: self.display(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("Operation not permitted") || stderr.contains("Permission denied") {
                return Err(UacError::CommandFailed {
                    command: self.display(),
                    message: "permission denied (run as root)".into(),
                });
            }
            return Err(UacError::CommandFailed {
                command: self.display(),
                message: stderr.trim().to_string(),
            });
        }

        Ok(ApplyOutcome {
            applied: true,
            message: format!("`{}` completed", self.display()),
        })
    }
}
