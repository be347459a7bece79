//! External collector hook invocation
//!
//! After a limit event is recorded, the collector hook is re-run so that the
//! usage summary picks up the new window start. The call is fire-and-forget:
//! the child is reaped in the background and any failure is only logged.

use crate::config::HookConfig;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct HookNotifier {
    config: HookConfig,
}

impl HookNotifier {
    pub fn new(config: &HookConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.program.is_empty()
    }

    /// Spawn the hook without waiting for it. Returns whether a process was
    /// started. Must be called from within a tokio runtime.
    pub fn notify(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(
                    program = %self.config.program,
                    error = %e,
                    "Failed to start usage hook"
                );
                return false;
            }
        };

        let program = self.config.program.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => debug!(program = %program, "Usage hook finished"),
                Ok(status) => warn!(program = %program, exit_code = status.code(), "Usage hook failed"),
                Err(e) => warn!(program = %program, error = %e, "Failed to wait for usage hook"),
            }
        });

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_hook_does_nothing() {
        let notifier = HookNotifier::new(&HookConfig {
            enabled: false,
            ..HookConfig::default()
        });
        assert!(!notifier.notify());
    }

    #[tokio::test]
    async fn test_missing_program_is_not_fatal() {
        let notifier = HookNotifier::new(&HookConfig {
            enabled: true,
            program: "/nonexistent/claude-tokens-hook".to_string(),
            args: Vec::new(),
        });
        assert!(!notifier.notify());
    }
}
