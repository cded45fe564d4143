//! The `subprocess` adapter: invokes `<base_cmd> call <tool> <method>
//! --json-args-file <path>` and parses stdout as JSON.

use crate::redact::Redactor;
use crate::Adapter;
use async_trait::async_trait;
use router_core::capability::{Capability, CapabilitySet};
use router_core::{ErrorCode, RouterError};
use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

/// Configuration for a [`SubprocessAdapter`].
#[derive(Debug, Clone)]
pub struct SubprocessConfig {
    /// Executable invoked as `<base_cmd> call <tool> <method> --json-args-file <path>`.
    pub base_cmd: String,
    /// Working directory for the child process.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables for the child process.
    pub env: Vec<(String, String)>,
    /// Hard wall-clock timeout for the call.
    pub timeout: Duration,
}

impl SubprocessConfig {
    /// Construct a config that runs `base_cmd` with a 30-second timeout and
    /// no working-directory override.
    #[must_use]
    pub fn new(base_cmd: impl Into<String>) -> Self {
        Self {
            base_cmd: base_cmd.into(),
            cwd: None,
            env: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Adapter with `capabilities = {apply, timeout, external}` that shells out
/// to an external `base_cmd`.
pub struct SubprocessAdapter {
    id: String,
    config: SubprocessConfig,
    redactor: Redactor,
    capabilities: CapabilitySet,
}

impl SubprocessAdapter {
    /// Construct a subprocess adapter with the given `adapter_id`.
    #[must_use]
    pub fn new(id: impl Into<String>, config: SubprocessConfig) -> Self {
        let mut capabilities = CapabilitySet::new();
        capabilities.insert(Capability::Apply);
        capabilities.insert(Capability::Timeout);
        capabilities.insert(Capability::External);
        Self {
            id: id.into(),
            config,
            redactor: Redactor::new(),
            capabilities,
        }
    }

    /// Use a custom redactor instead of the default standard-pattern one.
    #[must_use]
    pub fn with_redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = redactor;
        self
    }

    fn validate_cwd(&self) -> Result<(), RouterError> {
        let Some(cwd) = &self.config.cwd else {
            return Ok(());
        };
        if !cwd.exists() {
            return Err(RouterError::operational(
                ErrorCode::CwdNotFound,
                format!("working directory does not exist: {}", cwd.display()),
            ));
        }
        if !cwd.is_dir() {
            return Err(RouterError::operational(
                ErrorCode::CwdNotDirectory,
                format!("working directory is not a directory: {}", cwd.display()),
            ));
        }
        Ok(())
    }

    fn write_args_file(&self, args: &serde_json::Value) -> Result<tempfile::NamedTempFile, RouterError> {
        let mut file = tempfile::NamedTempFile::new().map_err(|e| {
            RouterError::bug(ErrorCode::BugError, format!("failed to create temp file: {e}"))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(file.path(), perms);
        }

        let mut redacted = args.clone();
        self.redactor.redact(&mut redacted);
        let bytes = serde_json::to_vec(&redacted).map_err(|e| {
            RouterError::bug(ErrorCode::BugError, format!("failed to serialize args: {e}"))
        })?;
        file.write_all(&bytes).map_err(|e| {
            RouterError::operational(
                ErrorCode::PermissionDenied,
                format!("failed to write args file: {e}"),
            )
        })?;
        Ok(file)
    }
}

#[async_trait]
impl Adapter for SubprocessAdapter {
    fn adapter_id(&self) -> &str {
        &self.id
    }

    fn adapter_kind(&self) -> &str {
        "subprocess"
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    async fn call(
        &self,
        tool: &str,
        method: &str,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, RouterError> {
        self.validate_cwd()?;
        let args_file = self.write_args_file(args)?;

        let mut cmd = Command::new(&self.config.base_cmd);
        cmd.arg("call")
            .arg(tool)
            .arg(method)
            .arg("--json-args-file")
            .arg(args_file.path());
        if let Some(cwd) = &self.config.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &self.config.env {
            if k.is_empty() {
                return Err(RouterError::operational(
                    ErrorCode::EnvInvalid,
                    "environment variable name must not be empty",
                ));
            }
            cmd.env(k, v);
        }
        cmd.kill_on_drop(true);

        let output = match tokio::time::timeout(self.config.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RouterError::operational(
                    ErrorCode::CommandNotFound,
                    format!("base command not found: {}", self.config.base_cmd),
                ));
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(RouterError::operational(
                    ErrorCode::PermissionDenied,
                    format!("permission denied spawning {}: {e}", self.config.base_cmd),
                ));
            }
            Ok(Err(e)) => {
                return Err(RouterError::bug(
                    ErrorCode::BugError,
                    format!("unexpected error spawning subprocess: {e}"),
                ));
            }
            Err(_) => {
                return Err(RouterError::operational(
                    ErrorCode::Timeout,
                    format!("adapter call exceeded {:?}", self.config.timeout),
                ));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RouterError::operational(
                ErrorCode::NonzeroExit,
                format!("subprocess exited with {}", output.status),
            )
            .with_detail("stderr", self.redactor.redact_text(&stderr))
            .with_detail("exit_code", output.status.code()));
        }

        match serde_json::from_slice::<serde_json::Value>(&output.stdout) {
            Ok(mut v) => {
                self.redactor.redact(&mut v);
                Ok(v)
            }
            Err(e) => Err(RouterError::operational(
                ErrorCode::InvalidJsonOutput,
                format!("stdout was not valid JSON: {e}"),
            )
            .with_detail(
                "stdout_preview",
                self.redactor
                    .redact_text(&String::from_utf8_lossy(&output.stdout))
                    .chars()
                    .take(256)
                    .collect::<String>(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unknown_base_command_is_operational() {
        let adapter = SubprocessAdapter::new(
            "sp",
            SubprocessConfig::new("definitely-not-a-real-command-xyz"),
        );
        let err = adapter
            .call("t", "m", &json!({}))
            .await
            .expect_err("should fail");
        assert_eq!(err.code, ErrorCode::CommandNotFound);
        assert!(!err.is_terminal());
    }

    #[tokio::test]
    async fn missing_cwd_is_operational() {
        let mut config = SubprocessConfig::new("true");
        config.cwd = Some(PathBuf::from("/definitely/not/a/real/path"));
        let adapter = SubprocessAdapter::new("sp", config);
        let err = adapter.call("t", "m", &json!({})).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::CwdNotFound);
    }

    #[tokio::test]
    async fn empty_env_key_is_rejected() {
        let mut config = SubprocessConfig::new("true");
        config.env.push((String::new(), "x".to_string()));
        let adapter = SubprocessAdapter::new("sp", config);
        let err = adapter.call("t", "m", &json!({})).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::EnvInvalid);
    }

    #[tokio::test]
    async fn capabilities_include_apply_timeout_external() {
        let adapter = SubprocessAdapter::new("sp", SubprocessConfig::new("true"));
        assert!(adapter.capabilities().contains(&Capability::Apply));
        assert!(adapter.capabilities().contains(&Capability::Timeout));
        assert!(adapter.capabilities().contains(&Capability::External));
    }
}
