//! Downstream executor invocation.
//!
//! The control plane shells out to a local AI CLI for actual task
//! execution. The binary is named by `ORCA_EXECUTOR_BIN` (default
//! `claude`, resolved via PATH) and is invoked in print mode with JSON
//! output.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("spawning executor: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("executor failed: {0}")]
    Failed(String),

    #[error("parsing executor output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A single executor invocation, built from pod defaults overridden by
/// task preferences.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
}

/// The executor's response.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    pub output: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_usd: f64,
}

/// The interface the runtime consumes. Implemented by the real CLI
/// executor and by [`MockExecutor`] in tests.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult, ExecutorError>;
}

/// Executor that invokes the local CLI binary.
pub struct CliExecutor {
    bin: String,
}

impl CliExecutor {
    /// If `bin` is empty, defaults to `claude`.
    pub fn new(bin: impl Into<String>) -> Self {
        let bin = bin.into();
        Self {
            bin: if bin.is_empty() {
                "claude".to_string()
            } else {
                bin
            },
        }
    }
}

/// JSON shape of `<bin> -p --output-format json`.
#[derive(Debug, Default, Deserialize)]
struct CliResponse {
    #[serde(default)]
    subtype: String,
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    result: String,
    #[serde(default)]
    total_cost_usd: f64,
    #[serde(default)]
    usage: CliUsage,
}

#[derive(Debug, Default, Deserialize)]
struct CliUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[async_trait]
impl TaskExecutor for CliExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult, ExecutorError> {
        let mut cmd = tokio::process::Command::new(&self.bin);
        cmd.arg("-p")
            .arg(&request.prompt)
            .arg("--output-format")
            .arg("json");

        let model = resolve_model(&request.model);
        if !model.is_empty() {
            cmd.arg("--model").arg(model);
        }
        if let Some(system_prompt) = request.system_prompt.as_deref() {
            if !system_prompt.is_empty() {
                cmd.arg("--system-prompt").arg(system_prompt);
            }
        }
        // Allow nested invocation when orca itself runs under the CLI.
        cmd.env_remove("CLAUDECODE");

        debug!(
            bin = %self.bin,
            model = %request.model,
            prompt_len = request.prompt.len(),
            "invoking executor"
        );

        let output = cmd.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.trim();
            return Err(ExecutorError::Failed(if message.is_empty() {
                format!("executor exited with {}", output.status)
            } else {
                message.to_string()
            }));
        }

        let response: CliResponse = serde_json::from_slice(&output.stdout)?;
        if response.is_error && response.subtype != "error_max_turns" {
            return Err(ExecutorError::Failed(response.result));
        }

        debug!(
            tokens_in = response.usage.input_tokens,
            tokens_out = response.usage.output_tokens,
            cost_usd = response.total_cost_usd,
            "executor call completed"
        );

        Ok(ExecutionResult {
            output: response.result,
            tokens_in: response.usage.input_tokens,
            tokens_out: response.usage.output_tokens,
            cost_usd: response.total_cost_usd,
        })
    }
}

/// Map friendly model shortnames to the CLI's `--model` values.
fn resolve_model(model: &str) -> &str {
    match model {
        "claude-sonnet" => "sonnet",
        "claude-haiku" => "haiku",
        "claude-opus" => "opus",
        other => other,
    }
}

/// Scripted executor for tests: succeeds with a fixed output after an
/// optional number of failures, or fails forever.
pub struct MockExecutor {
    output: String,
    fail_first: parking_lot::Mutex<u32>,
    fail_always: bool,
    delay: std::time::Duration,
}

impl MockExecutor {
    /// An executor that always succeeds with `output`.
    pub fn succeeding(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            fail_first: parking_lot::Mutex::new(0),
            fail_always: false,
            delay: std::time::Duration::ZERO,
        }
    }

    /// An executor that always fails.
    pub fn failing() -> Self {
        Self {
            output: String::new(),
            fail_first: parking_lot::Mutex::new(0),
            fail_always: true,
            delay: std::time::Duration::ZERO,
        }
    }

    /// An executor that fails the first `n` calls, then succeeds.
    pub fn failing_times(n: u32, output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            fail_first: parking_lot::Mutex::new(n),
            fail_always: false,
            delay: std::time::Duration::ZERO,
        }
    }

    /// An executor that sleeps before succeeding (for timeout tests).
    pub fn slow(delay: std::time::Duration, output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            fail_first: parking_lot::Mutex::new(0),
            fail_always: false,
            delay,
        }
    }
}

#[async_trait]
impl TaskExecutor for MockExecutor {
    async fn execute(&self, _request: ExecutionRequest) -> Result<ExecutionResult, ExecutorError> {
        if self.fail_always {
            return Err(ExecutorError::Failed("mock executor failure".to_string()));
        }
        {
            let mut remaining = self.fail_first.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ExecutorError::Failed("mock executor failure".to_string()));
            }
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(ExecutionResult {
            output: self.output.clone(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_shortnames() {
        assert_eq!(resolve_model("claude-sonnet"), "sonnet");
        assert_eq!(resolve_model("claude-haiku"), "haiku");
        assert_eq!(resolve_model("claude-opus"), "opus");
        assert_eq!(
            resolve_model("claude-sonnet-4-20250514"),
            "claude-sonnet-4-20250514"
        );
    }

    #[test]
    fn response_parses_with_missing_fields() {
        let response: CliResponse = serde_json::from_str(r#"{"result":"ok"}"#).expect("parse");
        assert_eq!(response.result, "ok");
        assert!(!response.is_error);
        assert_eq!(response.usage.input_tokens, 0);
    }

    #[test]
    fn response_parses_full_payload() {
        let raw = r#"{
            "type": "result",
            "subtype": "success",
            "is_error": false,
            "result": "done",
            "duration_ms": 1200,
            "num_turns": 1,
            "total_cost_usd": 0.0123,
            "usage": {"input_tokens": 42, "output_tokens": 7}
        }"#;
        let response: CliResponse = serde_json::from_str(raw).expect("parse");
        assert_eq!(response.result, "done");
        assert_eq!(response.usage.input_tokens, 42);
        assert_eq!(response.usage.output_tokens, 7);
        assert!((response.total_cost_usd - 0.0123).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn mock_executor_fails_then_succeeds() {
        let executor = MockExecutor::failing_times(2, "done");
        let request = ExecutionRequest {
            model: "m".into(),
            system_prompt: None,
            prompt: "p".into(),
            max_tokens: 0,
        };

        assert!(executor.execute(request.clone()).await.is_err());
        assert!(executor.execute(request.clone()).await.is_err());
        let result = executor.execute(request).await.expect("third call");
        assert_eq!(result.output, "done");
    }
}
