//! Sample handlers
//!
//! `sample/exec` runs a script through a shell; `sample/file` reads a file
//! and answers with it as a secret. They exist to exercise the router from
//! the CLI and are not hardened for production use.

use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ExecConfig;
use crate::context::Context;
use crate::error::TaskError;
use crate::handler::Handler;
use crate::logging::Masker;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::secret::Secret;

pub const EXEC_TASK: &str = "sample/exec";
pub const FILE_TASK: &str = "sample/file";

/// Register both sample handlers on `router`
pub fn register_samples(router: &mut Router, config: &ExecConfig) {
    router.register(EXEC_TASK, ExecHandler::new(config.shell.clone()));
    router.register(FILE_TASK, FileHandler);
}

// ═══════════════════════════════════════════
// EXEC
// ═══════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
struct ExecInput {
    #[serde(default)]
    shell: Option<String>,
    #[serde(default)]
    script: Vec<String>,
    /// `KEY=value` pairs; when present they replace the inherited environment
    #[serde(default)]
    envs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecOutput {
    pub pid: u32,
    pub exited: bool,
    pub exit_code: i32,
    /// Masked combined output, one entry per line
    pub out: Vec<String>,
}

/// Runs `script` lines joined by newlines as `<shell> -c <script>`
pub struct ExecHandler {
    shell: String,
}

impl ExecHandler {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl Handler for ExecHandler {
    async fn handle(&self, ctx: &Context, req: &mut Request) -> Response {
        let input: ExecInput = match req.task.data.decode() {
            Ok(input) => input,
            Err(err) => return Response::error(err),
        };

        let shell = input
            .shell
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.shell.clone());

        let mut cmd = tokio::process::Command::new(&shell);
        cmd.arg("-c")
            .arg(input.script.join("\n"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if !input.envs.is_empty() {
            cmd.env_clear();
            for pair in &input.envs {
                if let Some((key, value)) = pair.split_once('=') {
                    cmd.env(key, value);
                }
            }
        }

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => return Response::error(err),
        };
        let pid = child.id().unwrap_or_default();
        debug!(pid, shell = %shell, "script started");

        let output = tokio::select! {
            output = child.wait_with_output() => match output {
                Ok(output) => output,
                Err(err) => return Response::error(err),
            },
            _ = ctx.cancelled() => return Response::error(TaskError::Cancelled),
        };

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        let masked = Masker::new(Vec::new(), req.redaction_values())
            .mask(&String::from_utf8_lossy(&combined))
            .into_owned();

        // mirror to the request's own sink
        {
            use std::io::Write;
            let mut log = req.masked_logger();
            if let Err(err) = log.write_all(masked.as_bytes()) {
                debug!(error = %err, "task log write failed");
            }
        }

        let result = ExecOutput {
            pid,
            exited: output.status.code().is_some(),
            exit_code: output.status.code().unwrap_or(-1),
            out: masked.split('\n').map(str::to_string).collect(),
        };
        debug!(pid, exit_code = result.exit_code, "script finished");

        if output.status.success() {
            Response::json(&result)
        } else {
            let body = serde_json::to_vec(&result).unwrap_or_default();
            Response::failure_with_body(
                TaskError::handler(format!("exit status {}", result.exit_code)),
                body,
            )
        }
    }
}

// ═══════════════════════════════════════════
// FILE
// ═══════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct FileInput {
    path: String,
}

/// Reads `path` and returns its contents as a secret value
pub struct FileHandler;

#[async_trait]
impl Handler for FileHandler {
    async fn handle(&self, _ctx: &Context, req: &mut Request) -> Response {
        let input: FileInput = match req.task.data.decode() {
            Ok(input) => input,
            Err(err) => return Response::error(err),
        };

        match tokio::fs::read_to_string(&input.path).await {
            Ok(contents) => Response::json(&Secret::new("", contents)),
            Err(err) => Response::error(err),
        }
    }
}
