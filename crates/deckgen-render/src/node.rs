use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::contract::{RenderError, RenderReply, RenderRequest, Renderer};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Locations checked before falling back to `which node`.
const NODE_SEARCH_PATHS: &[&str] = &[
    "/opt/homebrew/bin/node",
    "/usr/local/bin/node",
    "/usr/bin/node",
    "/opt/local/bin/node",
];

#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Explicit node binary; discovered when unset.
    pub node_path: Option<PathBuf>,
    /// Directory holding pptx.js / readExcel.js / writeExcel.js.
    pub scripts_dir: PathBuf,
    pub timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_path: None,
            scripts_dir: PathBuf::from("scripts"),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Spawns node scripts with a JSON payload on stdin and collects one JSON
/// reply from stdout. Timeout-bounded and cancellable; on either, the child
/// is killed and no partial output is trusted.
#[derive(Clone, Debug)]
pub struct NodeRunner {
    config: NodeConfig,
}

impl NodeRunner {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Resolve the node binary: explicit config, fixed search paths, then
    /// `which node`.
    pub fn resolve_node_path(&self) -> Result<PathBuf, RenderError> {
        if let Some(custom) = &self.config.node_path {
            if is_executable(custom) {
                return Ok(custom.clone());
            }
            return Err(RenderError::NodeNotFound {
                searched: vec![custom.display().to_string()],
            });
        }

        for candidate in NODE_SEARCH_PATHS {
            let path = Path::new(candidate);
            if is_executable(path) {
                return Ok(path.to_path_buf());
            }
        }

        if let Some(found) = which_node() {
            return Ok(found);
        }

        Err(RenderError::NodeNotFound {
            searched: NODE_SEARCH_PATHS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Run one script to completion and return its stdout.
    pub async fn run_script(
        &self,
        script: &str,
        payload: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<String, RenderError> {
        let node = self.resolve_node_path()?;
        let script_path = self.config.scripts_dir.join(format!("{script}.js"));
        let start = Instant::now();

        // kill_on_drop so an abandoned wait (timeout, cancellation) takes the
        // child down with it; partial output is never trusted anyway.
        let mut child = tokio::process::Command::new(&node)
            .arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RenderError::Io(format!("spawn {}: {e}", script_path.display())))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RenderError::Io("child stdin unavailable".into()))?;
        let payload_bytes = serde_json::to_vec(payload)
            .map_err(|e| RenderError::Io(format!("encode payload: {e}")))?;
        stdin
            .write_all(&payload_bytes)
            .await
            .map_err(|e| RenderError::Io(format!("write payload: {e}")))?;
        drop(stdin);

        let wait = tokio::time::timeout(self.config.timeout, child.wait_with_output());
        tokio::pin!(wait);
        let output = tokio::select! {
            // Dropping the pinned wait future drops the child, which kills it
            // thanks to kill_on_drop above.
            _ = cancel.cancelled() => {
                return Err(RenderError::Cancelled);
            }
            result = &mut wait => {
                match result {
                    Ok(output) => output
                        .map_err(|e| RenderError::Io(format!("wait for {script}: {e}")))?,
                    Err(_) => {
                        warn!(script, timeout_ms = self.config.timeout.as_millis() as u64,
                              "script timed out, killing");
                        return Err(RenderError::Timeout(self.config.timeout));
                    }
                }
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);

        debug!(
            script,
            elapsed_ms = start.elapsed().as_millis() as u64,
            status = output.status.code(),
            "script finished"
        );

        if !output.status.success() {
            return Err(RenderError::Failed {
                diagnostics: if stderr.trim().is_empty() {
                    format!("exit status {:?}", output.status.code())
                } else {
                    stderr.trim().to_string()
                },
            });
        }

        Ok(stdout)
    }
}

/// PPT renderer backed by the pptxgenjs node script.
pub struct NodeRenderer {
    runner: NodeRunner,
    cancel: CancellationToken,
}

impl NodeRenderer {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            runner: NodeRunner::new(config),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(config: NodeConfig, cancel: CancellationToken) -> Self {
        Self {
            runner: NodeRunner::new(config),
            cancel,
        }
    }
}

#[async_trait]
impl Renderer for NodeRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<(), RenderError> {
        let params = request
            .to_script_params()
            .map_err(|e| RenderError::Io(format!("encode request: {e}")))?;

        let stdout = self.runner.run_script("pptx", &params, &self.cancel).await?;

        // The script prints exactly one JSON object; trailing logs are ignored.
        let line = stdout
            .lines()
            .find(|l| l.trim_start().starts_with('{'))
            .ok_or_else(|| RenderError::InvalidReply(stdout.clone()))?;
        let reply: RenderReply = serde_json::from_str(line)
            .map_err(|_| RenderError::InvalidReply(line.to_string()))?;

        if !reply.success {
            return Err(RenderError::Failed {
                diagnostics: reply.error.unwrap_or_else(|| "renderer reported failure".into()),
            });
        }
        Ok(())
    }
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

fn which_node() -> Option<PathBuf> {
    let output = std::process::Command::new("which").arg("node").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_node_path_must_be_executable() {
        let runner = NodeRunner::new(NodeConfig {
            node_path: Some(PathBuf::from("/definitely/not/here/node")),
            ..NodeConfig::default()
        });
        let err = runner.resolve_node_path().unwrap_err();
        assert!(matches!(err, RenderError::NodeNotFound { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn missing_script_is_io_or_not_found() {
        let runner = NodeRunner::new(NodeConfig {
            scripts_dir: PathBuf::from("/nonexistent"),
            timeout: Duration::from_secs(1),
            ..NodeConfig::default()
        });
        let cancel = CancellationToken::new();
        let err = runner
            .run_script("pptx", &serde_json::json!({}), &cancel)
            .await
            .unwrap_err();
        // Without node installed this is NodeNotFound; with node it fails to
        // load the script and exits non-zero.
        assert!(
            matches!(
                err,
                RenderError::NodeNotFound { .. } | RenderError::Failed { .. } | RenderError::Io(_)
            ),
            "got: {err}"
        );
    }

    #[tokio::test]
    async fn pre_cancelled_token_short_circuits() {
        // Only meaningful when a node binary exists; otherwise discovery fails
        // first, which is also acceptable.
        let runner = NodeRunner::new(NodeConfig {
            timeout: Duration::from_secs(5),
            ..NodeConfig::default()
        });
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = runner.run_script("pptx", &serde_json::json!({}), &cancel).await;
        assert!(result.is_err());
    }
}
