//! Callable backends that component files can name directly, without any
//! host registration: subprocess commands, remote HTTP endpoints, text
//! templates and files read on demand.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;

use crate::core::callable::{ContentProducer, ToolHandler};
use crate::core::error::ToolError;
use crate::host::template;
use crate::infra::http::headers::{add_standard_headers, generate_request_id};
use crate::infra::runtime::limits::{retry_async, COMMAND_TIMEOUT, HTTP_RETRIES};

/// Runs a process in the component's directory. Tool input is written to
/// stdin as JSON; stdout is the result.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    argv: Vec<String>,
    cwd: PathBuf,
    timeout: Duration,
}

impl CommandBackend {
    pub fn new(argv: Vec<String>, cwd: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            argv,
            cwd: cwd.into(),
            timeout: timeout.unwrap_or(COMMAND_TIMEOUT),
        }
    }

    async fn run(&self, input: Option<&Value>) -> Result<String, ToolError> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| ToolError::Backend("empty command".into()))?;

        let mut child = tokio::process::Command::new(program)
            .args(args)
            .current_dir(&self.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let payload = input
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| ToolError::Backend(e.to_string()))?;
        let stdin = child.stdin.take();
        // Input is fed while stdout and stderr drain, so a child that writes
        // before it reads cannot stall on a full pipe. Dropping stdin is EOF.
        let feed = async move {
            if let (Some(mut stdin), Some(bytes)) = (stdin, payload) {
                if let Err(e) = stdin.write_all(&bytes).await {
                    // The process may legitimately exit without reading its input.
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        return Err(e);
                    }
                }
            }
            Ok(())
        };

        let run = async move { tokio::join!(feed, child.wait_with_output()) };
        let (fed, output) = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| ToolError::Backend(format!("'{program}' timed out after {:?}", self.timeout)))?;
        fed?;
        let output = output?;

        if !output.status.success() {
            return Err(ToolError::Backend(format!(
                "'{program}' exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ToolHandler for CommandBackend {
    async fn call(&self, arguments: &Value) -> Result<Value, ToolError> {
        let stdout = self.run(Some(arguments)).await?;
        Ok(serde_json::from_str(&stdout).unwrap_or_else(|_| Value::String(stdout.trim_end().to_string())))
    }
}

#[async_trait]
impl ContentProducer for CommandBackend {
    async fn produce(&self) -> Result<String, ToolError> {
        self.run(None).await
    }
}

/// POSTs tool input to a remote endpoint and returns its JSON body.
#[derive(Clone)]
pub struct HttpBackend {
    url: String,
    http: Client,
    retries: u32,
}

impl HttpBackend {
    pub fn new(url: impl Into<String>, http: Client) -> Self {
        Self {
            url: url.into(),
            http,
            retries: HTTP_RETRIES,
        }
    }
}

/// Transport failures and 5xx are worth another attempt; everything else is final.
#[derive(Debug)]
struct HttpFailure {
    retryable: bool,
    message: String,
}

#[async_trait]
impl ToolHandler for HttpBackend {
    async fn call(&self, arguments: &Value) -> Result<Value, ToolError> {
        let req_id = generate_request_id();
        let start = Instant::now();
        tracing::debug!(endpoint = %self.url, request_id = %req_id, "http backend request");

        let res = retry_async(
            self.retries,
            |f: &HttpFailure| f.retryable,
            |_| {
                let builder = self.http.post(&self.url);
                let (builder, _rid) = add_standard_headers(builder, Some(req_id.clone()));
                async move {
                    let resp = builder.json(arguments).send().await.map_err(|e| HttpFailure {
                        retryable: true,
                        message: e.to_string(),
                    })?;
                    let status = resp.status();
                    if !status.is_success() {
                        return Err(HttpFailure {
                            retryable: status.is_server_error(),
                            message: format!("upstream status {status}"),
                        });
                    }
                    resp.json::<Value>().await.map_err(|e| HttpFailure {
                        retryable: false,
                        message: format!("invalid JSON response: {e}"),
                    })
                }
            },
        )
        .await;

        tracing::debug!(
            endpoint = %self.url,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = res.is_ok(),
            "http backend finished"
        );
        res.map_err(|f| ToolError::Backend(f.message))
    }
}

/// Renders a fixed template against the tool input.
#[derive(Debug, Clone)]
pub struct TemplateBackend {
    template: String,
}

impl TemplateBackend {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }
}

#[async_trait]
impl ToolHandler for TemplateBackend {
    async fn call(&self, arguments: &Value) -> Result<Value, ToolError> {
        let empty = serde_json::Map::new();
        let vars = arguments.as_object().unwrap_or(&empty);
        Ok(json!(template::render(&self.template, vars)))
    }
}

/// Reads a file every time the resource is requested.
#[derive(Debug, Clone)]
pub struct FileContent {
    path: PathBuf,
}

impl FileContent {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ContentProducer for FileContent {
    async fn produce(&self) -> Result<String, ToolError> {
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }
}
