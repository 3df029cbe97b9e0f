use crate::types::{
    CatalogError, ToolCallRequest, ToolCallResult, ToolCatalog, ToolDescriptor, ToolInvoker,
};

use async_trait::async_trait;
use rmcp::model::{
    CallToolRequestParams, ClientCapabilities, Implementation, InitializeRequestParams,
    ProtocolVersion,
};
use rmcp::service::{RoleClient, RunningService, serve_client};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::transport::child_process::TokioChildProcess;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// How to reach the MCP server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum McpTransport {
    StreamableHttp {
        url: String,
    },
    /// Spawn `command`; its stdin/stdout speak MCP.
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

fn init_params() -> InitializeRequestParams {
    InitializeRequestParams {
        meta: None,
        protocol_version: ProtocolVersion::V_2024_11_05,
        capabilities: ClientCapabilities::default(),
        client_info: Implementation::from_build_env(),
    }
}

pub struct McpToolHost {
    service: RunningService<RoleClient, InitializeRequestParams>,
}

impl McpToolHost {
    pub async fn connect(transport: &McpTransport, timeout: Duration) -> Result<Self, CatalogError> {
        let handshake = async {
            match transport {
                McpTransport::StreamableHttp { url } => {
                    let config = StreamableHttpClientTransportConfig::with_uri(url.clone());
                    let http_client = reqwest::Client::builder()
                        .build()
                        .map_err(|e| CatalogError::Unavailable(format!("http client: {e}")))?;
                    let transport = StreamableHttpClientTransport::with_client(http_client, config);
                    serve_client(init_params(), transport)
                        .await
                        .map_err(|e| CatalogError::Unavailable(format!("MCP handshake: {e}")))
                }
                McpTransport::Stdio { command, args } => {
                    let mut cmd = Command::new(command);
                    cmd.args(args)
                        .stdin(std::process::Stdio::piped())
                        .stdout(std::process::Stdio::piped());
                    let (transport, _stderr) = TokioChildProcess::builder(cmd)
                        .spawn()
                        .map_err(|e| CatalogError::Unavailable(format!("spawn {command}: {e}")))?;
                    serve_client(init_params(), transport)
                        .await
                        .map_err(|e| CatalogError::Unavailable(format!("MCP handshake: {e}")))
                }
            }
        };

        let service = tokio::time::timeout(timeout, handshake)
            .await
            .map_err(|_| CatalogError::Unavailable("MCP handshake timed out".to_string()))??;
        info!(?transport, "connected to tool host");
        Ok(Self { service })
    }

    pub async fn shutdown(self) {
        if let Err(err) = self.service.cancel().await {
            warn!("tool host did not shut down cleanly: {err}");
        }
    }
}

#[async_trait]
impl ToolCatalog for McpToolHost {
    async fn list(&self) -> Result<Vec<ToolDescriptor>, CatalogError> {
        let tools = self
            .service
            .list_all_tools()
            .await
            .map_err(|e| CatalogError::Unavailable(format!("tools/list: {e}")))?;
        Ok(tools
            .into_iter()
            .map(|tool| {
                ToolDescriptor::new(
                    tool.name.to_string(),
                    tool.description.as_deref().unwrap_or_default(),
                    Value::Object(tool.input_schema.as_ref().clone()),
                )
            })
            .collect())
    }
}

#[async_trait]
impl ToolInvoker for McpToolHost {
    async fn call(&self, request: &ToolCallRequest) -> ToolCallResult {
        let params = CallToolRequestParams {
            meta: None,
            name: request.name.clone().into(),
            arguments: request.arguments.as_object().cloned(),
            task: None,
        };
        match self.service.call_tool(params).await {
            Ok(result) => {
                let result = serde_json::to_value(&result).unwrap_or_default();
                debug!(tool = %request.name, %result, "tools/call returned");
                call_result(&request.id, result)
            }
            Err(err) => ToolCallResult::failure(&request.id, format!("tools/call: {err}")),
        }
    }
}

/// The `content` array is the payload; `isError` marks a failed call.
fn call_result(call_id: &str, result: Value) -> ToolCallResult {
    let failed = result["isError"].as_bool().unwrap_or(false);
    let payload = match result.get("content") {
        Some(content) => content.clone(),
        None => result.get("structuredContent").cloned().unwrap_or(json!([])),
    };
    if failed {
        ToolCallResult::failure(call_id, payload)
    } else {
        ToolCallResult::success(call_id, payload)
    }
}
