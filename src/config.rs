use anyhow::{Result, anyhow};
use async_openai::config::OpenAIConfig;
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use std::time::Duration;
use toolchat::LlmBackend;
use toolchat::backend::{AnthropicBackend, GeminiBackend, OpenAiBackend};
use toolchat::host::McpTransport;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000/mcp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    Openai,
    Anthropic,
    Gemini,
}

impl BackendKind {
    fn key_var(self) -> &'static str {
        match self {
            BackendKind::Openai => "OPENAI_API_KEY",
            BackendKind::Anthropic => "ANTHROPIC_API_KEY",
            BackendKind::Gemini => "GEMINI_API_KEY",
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            BackendKind::Openai => toolchat::backend::openai::DEFAULT_MODEL,
            BackendKind::Anthropic => toolchat::backend::anthropic::DEFAULT_MODEL,
            BackendKind::Gemini => toolchat::backend::gemini::DEFAULT_MODEL,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "toolchat",
    about = "Chat with an LLM that can call tools on an MCP server",
    version
)]
pub struct Config {
    /// LLM provider family
    #[arg(long, value_enum, env = "TOOLCHAT_BACKEND", default_value = "anthropic")]
    pub backend: BackendKind,

    /// Model name, defaults per backend
    #[arg(long, env = "TOOLCHAT_MODEL")]
    pub model: Option<String>,

    /// API key, falls back to the backend's usual environment variable
    #[arg(long)]
    pub api_key: Option<String>,

    /// Override the backend's API base URL
    #[arg(long, env = "TOOLCHAT_BASE_URL")]
    pub base_url: Option<String>,

    /// Streamable HTTP endpoint of the MCP server
    #[arg(long, env = "TOOLCHAT_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    pub server_url: String,

    /// Spawn this MCP server and talk to it over stdio instead
    #[arg(long, conflicts_with = "local_tools")]
    pub server_command: Option<String>,

    /// Argument for --server-command, repeatable
    #[arg(long = "server-arg", allow_hyphen_values = true, requires = "server_command")]
    pub server_args: Vec<String>,

    /// Use the built-in tools instead of an MCP server
    #[arg(long)]
    pub local_tools: bool,

    /// Backend calls allowed per prompt, 0 for no limit
    #[arg(long, default_value_t = 16)]
    pub max_turns: usize,

    /// Seconds to wait for the MCP handshake
    #[arg(long, default_value_t = 30)]
    pub connect_timeout: u64,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.backend.default_model())
    }

    pub fn api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(self.backend.key_var()).ok())
            .ok_or_else(|| {
                anyhow!(
                    "no API key: pass --api-key or set {}",
                    self.backend.key_var()
                )
            })
    }

    pub fn transport(&self) -> McpTransport {
        match &self.server_command {
            Some(command) => McpTransport::Stdio {
                command: command.clone(),
                args: self.server_args.clone(),
            },
            None => McpTransport::StreamableHttp {
                url: self.server_url.clone(),
            },
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn max_turns(&self) -> Option<usize> {
        (self.max_turns > 0).then_some(self.max_turns)
    }

    pub fn build_backend(&self) -> Result<Arc<dyn LlmBackend>> {
        let api_key = self.api_key()?;
        let backend: Arc<dyn LlmBackend> = match self.backend {
            BackendKind::Openai => {
                let mut config = OpenAIConfig::new().with_api_key(api_key);
                if let Some(base_url) = &self.base_url {
                    config = config.with_api_base(base_url);
                }
                Arc::new(OpenAiBackend::new(config, self.model()))
            }
            BackendKind::Anthropic => {
                let backend = AnthropicBackend::new(api_key, self.model());
                match &self.base_url {
                    Some(base_url) => Arc::new(backend.with_base_url(base_url)),
                    None => Arc::new(backend),
                }
            }
            BackendKind::Gemini => {
                let backend = GeminiBackend::new(api_key, self.model());
                match &self.base_url {
                    Some(base_url) => Arc::new(backend.with_base_url(base_url)),
                    None => Arc::new(backend),
                }
            }
        };
        Ok(backend)
    }
}
