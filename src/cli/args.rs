//! CLI argument definitions (spec §6).
//!
//! A single flat `#[derive(Parser)]` struct — this system has no
//! subcommands, unlike the teacher's `server run`/`validate`/`list`
//! split. `Cli::validate` runs clap's structural parse through a second,
//! semantic pass the way the teacher separates `clap` parsing from its
//! own `config::validation` module.

use std::path::PathBuf;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};
use clap::{ArgAction, Parser, ValueEnum};
use regex::Regex;

use crate::binding::ServerBinding;
use crate::config::{load_multi_server_config, validate_multi_server_config};
use crate::error::BridgeError;
use crate::observability::LogLevel;

/// `mcpbridge` — bridges a stdio MCP server onto SSE, Streamable-HTTP, or
/// WebSocket (and back).
#[derive(Parser, Debug)]
#[command(name = "mcpbridge", author, version, about)]
pub struct Cli {
    /// Forward mode: spawn `<cmd>` and expose it over a network transport.
    /// Repeatable; if every value contains `=`, each is `name=command`
    /// (multi-binding), otherwise a single binding at `/`.
    #[arg(long = "stdio", action = ArgAction::Append)]
    pub stdio: Vec<String>,

    /// Reverse mode: dial a remote SSE MCP endpoint, expose it on stdio.
    #[arg(long = "sse")]
    pub sse: Option<String>,

    /// Reverse mode: dial a remote Streamable-HTTP MCP endpoint, expose
    /// it on stdio.
    #[arg(long = "streamableHttp")]
    pub streamable_http: Option<String>,

    /// Multi-server mode: JSON file `{"servers":[{"path","stdio"}, …]}`.
    #[arg(long = "multiServerConfig")]
    pub multi_server_config: Option<PathBuf>,

    /// Output transport for forward modes. Default: `sse` for `--stdio`,
    /// `stdio` for `--sse`/`--streamableHttp`.
    #[arg(long = "outputTransport")]
    pub output_transport: Option<OutputTransport>,

    #[arg(long = "port", default_value_t = 8000)]
    pub port: u16,

    /// Absolute base URL advertised over SSE's message endpoint.
    #[arg(long = "baseUrl")]
    pub base_url: Option<String>,

    #[arg(long = "ssePath", default_value = "/sse")]
    pub sse_path: String,

    #[arg(long = "messagePath", default_value = "/message")]
    pub message_path: String,

    #[arg(long = "streamableHttpPath", default_value = "/mcp")]
    pub streamable_http_path: String,

    #[arg(long = "logLevel", default_value = "info")]
    pub log_level: LogLevel,

    /// No args → allow all origins; `"/regex/"` → regex match; otherwise
    /// exact string match.
    #[arg(long = "cors", num_args = 0.., action = ArgAction::Append)]
    pub cors: Option<Vec<String>>,

    /// Repeatable. Each responds `200 ok` when the bridge is healthy.
    #[arg(long = "healthEndpoint", action = ArgAction::Append)]
    pub health_endpoint: Vec<String>,

    /// Repeatable `"K: V"` pairs injected on outbound responses (forward
    /// modes) or outbound requests (reverse modes).
    #[arg(long = "header", action = ArgAction::Append)]
    pub header: Vec<String>,

    #[arg(long = "oauth2Bearer")]
    pub oauth2_bearer: Option<String>,

    /// Selects the stateful Streamable-HTTP adapter. Only valid with
    /// `--outputTransport streamableHttp`.
    #[arg(long = "stateful")]
    pub stateful: bool,

    /// Idle timeout in milliseconds for stateful sessions.
    #[arg(long = "sessionTimeout")]
    pub session_timeout: Option<i64>,

    #[arg(long = "protocolVersion", default_value = "2024-11-05")]
    pub protocol_version: String,
}

/// `--outputTransport` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputTransport {
    Stdio,
    Sse,
    Ws,
    #[value(name = "streamableHttp")]
    StreamableHttp,
}

/// Which remote transport a reverse binding dials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReverseKind {
    Sse,
    StreamableHttp,
}

/// Resolved operating mode, after exactly-one-of validation.
#[derive(Debug, Clone)]
pub enum Mode {
    /// `stdio ⇄ {sse, streamableHttp, ws}`, one or more bindings.
    Forward { bindings: Vec<ServerBinding>, output: OutputTransport, stateful: bool },
    /// `{sse, streamableHttp} → stdio`.
    Reverse { url: String, kind: ReverseKind },
}

/// Origin matching rule for the CORS layer.
#[derive(Debug, Clone)]
pub enum CorsRule {
    AllowAll,
    Regex(Regex),
    Exact(String),
}

/// `Cli` after semantic validation and flag normalization — everything
/// the orchestrator needs, with no further parsing required.
#[derive(Debug, Clone)]
pub struct ParsedCli {
    pub mode: Mode,
    pub port: u16,
    pub base_url: Option<String>,
    pub sse_path: String,
    pub message_path: String,
    pub streamable_http_path: String,
    pub log_level: LogLevel,
    pub cors: Vec<CorsRule>,
    pub health_endpoints: Vec<String>,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub session_timeout: Option<Duration>,
    pub protocol_version: String,
}

impl Cli {
    /// Runs the semantic validation pass spec §6 describes: exactly one
    /// of the four mode-selecting flags, `--stateful` combination rules,
    /// `--sessionTimeout > 0`, and header/CORS parsing.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] on the first rule violated.
    pub fn validate(self) -> Result<ParsedCli, BridgeError> {
        let mode_count = [
            !self.stdio.is_empty(),
            self.sse.is_some(),
            self.streamable_http.is_some(),
            self.multi_server_config.is_some(),
        ]
        .into_iter()
        .filter(|b| *b)
        .count();
        if mode_count != 1 {
            return Err(BridgeError::Config(
                "exactly one of --stdio, --sse, --streamableHttp, --multiServerConfig is required".into(),
            ));
        }

        let mode = self.resolve_mode()?;

        if let Mode::Forward { output, stateful, .. } = &mode {
            if *stateful && !matches!(output, OutputTransport::StreamableHttp) {
                return Err(BridgeError::Config(
                    "--stateful is only valid with --outputTransport streamableHttp".into(),
                ));
            }
        }

        let session_timeout = match self.session_timeout {
            None => None,
            Some(ms) if ms > 0 => Some(Duration::from_millis(ms as u64)),
            Some(_) => return Err(BridgeError::Config("--sessionTimeout must be > 0".into())),
        };

        let headers = parse_headers(&self.header, self.oauth2_bearer.as_deref())?;
        let cors = parse_cors(self.cors);

        Ok(ParsedCli {
            mode,
            port: self.port,
            base_url: self.base_url,
            sse_path: self.sse_path,
            message_path: self.message_path,
            streamable_http_path: self.streamable_http_path,
            log_level: self.log_level,
            cors,
            health_endpoints: self.health_endpoint,
            headers,
            session_timeout,
            protocol_version: self.protocol_version,
        })
    }

    fn resolve_mode(&self) -> Result<Mode, BridgeError> {
        if !self.stdio.is_empty() {
            let output = self.output_transport.unwrap_or(OutputTransport::Sse);
            let bindings = parse_stdio_bindings(&self.stdio);
            return Ok(Mode::Forward { bindings, output, stateful: self.stateful });
        }
        if let Some(url) = &self.sse {
            return Ok(Mode::Reverse { url: url.clone(), kind: ReverseKind::Sse });
        }
        if let Some(url) = &self.streamable_http {
            return Ok(Mode::Reverse { url: url.clone(), kind: ReverseKind::StreamableHttp });
        }
        if let Some(path) = &self.multi_server_config {
            let config = validate_multi_server_config(load_multi_server_config(path)?)?;
            let output = self.output_transport.unwrap_or(OutputTransport::Sse);
            let bindings =
                config.servers.into_iter().map(|e| ServerBinding::new(e.path, e.stdio)).collect();
            return Ok(Mode::Forward { bindings, output, stateful: self.stateful });
        }
        unreachable!("mode_count == 1 already checked by caller")
    }
}

/// `--stdio` values: `name=command` if every value contains `=`
/// (multi-binding), otherwise a single binding mounted at `/`.
fn parse_stdio_bindings(values: &[String]) -> Vec<ServerBinding> {
    if values.iter().all(|v| v.contains('=')) {
        values
            .iter()
            .map(|v| {
                let (name, command) = v.split_once('=').expect("checked above");
                ServerBinding::new(name, command)
            })
            .collect()
    } else {
        vec![ServerBinding::new("/", values.join(" "))]
    }
}

fn parse_headers(
    raw: &[String],
    bearer: Option<&str>,
) -> Result<Vec<(HeaderName, HeaderValue)>, BridgeError> {
    let mut headers = Vec::new();
    for entry in raw {
        let (name, value) = entry
            .split_once(':')
            .ok_or_else(|| BridgeError::Config(format!("--header '{entry}' is missing ':'")))?;
        let name = HeaderName::try_from(name.trim())
            .map_err(|e| BridgeError::Config(format!("--header '{entry}' has an invalid name: {e}")))?;
        let value = HeaderValue::try_from(value.trim())
            .map_err(|e| BridgeError::Config(format!("--header '{entry}' has an invalid value: {e}")))?;
        headers.push((name, value));
    }
    if let Some(token) = bearer {
        let value = HeaderValue::try_from(format!("Bearer {token}"))
            .map_err(|e| BridgeError::Config(format!("--oauth2Bearer produced an invalid header value: {e}")))?;
        headers.push((HeaderName::from_static("authorization"), value));
    }
    Ok(headers)
}

fn parse_cors(raw: Option<Vec<String>>) -> Vec<CorsRule> {
    match raw {
        None => Vec::new(),
        Some(values) if values.is_empty() => vec![CorsRule::AllowAll],
        Some(values) => values
            .into_iter()
            .map(|v| {
                if v.len() >= 2 && v.starts_with('/') && v.ends_with('/') {
                    match Regex::new(&v[1..v.len() - 1]) {
                        Ok(re) => CorsRule::Regex(re),
                        Err(_) => CorsRule::Exact(v),
                    }
                } else {
                    CorsRule::Exact(v)
                }
            })
            .collect(),
    }
}
