//! CLI module for the `warden` binary.
//!
//! `warden match` prints the rules matching each URL; `warden fetch`
//! downloads one URL through the transport stack and writes an access
//! record.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser};
use http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use http_body_util::BodyExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;
use warden_audit::{AccessRecord, AuditRegistry};
use warden_config::{
    CliOverrides, Config, LoggingConfig, apply_overrides, load_config, validate_config,
};
use warden_rules::{Tally, UrlMatcher};
use warden_transport::{Fetch, FetchError, FetchRequest, FetchResponse, ResponseBody};

use crate::router::write_audit;
use crate::{Dispatcher, build_matcher};

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Config file path (json/jsonc/yaml/toml); defaults apply without one
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

/// `warden match` arguments.
#[derive(Parser, Debug, Clone)]
pub struct MatchArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// URLs to test against the loaded rules
    #[arg(required = true)]
    pub urls: Vec<String>,
}

/// `warden fetch` arguments.
#[derive(Parser, Debug, Clone)]
pub struct FetchArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Request method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Extra request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Request body sent as-is
    #[arg(short, long)]
    pub data: Option<String>,

    /// User name written to the access record
    #[arg(short, long, default_value = "")]
    pub user: String,

    /// URL to fetch (http, https or ftp)
    pub url: String,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Load the config file (if any), apply overrides and validate.
pub fn load(common: &CommonArgs) -> Result<Config, warden_config::ConfigError> {
    let mut config = match &common.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    apply_overrides(&mut config, &common.overrides);
    validate_config(&config)?;
    Ok(config)
}

fn init(config: &Config) {
    init_tracing(&config.logging);
    debug!(
        version = warden_core::VERSION,
        "{} starting",
        warden_core::PROJECT_NAME
    );

    if let Some(listen) = &config.metrics.listen {
        match warden_metrics::init_prometheus(listen) {
            Ok(()) => info!("metrics exporter listening on {}", listen),
            Err(e) => warn!("failed to start metrics exporter: {}", e),
        }
    }
}

pub async fn run_match(args: MatchArgs) -> CliResult {
    let config = load(&args.common)?;
    init(&config);

    let matcher = build_matcher(&config.rules)?;
    let mut failed = false;
    for raw in &args.urls {
        match describe_matches(&matcher, raw) {
            Ok(lines) => {
                println!("{raw}");
                for line in lines {
                    println!("  {line}");
                }
            }
            Err(e) => {
                eprintln!("{raw}: {e}");
                failed = true;
            }
        }
    }
    if failed {
        return Err("some URLs could not be parsed".into());
    }
    Ok(())
}

/// One line per matching rule: text form, action, then description when
/// present; ordered by rule text.
pub fn describe_matches(matcher: &UrlMatcher, raw: &str) -> Result<Vec<String>, url::ParseError> {
    let tally = matcher.matching_rules(&Url::parse(raw)?);
    let mut lines: Vec<(String, String)> = tally
        .iter()
        .map(|(rule, _)| {
            let mut line = format!("{rule}\t{}", rule.action());
            if !rule.description().is_empty() {
                line.push('\t');
                line.push_str(rule.description());
            }
            (rule.to_string(), line)
        })
        .collect();
    lines.sort();
    Ok(lines.into_iter().map(|(_, line)| line).collect())
}

pub async fn run_fetch(args: FetchArgs) -> CliResult {
    let config = load(&args.common)?;
    init(&config);

    let matcher = build_matcher(&config.rules)?;
    let audit = Arc::new(
        AuditRegistry::open(&config.audit.access_log, &config.audit.tls_log)
            .with_user_agent(config.audit.log_user_agent),
    );
    let dispatcher = Dispatcher::from_config(&config.transport)?.with_audit(Arc::clone(&audit));

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, canceling fetch");
                cancel_on_signal.cancel();
            }
            Err(e) => warn!("failed to listen for Ctrl+C: {}", e),
        }
    });

    let request = build_request(&args)?.with_cancel(cancel);
    let tally = Url::parse(&args.url)
        .map(|url| matcher.matching_rules(&url))
        .unwrap_or_else(|_| Tally::new());
    let mut record = AccessRecord {
        user: args.user.clone(),
        url: args.url.clone(),
        method: request.method().to_string(),
        proto: "HTTP/1.1".into(),
        ..Default::default()
    }
    .with_tally(&tally);

    let result = fetch_to(&dispatcher, &request, &mut record, &mut tokio::io::stdout()).await;
    write_audit(audit, move |audit| {
        audit.log_access(&record);
    })
    .await;
    result?;
    Ok(())
}

/// Build the outgoing request from CLI arguments.
pub fn build_request(args: &FetchArgs) -> Result<FetchRequest, FetchError> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .map_err(|e| FetchError::InvalidRequest(format!("invalid method {}: {e}", args.method)))?;
    let mut request = FetchRequest::parse(method, &args.url)?;
    for header in &args.headers {
        let (name, value) = header.split_once(':').ok_or_else(|| {
            FetchError::InvalidRequest(format!("header must be \"Name: value\": {header}"))
        })?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| FetchError::InvalidRequest(format!("invalid header name: {e}")))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| FetchError::InvalidRequest(format!("invalid header value: {e}")))?;
        request = request.with_header(name, value);
    }
    if let Some(data) = &args.data {
        request = request.with_body(data.clone());
    }
    Ok(request)
}

/// Fetch `request`, print the status line and headers to stderr, and copy
/// the body to `out`. Response metadata lands in `record` even when the
/// body fails midway.
pub async fn fetch_to<W>(
    fetch: &dyn Fetch,
    request: &FetchRequest,
    record: &mut AccessRecord,
    out: &mut W,
) -> Result<u64, FetchError>
where
    W: AsyncWrite + Unpin,
{
    if let Some(agent) = request.headers().get(http::header::USER_AGENT) {
        record.user_agent = agent.to_str().unwrap_or_default().to_string();
    }
    if let Some(referer) = request.headers().get(http::header::REFERER) {
        record.referer = referer.to_str().unwrap_or_default().to_string();
    }

    let response = fetch
        .fetch(request)
        .await
        .inspect_err(|e| record_error(record, e))?;
    describe_response(&response, record);
    eprintln!("{:?} {}", response.version(), response.status());
    for (name, value) in response.headers() {
        eprintln!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
    }

    copy_body(response.into_body(), out)
        .await
        .inspect_err(|e| record_error(record, e))
}

fn record_error(record: &mut AccessRecord, err: &FetchError) {
    record.extra = Some(serde_json::json!({
        "error": err.to_string(),
        "error_type": err.error_type(),
    }));
}

fn describe_response(response: &FetchResponse, record: &mut AccessRecord) {
    let headers: &HeaderMap = response.headers();
    let text = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    record.status = Some(response.status().as_u16());
    record.content_type = text(CONTENT_TYPE);
    record.content_disposition = text(CONTENT_DISPOSITION);
    record.content_length = text(CONTENT_LENGTH).parse().ok();
}

/// Stream a response body into `out`, returning the bytes written.
pub async fn copy_body<W>(mut body: ResponseBody, out: &mut W) -> Result<u64, FetchError>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(frame) = body.frame().await {
        if let Ok(data) = frame?.into_data() {
            out.write_all(&data).await?;
            written += data.len() as u64;
        }
    }
    out.flush().await?;
    debug!(bytes = written, "body copied");
    Ok(written)
}

/// Initialize tracing subscriber with the given logging configuration.
///
/// Supports:
/// - `level`: Base log level (trace, debug, info, warn, error)
/// - `format`: Output format (json, pretty, compact). Default: pretty
/// - `output`: Output target (stdout, stderr). Default: stderr
/// - `filters`: Per-module log level overrides
pub fn init_tracing(config: &LoggingConfig) {
    let base_level = config
        .level
        .as_deref()
        .unwrap_or(warden_core::DEFAULT_LOG_LEVEL);
    let mut filter_str = base_level.to_string();
    for (module, level) in &config.filters {
        filter_str.push(',');
        filter_str.push_str(module);
        filter_str.push('=');
        filter_str.push_str(level);
    }
    let filter = EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new("info"));

    let format = config
        .format
        .as_deref()
        .unwrap_or(warden_core::DEFAULT_LOG_FORMAT);
    let output = config
        .output
        .as_deref()
        .unwrap_or(warden_core::DEFAULT_LOG_OUTPUT);

    match (format, output) {
        ("json", "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stdout))
                .init();
        }
        ("json", _) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        ("compact", "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stdout))
                .init();
        }
        ("compact", _) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
        (_, "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stdout))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
}
