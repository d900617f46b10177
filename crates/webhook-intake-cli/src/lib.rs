//! # Webhook-Intake CLI
//!
//! Operator tooling for webhook receivers:
//! - `validate`: load a receivers file and build the registry
//! - `verify`: run a captured request through the pipeline
//! - `sign`: compute the signature a sender would attach to a body

use bytes::Bytes;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use webhook_intake_core::{
    compute_signature, ConfigurationError, Dispatcher, HeaderList, HmacAlgorithm,
    IncomingRequest, ReceiverRegistry, ReceiversConfig, RejectionReason, VerificationOutcome,
    VerifierCatalog,
};

/// Settings file looked up in the working directory (`.toml`).
pub const SETTINGS_FILE: &str = "webhook-intake";

/// Prefix for settings environment variables, e.g. `WEBHOOK_INTAKE__LOG_LEVEL`.
pub const SETTINGS_ENV_PREFIX: &str = "WEBHOOK_INTAKE";

// ============================================================================
// CLI Structure
// ============================================================================

/// Webhook-Intake CLI - verify and sign inbound webhooks
#[derive(Parser)]
#[command(name = "webhook-intake")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Verify inbound webhooks against receiver configuration")]
pub struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, env = "WEBHOOK_INTAKE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Receivers file (YAML or JSON); falls back to WEBHOOK_RECEIVERS
    #[arg(short, long)]
    pub receivers: Option<PathBuf>,

    /// Logging level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Load the receivers file and report every registered receiver
    Validate {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Verify a captured request for one receiver
    Verify {
        /// Receiver name
        #[arg(long)]
        receiver: String,

        /// File containing the raw request body
        #[arg(short, long)]
        body: PathBuf,

        /// Request header as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Content type, overriding any Content-Type header
        #[arg(long)]
        content_type: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the signature a sender would attach to a body
    Sign {
        /// HMAC digest
        #[arg(short, long, default_value = "sha256")]
        algorithm: SignAlgorithm,

        /// File containing the raw request body
        #[arg(short, long)]
        body: PathBuf,

        /// Signing secret
        #[arg(long, conflicts_with = "secret_env", required_unless_present = "secret_env")]
        secret: Option<String>,

        /// Environment variable holding the signing secret
        #[arg(long)]
        secret_env: Option<String>,

        /// Literal prefix to prepend, e.g. "sha256="
        #[arg(long)]
        prefix: Option<String>,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// HMAC digests accepted by `sign`
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum SignAlgorithm {
    Sha1,
    Sha256,
}

impl From<SignAlgorithm> for HmacAlgorithm {
    fn from(algorithm: SignAlgorithm) -> Self {
        match algorithm {
            SignAlgorithm::Sha1 => HmacAlgorithm::Sha1,
            SignAlgorithm::Sha256 => HmacAlgorithm::Sha256,
        }
    }
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Request rejected: {reason}")]
    Rejected { reason: RejectionReason },

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Settings(_) => 1,
            Self::Rejected { .. } => 2,
            Self::CommandFailed { .. } => 3,
            Self::InvalidArgument { .. } => 4,
            Self::Io(_) => 5,
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Settings layered from `webhook-intake.toml`, an explicit `--config`
/// file and `WEBHOOK_INTAKE__*` environment variables; flags override all.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CliSettings {
    pub log_level: String,
    pub json_logs: bool,
    pub receivers_file: Option<PathBuf>,
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            receivers_file: None,
        }
    }
}

impl CliSettings {
    /// Load settings from the standard sources.
    ///
    /// # Errors
    ///
    /// An explicit settings file that is missing or malformed, or an
    /// environment value of the wrong type, is an error. The default file
    /// is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, CliError> {
        let mut builder = config::Config::builder().add_source(
            config::File::with_name(SETTINGS_FILE)
                .required(false)
                .format(config::FileFormat::Toml),
        );

        if let Some(path) = explicit {
            builder = builder.add_source(
                config::File::from(path)
                    .required(true)
                    .format(config::FileFormat::Toml),
            );
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(SETTINGS_ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }
        if cli.json_logs {
            self.json_logs = true;
        }
        if let Some(path) = &cli.receivers {
            self.receivers_file = Some(path.clone());
        }
        self
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    let settings = CliSettings::load(cli.config.as_deref())?.with_overrides(&cli);

    initialize_logging(&settings)?;
    debug!(settings = ?settings, "settings loaded");

    match cli.command {
        Commands::Validate { format } => execute_validate_command(&settings, format).await,
        Commands::Verify {
            receiver,
            body,
            headers,
            content_type,
            format,
        } => {
            execute_verify_command(&settings, &receiver, &body, &headers, content_type, format)
                .await
        }
        Commands::Sign {
            algorithm,
            body,
            secret,
            secret_env,
            prefix,
        } => execute_sign_command(algorithm, &body, secret, secret_env, prefix).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Initialize logging on stderr so command output on stdout stays clean.
fn initialize_logging(settings: &CliSettings) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "webhook_intake_cli={level},webhook_intake_core={level}",
            level = settings.log_level
        )
        .into()
    });

    let text_layer = (!settings.json_logs).then(|| fmt::layer().with_writer(std::io::stderr));
    let json_layer = settings
        .json_logs
        .then(|| fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .try_init()
        .map_err(|e| CliError::CommandFailed {
            message: format!("failed to initialise logging: {}", e),
        })
}

/// Build the registry from the configured receivers file, or from
/// `WEBHOOK_RECEIVERS` when no file is configured.
pub fn load_registry(settings: &CliSettings) -> Result<ReceiverRegistry, CliError> {
    let config = match &settings.receivers_file {
        Some(path) => {
            info!(path = %path.display(), "loading receivers file");
            ReceiversConfig::load_from_file(path)?
        }
        None => ReceiversConfig::load_from_env()?,
    };
    Ok(config.build_registry(&VerifierCatalog::new())?)
}

/// Parse a `"Name: value"` header argument.
pub fn parse_header(raw: &str) -> Result<(String, String), CliError> {
    let invalid = |message: &str| CliError::InvalidArgument {
        arg: raw.to_string(),
        message: message.to_string(),
    };

    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| invalid("expected 'Name: value'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid("header name must not be empty"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Render an outcome for `verify`.
pub fn render_outcome(receiver: &str, outcome: &VerificationOutcome, format: OutputFormat) -> String {
    match (format, outcome) {
        (OutputFormat::Text, VerificationOutcome::Accepted { event, .. }) => {
            format!("accepted: receiver={} event={}", receiver, event)
        }
        (OutputFormat::Text, VerificationOutcome::Rejected(reason)) => format!(
            "rejected: receiver={} reason={} status={}",
            receiver,
            reason.as_str(),
            reason.status_code()
        ),
        (OutputFormat::Json, VerificationOutcome::Accepted { event, body }) => {
            serde_json::json!({
                "receiver": receiver,
                "accepted": true,
                "event": event,
                "body": body.to_json(),
            })
            .to_string()
        }
        (OutputFormat::Json, VerificationOutcome::Rejected(reason)) => serde_json::json!({
            "receiver": receiver,
            "accepted": false,
            "reason": reason,
            "status": reason.status_code(),
        })
        .to_string(),
    }
}

/// Execute validate command
async fn execute_validate_command(
    settings: &CliSettings,
    format: OutputFormat,
) -> Result<(), CliError> {
    let registry = load_registry(settings)?;

    match format {
        OutputFormat::Text => {
            for descriptor in registry.descriptors() {
                println!(
                    "{}\t{}\t{}",
                    descriptor.name(),
                    descriptor.body_encoding(),
                    descriptor.signature().label()
                );
            }
            println!("{} receiver(s) valid", registry.len());
        }
        OutputFormat::Json => {
            let receivers: Vec<_> = registry
                .descriptors()
                .map(|d| {
                    serde_json::json!({
                        "name": d.name().as_str(),
                        "body_encoding": d.body_encoding(),
                        "signature": d.signature().label(),
                        "allow_missing_event": d.allows_missing_event(),
                    })
                })
                .collect();
            println!("{}", serde_json::json!({ "receivers": receivers }));
        }
    }
    Ok(())
}

/// Execute verify command
async fn execute_verify_command(
    settings: &CliSettings,
    receiver: &str,
    body_path: &Path,
    raw_headers: &[String],
    content_type: Option<String>,
    format: OutputFormat,
) -> Result<(), CliError> {
    let registry = load_registry(settings)?;

    let headers = raw_headers
        .iter()
        .map(|raw| parse_header(raw))
        .collect::<Result<HeaderList, _>>()?;
    let body = Bytes::from(tokio::fs::read(body_path).await?);

    let mut request = IncomingRequest::new(headers, body);
    if let Some(content_type) = content_type {
        request = request.with_content_type(content_type);
    }

    let outcome = Dispatcher::new(&registry).dispatch(receiver, &request);
    println!("{}", render_outcome(receiver, &outcome, format));

    match outcome.rejection() {
        Some(reason) => Err(CliError::Rejected { reason }),
        None => Ok(()),
    }
}

/// Execute sign command
async fn execute_sign_command(
    algorithm: SignAlgorithm,
    body_path: &Path,
    secret: Option<String>,
    secret_env: Option<String>,
    prefix: Option<String>,
) -> Result<(), CliError> {
    let secret = match (secret, secret_env) {
        (Some(secret), _) => secret,
        (None, Some(variable)) => {
            std::env::var(&variable).map_err(|e| CliError::InvalidArgument {
                arg: "--secret-env".to_string(),
                message: format!("{}: {}", variable, e),
            })?
        }
        (None, None) => {
            return Err(CliError::InvalidArgument {
                arg: "--secret".to_string(),
                message: "a secret is required".to_string(),
            })
        }
    };

    let body = tokio::fs::read(body_path).await?;
    let signature = compute_signature(algorithm.into(), secret.as_bytes(), &body).map_err(|e| {
        CliError::CommandFailed {
            message: e.to_string(),
        }
    })?;

    println!("{}{}", prefix.unwrap_or_default(), signature);
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
