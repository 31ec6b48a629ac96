use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// eBook authoring backend with document import and multi-format export.
#[derive(Parser, Debug, Clone)]
#[command(name = "folio-rs")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "FOLIO_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the server (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// User management commands.
    User {
        /// User subcommand action.
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Initialize database and create default config.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// User management subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    /// Add a new user.
    Add {
        /// Login email.
        email: String,
        /// Display name.
        #[arg(short, long)]
        name: Option<String>,
        /// Password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
        /// Subscription tier.
        #[arg(short, long, default_value = "free")]
        tier: String,
    },

    /// Delete a user.
    Del {
        /// Email of the user to delete.
        email: String,
    },

    /// List all users.
    List,

    /// Change user password.
    Passwd {
        /// Email.
        email: String,
        /// New password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Change a user's subscription tier.
    Tier {
        /// Email.
        email: String,
        /// New tier: free, starter, pro or publisher.
        tier: String,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Remote import configuration.
    #[serde(default)]
    pub import: ImportConfig,

    /// AI assistant configuration.
    #[serde(default)]
    pub ai: AiConfig,

    /// Monthly limits per subscription tier.
    #[serde(default)]
    pub tiers: TiersConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Maximum accepted upload size in megabytes.
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        8080,
    )
}

fn default_max_upload_mb() -> usize {
    25
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/folio.db")
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Registration mode: "open", "disabled".
    #[serde(default = "default_registration")]
    pub registration: String,

    /// Session token duration in days.
    #[serde(default = "default_session_days")]
    pub session_days: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            registration: default_registration(),
            session_days: default_session_days(),
        }
    }
}

fn default_registration() -> String {
    "open".to_string()
}

fn default_session_days() -> u32 {
    30
}

impl AuthConfig {
    /// Check if registration is enabled.
    pub fn registration_enabled(&self) -> bool {
        self.registration == "open"
    }
}

/// Remote import configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Timeout for fetching a remote source.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,

    /// User agent sent with remote fetches.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_seconds: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("folio-rs/", env!("CARGO_PKG_VERSION")).to_string()
}

/// AI assistant configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Whether suggestions are enabled at all.
    #[serde(default = "default_ai_enabled")]
    pub enabled: bool,

    /// OpenAI-compatible chat completions endpoint.
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,

    /// API key sent as a bearer token.
    #[serde(default)]
    pub api_key: String,

    /// Model name.
    #[serde(default = "default_ai_model")]
    pub model: String,

    /// Request timeout in seconds.
    #[serde(default = "default_ai_timeout")]
    pub timeout_seconds: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: default_ai_enabled(),
            endpoint: default_ai_endpoint(),
            api_key: String::new(),
            model: default_ai_model(),
            timeout_seconds: default_ai_timeout(),
        }
    }
}

fn default_ai_enabled() -> bool {
    true
}

fn default_ai_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_ai_timeout() -> u64 {
    60
}

/// Monthly quota for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    /// AI suggestion calls per month.
    pub ai_calls_monthly: i64,
    /// Exports per month.
    pub exports_monthly: i64,
}

/// Limits for every subscription tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TiersConfig {
    /// Free tier.
    #[serde(default = "default_free")]
    pub free: TierLimits,
    /// Starter tier.
    #[serde(default = "default_starter")]
    pub starter: TierLimits,
    /// Pro tier.
    #[serde(default = "default_pro")]
    pub pro: TierLimits,
    /// Publisher tier.
    #[serde(default = "default_publisher")]
    pub publisher: TierLimits,
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            free: default_free(),
            starter: default_starter(),
            pro: default_pro(),
            publisher: default_publisher(),
        }
    }
}

fn default_free() -> TierLimits {
    TierLimits {
        ai_calls_monthly: 10,
        exports_monthly: 2,
    }
}

fn default_starter() -> TierLimits {
    TierLimits {
        ai_calls_monthly: 50,
        exports_monthly: 5,
    }
}

fn default_pro() -> TierLimits {
    TierLimits {
        ai_calls_monthly: 500,
        exports_monthly: 50,
    }
}

fn default_publisher() -> TierLimits {
    TierLimits {
        ai_calls_monthly: 5000,
        exports_monthly: 500,
    }
}

impl TiersConfig {
    /// Limits for a tier; unknown tiers get the free limits.
    pub fn limits(&self, tier: SubscriptionTier) -> TierLimits {
        match tier {
            SubscriptionTier::Free => self.free,
            SubscriptionTier::Starter => self.starter,
            SubscriptionTier::Pro => self.pro,
            SubscriptionTier::Publisher => self.publisher,
        }
    }
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &PathBuf) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("folio-rs.toml"),
            dirs::config_dir()
                .map(|p| p.join("folio-rs").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/folio-rs/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# folio-rs configuration

[server]
bind = "0.0.0.0:8080"
# Maximum upload size for .docx imports
max_upload_mb = 25

[database]
# path = "/var/lib/folio-rs/folio.db"

[auth]
# Registration mode: "open" or "disabled"
registration = "open"
# Session duration in days
session_days = 30

[import]
# Timeout for URL imports
fetch_timeout_seconds = 30
# user_agent = "folio-rs"

[ai]
enabled = true
endpoint = "https://api.openai.com/v1/chat/completions"
# api_key = "sk-..."
model = "gpt-4o-mini"

# Monthly limits per subscription tier
[tiers.free]
ai_calls_monthly = 10
exports_monthly = 2

[tiers.starter]
ai_calls_monthly = 50
exports_monthly = 5

[tiers.pro]
ai_calls_monthly = 500
exports_monthly = 50

[tiers.publisher]
ai_calls_monthly = 5000
exports_monthly = 500
"#
        .to_string()
    }
}

/// Subscription tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    /// Default tier.
    Free,
    /// Entry paid tier.
    Starter,
    /// Professional tier.
    Pro,
    /// Publisher tier.
    Publisher,
}

impl SubscriptionTier {
    /// Parse a stored tier name, falling back to `Free`.
    pub fn from_name(name: &str) -> Self {
        Self::parse(name).unwrap_or(SubscriptionTier::Free)
    }

    /// Strictly parse a tier name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "free" => Some(SubscriptionTier::Free),
            "starter" => Some(SubscriptionTier::Starter),
            "pro" => Some(SubscriptionTier::Pro),
            "publisher" => Some(SubscriptionTier::Publisher),
            _ => None,
        }
    }

    /// Stored name of the tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Starter => "starter",
            SubscriptionTier::Pro => "pro",
            SubscriptionTier::Publisher => "publisher",
        }
    }
}

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Paginated PDF.
    Pdf,
    /// EPUB 3 package.
    Epub,
    /// Single styled HTML page.
    Html,
    /// Plain text wrapped at 80 columns.
    Txt,
    /// Word document.
    Docx,
}

impl ExportFormat {
    /// Get the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Epub => "application/epub+zip",
            ExportFormat::Html => "text/html",
            ExportFormat::Txt => "text/plain",
            ExportFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    /// File extension used in download names.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Epub => "epub",
            ExportFormat::Html => "html",
            ExportFormat::Txt => "txt",
            ExportFormat::Docx => "docx",
        }
    }

    /// Try to resolve a format from its request name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "pdf" => Some(ExportFormat::Pdf),
            "epub" => Some(ExportFormat::Epub),
            "html" | "htm" => Some(ExportFormat::Html),
            "txt" | "text" => Some(ExportFormat::Txt),
            "docx" => Some(ExportFormat::Docx),
            _ => None,
        }
    }
}
