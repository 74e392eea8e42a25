//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Identity-token validation configuration.
    pub auth: AuthConfig,
    /// Front-end URLs referenced from notifications.
    #[serde(default)]
    pub frontend: FrontendConfig,
    /// Notification dispatch configuration.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Reporting configuration.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Identity-token validation configuration.
///
/// Tokens are issued by the external identity provider; this service only
/// validates them.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared secret the identity provider signs bearer tokens with.
    pub jwt_secret: String,
}

/// Front-end URLs baked into outgoing notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    /// Provider dashboard URL (linked from approval mails).
    #[serde(default = "default_provider_url")]
    pub provider_url: String,
    /// Webshop URL for voucher holders (linked from expiry reminders).
    #[serde(default = "default_webshop_url")]
    pub webshop_url: String,
}

fn default_provider_url() -> String {
    "https://provider.tegoed.test".to_string()
}

fn default_webshop_url() -> String {
    "https://app.tegoed.test".to_string()
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            provider_url: default_provider_url(),
            webshop_url: default_webshop_url(),
        }
    }
}

/// Notification dispatch configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Master switch; when off every dispatch is a logged no-op.
    #[serde(default)]
    pub enabled: bool,
    /// Whether declining a fund provider sends a rejection mail.
    /// Off by default; the decline event is dropped silently.
    #[serde(default)]
    pub notify_on_decline: bool,
    /// Whether the server runs the daily voucher expiry-reminder task.
    #[serde(default)]
    pub expiry_reminders: bool,
    /// How many weeks ahead of expiry the reminder fires.
    #[serde(default = "default_reminder_weeks")]
    pub reminder_weeks: u32,
    /// SMTP relay host.
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    /// SMTP relay port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username.
    #[serde(default)]
    pub smtp_username: String,
    /// SMTP password.
    #[serde(default)]
    pub smtp_password: String,
    /// Sender address.
    #[serde(default = "default_from_email")]
    pub from_email: String,
    /// Sender display name.
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_reminder_weeks() -> u32 {
    4
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    1025
}

fn default_from_email() -> String {
    "noreply@tegoed.test".to_string()
}

fn default_from_name() -> String {
    "Tegoed".to_string()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            notify_on_decline: false,
            expiry_reminders: false,
            reminder_weeks: default_reminder_weeks(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_email: default_from_email(),
            from_name: default_from_name(),
        }
    }
}

/// Reporting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// IANA timezone the finances report buckets are computed in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("TEGOED").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_defaults_are_local_dev() {
        let config = NotificationConfig::default();
        assert_eq!(config.smtp_host, "localhost");
        assert_eq!(config.smtp_port, 1025);
        assert!(!config.enabled);
        assert!(!config.notify_on_decline);
        assert_eq!(config.reminder_weeks, 4);
    }

    #[test]
    fn report_defaults_to_utc() {
        assert_eq!(ReportConfig::default().timezone, "UTC");
    }
}
