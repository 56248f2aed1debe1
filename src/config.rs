//! Process configuration, read once at start-up.
//!
//! Public values (database URL, anon key, publishable key) may be handed to a
//! browser through `/config`. Everything else stays server side and is only
//! reachable through the typed sub-configs below.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_CURRENCY: &str = "usd";
const DEFAULT_BOOKKEEPING_RETRY_SECS: u64 = 10;
const DEFAULT_CHARGE_RETRY_SECS: u64 = 30;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 15 * 60;

#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub api_base: Url,
    pub currency: String,
}

#[derive(Clone)]
pub struct SupabaseConfig {
    pub url: Url,
    pub service_key: String,
}

/// Values that are safe to expose to a front end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublicConfig {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub stripe_publishable_key: Option<String>,
}

#[derive(Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub stripe: Option<StripeConfig>,
    pub supabase: Option<SupabaseConfig>,
    pub database_url: Option<String>,
    pub cron_secret: Option<String>,
    pub public: PublicConfig,
    pub bookkeeping_retry: Duration,
    pub charge_retry: Duration,
    pub sweep_interval: Duration,
}

// Secrets never reach the logs through Debug
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("stripe", &self.stripe.is_some())
            .field("supabase", &self.supabase.as_ref().map(|s| s.url.as_str()))
            .field("database_url", &self.database_url.is_some())
            .field("cron_secret", &self.cron_secret.is_some())
            .field("public", &self.public)
            .field("bookkeeping_retry", &self.bookkeeping_retry)
            .field("charge_retry", &self.charge_retry)
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub key: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.key, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let first = |keys: &[&str]| keys.iter().find_map(|k| get(*k));

        let mut bind_addr: SocketAddr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e| ConfigError { key: "BIND_ADDR", message: format!("{}", e) })?;
        if let Some(port) = get("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|e| ConfigError { key: "PORT", message: format!("{}", e) })?;
            bind_addr.set_port(port);
        }

        let stripe = match get("STRIPE_SECRET_KEY") {
            Some(secret_key) => {
                let api_base = get("STRIPE_API_BASE").unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string());
                Some(StripeConfig {
                    secret_key,
                    api_base: parse_url("STRIPE_API_BASE", &api_base)?,
                    currency: get("STRIPE_CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
                })
            }
            None => None,
        };

        // The server prefers the private URL; the browser gets the public one first
        let server_supabase_url = first(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"]);
        let supabase = match (server_supabase_url, get("SUPABASE_SERVICE_KEY")) {
            (Some(url), Some(service_key)) => Some(SupabaseConfig {
                url: parse_url("SUPABASE_URL", &url)?,
                service_key,
            }),
            _ => None,
        };

        let public = PublicConfig {
            supabase_url: first(&["NEXT_PUBLIC_SUPABASE_URL", "SUPABASE_URL"]),
            supabase_anon_key: first(&["NEXT_PUBLIC_SUPABASE_ANON_KEY", "SUPABASE_ANON_KEY"]),
            stripe_publishable_key: first(&["NEXT_PUBLIC_STRIPE_PUBLISHABLE_KEY", "STRIPE_PUBLISHABLE_KEY"]),
        };

        let sweep_secs = parse_secs("SWEEP_INTERVAL_SECS", get("SWEEP_INTERVAL_SECS"), DEFAULT_SWEEP_INTERVAL_SECS)?;
        if sweep_secs == 0 {
            return Err(ConfigError { key: "SWEEP_INTERVAL_SECS", message: "must be at least 1".to_string() });
        }

        Ok(Config {
            bind_addr,
            stripe,
            supabase,
            database_url: get("DATABASE_URL"),
            cron_secret: get("CRON_SECRET"),
            public,
            bookkeeping_retry: Duration::from_secs(parse_secs(
                "BOOKKEEPING_RETRY_SECS",
                get("BOOKKEEPING_RETRY_SECS"),
                DEFAULT_BOOKKEEPING_RETRY_SECS,
            )?),
            charge_retry: Duration::from_secs(parse_secs(
                "CHARGE_RETRY_SECS",
                get("CHARGE_RETRY_SECS"),
                DEFAULT_CHARGE_RETRY_SECS,
            )?),
            sweep_interval: Duration::from_secs(sweep_secs),
        })
    }

    /// Log which optional pieces are present, without their values.
    pub fn log_summary(&self) {
        tracing::info!(
            has_public_url = self.public.supabase_url.is_some(),
            has_public_key = self.public.supabase_anon_key.is_some(),
            has_publishable_key = self.public.stripe_publishable_key.is_some(),
            has_stripe_secret = self.stripe.is_some(),
            has_supabase_service = self.supabase.is_some(),
            has_database_url = self.database_url.is_some(),
            has_cron_secret = self.cron_secret.is_some(),
            "configuration loaded"
        );
    }
}

fn parse_url(key: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError { key, message: format!("{} ({})", e, value) })
}

fn parse_secs(key: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match value {
        Some(v) => v.parse().map_err(|e| ConfigError { key, message: format!("{}", e) }),
        None => Ok(default),
    }
}
