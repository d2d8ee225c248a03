//! Startup configuration
//!
//! Everything is read once at startup from the environment (optionally
//! primed from a `.env` file). Missing broker or model credentials abort
//! startup with a `ConfigError`.

use crate::error::GatewayError;
use crate::session::Credentials;
use crate::Result;
use std::str::FromStr;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_BROKER_BASE_URL: &str = "https://apiconnect.angelone.in";
pub const DEFAULT_MAX_ORDER_QUANTITY: u64 = 10_000;
pub const DEFAULT_API_PORT: u16 = 8080;

const BROKER_CREDENTIAL_VARS: [&str; 4] = [
    "ANGEL_ONE_API_KEY",
    "ANGEL_ONE_CLIENT_CODE",
    "ANGEL_ONE_PASSWORD",
    "ANGEL_ONE_TOTP_SECRET",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    Gemini,
}

/// Model backend settings
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub provider: AiProvider,
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Trading safety settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradingConfig {
    pub max_order_quantity: u64,
    pub dry_run: bool,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            max_order_quantity: DEFAULT_MAX_ORDER_QUANTITY,
            dry_run: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub base_url: String,
    pub credentials: Credentials,
    /// Re-authenticate once a session is older than this many minutes.
    pub session_max_age_minutes: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub ai: AiConfig,
    pub trading: TradingConfig,
    pub broker: BrokerConfig,
    pub api_port: u16,
}

impl GatewayConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<&str> = BROKER_CREDENTIAL_VARS
            .iter()
            .copied()
            .filter(|var| get(var).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(GatewayError::ConfigError(format!(
                "Missing required environment variables: {:?}",
                missing
            )));
        }

        let credentials = Credentials {
            api_key: get("ANGEL_ONE_API_KEY").unwrap_or_default(),
            client_code: get("ANGEL_ONE_CLIENT_CODE").unwrap_or_default(),
            password: get("ANGEL_ONE_PASSWORD").unwrap_or_default(),
            totp_seed: get("ANGEL_ONE_TOTP_SECRET").unwrap_or_default(),
        };

        let provider = match get("AI_PROVIDER").as_deref() {
            None => AiProvider::Gemini,
            Some(p) if p.eq_ignore_ascii_case("gemini") => AiProvider::Gemini,
            Some(other) => {
                return Err(GatewayError::ConfigError(format!(
                    "Unsupported AI_PROVIDER '{}' (supported: gemini)",
                    other
                )))
            }
        };

        let api_key = get("GEMINI_API_KEY").ok_or_else(|| {
            GatewayError::ConfigError(
                "GEMINI_API_KEY not found in environment variables".to_string(),
            )
        })?;

        let ai = AiConfig {
            provider,
            model: get("AI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key,
            base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            max_tokens: parse_or("AI_MAX_TOKENS", get("AI_MAX_TOKENS"), 1000)?,
            temperature: parse_or("AI_TEMPERATURE", get("AI_TEMPERATURE"), 0.1)?,
        };

        let trading = TradingConfig {
            max_order_quantity: parse_or(
                "MAX_ORDER_QUANTITY",
                get("MAX_ORDER_QUANTITY"),
                DEFAULT_MAX_ORDER_QUANTITY,
            )?,
            dry_run: match get("DRY_RUN_MODE") {
                Some(v) => parse_bool("DRY_RUN_MODE", &v)?,
                None => true,
            },
        };

        let session_max_age_minutes = match get("BROKER_SESSION_MAX_AGE_MINUTES") {
            Some(v) => match parse_value::<u32>("BROKER_SESSION_MAX_AGE_MINUTES", &v)? {
                0 => {
                    return Err(GatewayError::ConfigError(
                        "BROKER_SESSION_MAX_AGE_MINUTES must be greater than zero".to_string(),
                    ))
                }
                minutes => Some(minutes),
            },
            None => None,
        };

        let broker = BrokerConfig {
            base_url: get("BROKER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BROKER_BASE_URL.to_string()),
            credentials,
            session_max_age_minutes,
        };

        let api_port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(v) => parse_value("PORT", &v)?,
            None => DEFAULT_API_PORT,
        };

        Ok(Self {
            ai,
            trading,
            broker,
            api_port,
        })
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse::<T>().map_err(|_| {
        GatewayError::ConfigError(format!("Invalid value for {}: '{}'", key, raw))
    })
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(v) => parse_value(key, &v),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(GatewayError::ConfigError(format!(
            "Invalid value for {}: '{}' (expected true/false)",
            key, raw
        ))),
    }
}
