//! Broker credentials and the rotating one-time code generator

use crate::error::GatewayError;
use crate::Result;
use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha1 = Hmac<Sha1>;

/// RFC 6238 time step
pub const TOTP_STEP_SECS: u64 = 30;
pub const TOTP_DIGITS: u32 = 6;

/// The four login secrets; immutable for the process lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub client_code: String,
    pub password: String,
    pub totp_seed: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("client_code", &self.client_code)
            .field("password", &"<redacted>")
            .field("totp_seed", &"<redacted>")
            .finish()
    }
}

/// Holds credentials plus the decoded TOTP key.
#[derive(Clone)]
pub struct CredentialVault {
    credentials: Credentials,
    totp_key: Vec<u8>,
}

impl fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialVault")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl CredentialVault {
    pub fn new(credentials: Credentials) -> Result<Self> {
        let missing: Vec<&str> = [
            ("api_key", &credentials.api_key),
            ("client_code", &credentials.client_code),
            ("password", &credentials.password),
            ("totp_seed", &credentials.totp_seed),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

        if !missing.is_empty() {
            return Err(GatewayError::ConfigError(format!(
                "Missing broker credentials: {:?}",
                missing
            )));
        }

        let totp_key = decode_base32(&credentials.totp_seed).ok_or_else(|| {
            GatewayError::ConfigError("TOTP seed is not valid base32".to_string())
        })?;

        Ok(Self {
            credentials,
            totp_key,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.credentials.api_key
    }

    pub fn client_code(&self) -> &str {
        &self.credentials.client_code
    }

    pub fn password(&self) -> &str {
        &self.credentials.password
    }

    /// One-time code for the current wall-clock time.
    pub fn current_code(&self) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| GatewayError::AuthError(format!("System clock before epoch: {}", e)))?;
        self.code_at(now.as_secs())
    }

    /// One-time code for a given unix timestamp.
    pub fn code_at(&self, unix_secs: u64) -> Result<String> {
        let counter = unix_secs / TOTP_STEP_SECS;

        let mut mac = HmacSha1::new_from_slice(&self.totp_key)
            .map_err(|e| GatewayError::AuthError(format!("TOTP key rejected: {}", e)))?;
        mac.update(&counter.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        // Dynamic truncation
        let offset = (digest[digest.len() - 1] & 0x0f) as usize;
        let binary = ((digest[offset] as u32 & 0x7f) << 24)
            | ((digest[offset + 1] as u32) << 16)
            | ((digest[offset + 2] as u32) << 8)
            | (digest[offset + 3] as u32);

        let code = binary % 10u32.pow(TOTP_DIGITS);
        Ok(format!("{:0width$}", code, width = TOTP_DIGITS as usize))
    }
}

/// RFC 4648 base32; case-insensitive, ignores padding, spaces and dashes.
fn decode_base32(input: &str) -> Option<Vec<u8>> {
    let normalized: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=' && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    BASE32_NOPAD
        .decode(normalized.as_bytes())
        .ok()
        .filter(|key| !key.is_empty())
}
