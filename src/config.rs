//! Command-line and environment settings

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use clap::Parser;
use std::path::PathBuf;

use crate::auth::jwt::MAX_ACCESS_TTL_SECS;
use crate::auth::{Argon2Hasher, EmailConfig, JwtConfig};
use crate::servers::WebServerConfig;
use crate::{PassgateError, Result};

/// `--database` value selecting the process-local store
pub const IN_MEMORY_DATABASE: &str = ":memory:";

#[derive(Parser, Debug, Clone)]
#[command(name = "passgate", version, about = "Credential and identity-lifecycle service")]
pub struct Settings {
    /// Address to bind
    #[arg(long, env = "PASSGATE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short = 'p', long, env = "PASSGATE_PORT", default_value_t = 3000)]
    pub port: u16,

    /// SQLite database path, or `:memory:` for a non-persistent store
    #[arg(long, env = "PASSGATE_DATABASE", default_value = "data/passgate.db")]
    pub database: String,

    /// HS256 signing secret; a random one is generated when absent
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Access token lifetime: `1d`, `12h`, `30m`, `45s` or plain seconds
    #[arg(long, env = "JWT_EXPIRES_IN", default_value = "1d", value_parser = parse_duration)]
    pub jwt_expires_in: i64,

    #[arg(long, env = "SMTP_HOST")]
    pub smtp_host: Option<String>,

    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    #[arg(long, env = "SMTP_USER")]
    pub smtp_user: Option<String>,

    #[arg(long, env = "SMTP_PASS", hide_env_values = true)]
    pub smtp_pass: Option<String>,

    /// Sender address for outgoing mail
    #[arg(long, env = "SMTP_FROM")]
    pub smtp_from: Option<String>,

    #[arg(long, env = "SMTP_FROM_NAME", default_value = "Passgate")]
    pub smtp_from_name: String,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Also write rotating log files to this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    #[arg(long, default_value_t = argon2::Params::DEFAULT_M_COST)]
    pub argon2_memory_kib: u32,

    #[arg(long, default_value_t = argon2::Params::DEFAULT_T_COST)]
    pub argon2_iterations: u32,
}

impl Settings {
    pub fn uses_in_memory_store(&self) -> bool {
        self.database == IN_MEMORY_DATABASE
    }

    pub fn web_config(&self) -> WebServerConfig {
        WebServerConfig {
            host: self.host.clone(),
            port: self.port,
        }
    }

    pub fn jwt_config(&self) -> Result<JwtConfig> {
        let secret = match self.jwt_secret.as_deref().map(str::trim) {
            Some(secret) if !secret.is_empty() => secret.to_string(),
            _ => {
                log::warn!(
                    "JWT_SECRET not set; using a random secret. Tokens will not survive a restart."
                );
                generate_secret()?
            }
        };
        Ok(JwtConfig::new(secret, self.jwt_expires_in))
    }

    /// `None` unless host, credentials and sender are all configured
    pub fn email_config(&self) -> Option<EmailConfig> {
        match (
            &self.smtp_host,
            &self.smtp_user,
            &self.smtp_pass,
            &self.smtp_from,
        ) {
            (Some(host), Some(user), Some(pass), Some(from)) => Some(EmailConfig {
                smtp_host: host.clone(),
                smtp_port: self.smtp_port,
                smtp_username: user.clone(),
                smtp_password: pass.clone(),
                from_email: from.clone(),
                from_name: self.smtp_from_name.clone(),
            }),
            (None, None, None, None) => None,
            _ => {
                log::warn!("Incomplete SMTP settings (need SMTP_HOST, SMTP_USER, SMTP_PASS and SMTP_FROM)");
                None
            }
        }
    }

    pub fn hasher(&self) -> Result<Argon2Hasher> {
        Argon2Hasher::with_cost(self.argon2_memory_kib, self.argon2_iterations)
    }
}

/// Parse `1d`, `12h`, `30m`, `45s` or bare seconds into seconds
pub fn parse_duration(value: &str) -> std::result::Result<i64, String> {
    let value = value.trim();
    let (digits, multiplier) = match value.chars().last() {
        Some('d') => (&value[..value.len() - 1], 86_400),
        Some('h') => (&value[..value.len() - 1], 3_600),
        Some('m') => (&value[..value.len() - 1], 60),
        Some('s') => (&value[..value.len() - 1], 1),
        Some(_) => (value, 1),
        None => return Err("duration must not be empty".to_string()),
    };

    let amount: i64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{value}'"))?;
    if amount <= 0 {
        return Err(format!("duration must be positive, got '{value}'"));
    }
    amount
        .checked_mul(multiplier)
        .filter(|secs| *secs <= MAX_ACCESS_TTL_SECS)
        .ok_or_else(|| format!("duration '{value}' exceeds the one year maximum"))
}

/// 32 random bytes, URL-safe base64
fn generate_secret() -> Result<String> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| PassgateError::Config(format!("failed to generate secret: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
