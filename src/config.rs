use crate::error::{Result, VoteError};
use crate::infrastructure::paystack::{DEFAULT_BASE_URL, GatewayConfig};
use chrono::{TimeDelta, Utc};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings, taken from flags or the environment.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Payment gateway API base URL
    #[arg(long, env = "PAYSTACK_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub gateway_url: String,

    /// Payment gateway secret key
    #[arg(
        long,
        env = "PAYSTACK_SECRET_KEY",
        default_value = "",
        hide_env_values = true,
        global = true
    )]
    pub gateway_secret: String,

    /// Seconds before a gateway call is abandoned
    #[arg(long, env = "VOTEHUB_GATEWAY_TIMEOUT_SECS", default_value_t = 15, global = true)]
    pub gateway_timeout_secs: u64,

    /// URL the gateway redirects payers to after paying
    #[arg(
        long,
        env = "VOTEHUB_CALLBACK_URL",
        default_value = "http://localhost/voting-system/payment/verify",
        global = true
    )]
    pub callback_url: String,

    /// ISO currency code charged
    #[arg(long, env = "VOTEHUB_CURRENCY", default_value = "GHS", global = true)]
    pub currency: String,

    /// Domain for the payer email of USSD payments (`<msisdn>@<domain>`)
    #[arg(long, env = "VOTEHUB_USSD_EMAIL_DOMAIN", default_value = "allvotesgh.com", global = true)]
    pub ussd_email_domain: String,

    /// Minutes after which USSD sessions are swept
    #[arg(long, env = "VOTEHUB_SESSION_TTL_MINUTES", default_value_t = 60, global = true)]
    pub session_ttl_minutes: i64,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// JSON catalog of events, categories and nominees to load before running
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_BASE_URL.to_string(),
            gateway_secret: String::new(),
            gateway_timeout_secs: 15,
            callback_url: "http://localhost/voting-system/payment/verify".to_string(),
            currency: "GHS".to_string(),
            ussd_email_domain: "allvotesgh.com".to_string(),
            session_ttl_minutes: 60,
            db_path: None,
            catalog: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.gateway_timeout_secs == 0 {
            errors.push(("gateway_timeout_secs", "must be positive"));
        }
        if self.session_ttl_minutes <= 0 {
            errors.push(("session_ttl_minutes", "must be positive"));
        } else if self.session_ttl().is_err() {
            errors.push(("session_ttl_minutes", "is out of range"));
        }
        if self.callback_url.trim().is_empty() {
            errors.push(("callback_url", "must not be empty"));
        }
        if self.ussd_email_domain.trim().is_empty() || self.ussd_email_domain.contains('@') {
            errors.push(("ussd_email_domain", "must be a bare domain"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(VoteError::fields(errors))
        }
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.gateway_url.clone(),
            secret_key: self.gateway_secret.clone(),
            currency: self.currency.clone(),
            timeout: Duration::from_secs(self.gateway_timeout_secs),
        }
    }

    pub fn session_ttl(&self) -> Result<TimeDelta> {
        TimeDelta::try_minutes(self.session_ttl_minutes)
            .filter(|ttl| Utc::now().checked_sub_signed(*ttl).is_some())
            .ok_or_else(|| {
                VoteError::Validation(format!(
                    "session TTL of {} minutes is out of range",
                    self.session_ttl_minutes
                ))
            })
    }
}
