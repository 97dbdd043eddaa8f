//! Application configuration, read from the environment.

use di::{inject, injectable};
use log::warn;
use std::env;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;

/// Upper bound for `PENDING_APPOINTMENT_TTL_HOURS`, one year.
pub const MAX_PENDING_TTL_HOURS: i64 = 24 * 366;

static ACTIVE_CONFIG: RwLock<Option<AppConfig>> = RwLock::new(None);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable `{0}` must be set")]
    Missing(&'static str),

    #[error("environment variable `{name}` has an invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_address: String,
    pub cors_origins: Vec<String>,
    pub messaging: MessagingConfig,
    pub assistant: AssistantConfig,
    pub orders: OrdersConfig,
    pub business_utc_offset_minutes: i32,
    pub pending_appointment_ttl_hours: i64,
}

#[derive(Debug, Clone)]
pub struct MessagingConfig {
    pub api_base: String,
    pub account_sid: String,
    pub auth_token: String,
    pub whatsapp_from: String,
    pub confirmation_template_sid: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_base: String,
    pub api_key: String,
    pub assistant_id: String,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct OrdersConfig {
    pub api_base: String,
    pub api_key: String,
    pub api_secret: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_url: "sqlite://commerce.db?mode=rwc".to_owned(),
            bind_address: "0.0.0.0:3000".to_owned(),
            cors_origins: vec![
                "http://localhost:3000".to_owned(),
                "http://localhost:5173".to_owned(),
            ],
            messaging: MessagingConfig {
                api_base: "https://api.twilio.com".to_owned(),
                account_sid: String::new(),
                auth_token: String::new(),
                whatsapp_from: String::new(),
                confirmation_template_sid: None,
            },
            assistant: AssistantConfig {
                api_base: "https://api.openai.com/v1".to_owned(),
                api_key: String::new(),
                assistant_id: String::new(),
                poll_interval: Duration::from_secs(1),
                max_poll_attempts: 30,
            },
            orders: OrdersConfig {
                api_base: String::new(),
                api_key: String::new(),
                api_secret: String::new(),
            },
            business_utc_offset_minutes: 0,
            pending_appointment_ttl_hours: 12,
        }
    }
}

#[injectable]
impl AppConfig {
    /// Returns the installed configuration, or the defaults if none was installed.
    #[inject]
    pub fn create() -> AppConfig {
        match ACTIVE_CONFIG.read() {
            Ok(guard) => guard.clone().unwrap_or_else(|| {
                warn!("no configuration installed, using defaults");
                AppConfig::default()
            }),
            Err(poisoned) => poisoned.into_inner().clone().unwrap_or_default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<AppConfig, ConfigError> {
        let defaults = AppConfig::default();

        Ok(AppConfig {
            database_url: required("DATABASE_URL")?,
            bind_address: optional("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            cors_origins: optional("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            messaging: MessagingConfig {
                api_base: optional("TWILIO_API_BASE").unwrap_or(defaults.messaging.api_base),
                account_sid: required("TWILIO_ACCOUNT_SID")?,
                auth_token: required("TWILIO_AUTH_TOKEN")?,
                whatsapp_from: required("TWILIO_WHATSAPP_FROM")?,
                confirmation_template_sid: optional("TWILIO_CONFIRMATION_TEMPLATE_SID"),
            },
            assistant: AssistantConfig {
                api_base: optional("OPENAI_API_BASE").unwrap_or(defaults.assistant.api_base),
                api_key: required("OPENAI_API_KEY")?,
                assistant_id: required("OPENAI_ASSISTANT_ID")?,
                poll_interval: Duration::from_millis(parsed("ASSISTANT_POLL_INTERVAL_MS", 1000)?),
                max_poll_attempts: parsed("ASSISTANT_MAX_POLL_ATTEMPTS", 30)?,
            },
            orders: OrdersConfig {
                api_base: required("ORDERS_API_BASE")?,
                api_key: required("ORDERS_API_KEY")?,
                api_secret: required("ORDERS_API_SECRET")?,
            },
            business_utc_offset_minutes: parsed("BUSINESS_UTC_OFFSET_MINUTES", 0)?,
            pending_appointment_ttl_hours: in_range(
                "PENDING_APPOINTMENT_TTL_HOURS",
                parsed("PENDING_APPOINTMENT_TTL_HOURS", 12)?,
                1..=MAX_PENDING_TTL_HOURS,
            )?,
        })
    }

    /// Makes `config` the instance handed out by the DI container.
    pub fn install(config: AppConfig) {
        match ACTIVE_CONFIG.write() {
            Ok(mut guard) => *guard = Some(config),
            Err(poisoned) => *poisoned.into_inner() = Some(config),
        }
    }

    pub fn clear() {
        match ACTIVE_CONFIG.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn in_range<T>(name: &'static str, value: T, range: RangeInclusive<T>) -> Result<T, ConfigError>
where
    T: PartialOrd + ToString,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        })
    }
}
