use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub weather_api_key: Option<String>,
    pub openweather_base_url: String,
    pub openweather_current_path: String,
    pub openweather_forecast_path: String,
    pub advisory_api_key: Option<String>,
    pub advisory_base_url: String,
    pub advisory_model: String,
    pub chatbot_app_id: Option<String>,
    pub default_location: String,
    pub app_timezone: chrono_tz::Tz,
    pub weather_timeout: Duration,
    pub advisory_timeout: Duration,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Blank values
    /// count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let app_timezone = or_default("APP_TIMEZONE", "Asia/Kolkata");
        let app_timezone = app_timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| ConfigError::Invalid {
                key: "APP_TIMEZONE",
                reason: format!("unknown timezone '{}'", app_timezone),
            })?;

        Ok(Config {
            database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            weather_api_key: get("WEATHER_API_KEY"),
            openweather_base_url: or_default("OPENWEATHER_BASE_URL", "https://api.openweathermap.org"),
            openweather_current_path: or_default("OPENWEATHER_CURRENT_PATH", "/data/2.5/weather"),
            openweather_forecast_path: or_default("OPENWEATHER_FORECAST_PATH", "/data/2.5/forecast"),
            advisory_api_key: get("ADVISORY_API_KEY"),
            advisory_base_url: or_default(
                "ADVISORY_BASE_URL",
                "https://openrouter.ai/api/v1/chat/completions",
            ),
            advisory_model: or_default("ADVISORY_MODEL", "google/gemini-2.0-flash-001"),
            chatbot_app_id: get("CHATBOT_APP_ID"),
            default_location: or_default("DEFAULT_LOCATION", "New Delhi"),
            app_timezone,
            weather_timeout: parse_secs(get("WEATHER_TIMEOUT_SECS"), "WEATHER_TIMEOUT_SECS", 15)?,
            advisory_timeout: parse_secs(get("ADVISORY_TIMEOUT_SECS"), "ADVISORY_TIMEOUT_SECS", 60)?,
            bind_addr: or_default("BIND_ADDR", "0.0.0.0:8080"),
        })
    }
}

fn parse_secs(
    value: Option<String>,
    key: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let secs = match value {
        Some(raw) => raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })?,
        None => default,
    };

    if secs == 0 {
        return Err(ConfigError::Invalid {
            key,
            reason: "timeout must be at least one second".to_string(),
        });
    }

    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
impl Config {
    /// Configuration pointing both HTTP backends at `base_url`.
    pub fn for_tests(base_url: &str) -> Self {
        let base_url = base_url.to_string();
        Self::from_lookup(move |key| match key {
            "DATABASE_URL" => Some("sqlite::memory:".to_string()),
            "WEATHER_API_KEY" => Some("test-weather-key".to_string()),
            "ADVISORY_API_KEY" => Some("test-advisory-key".to_string()),
            "OPENWEATHER_BASE_URL" => Some(base_url.clone()),
            "ADVISORY_BASE_URL" => Some(format!("{}/chat/completions", base_url)),
            "WEATHER_TIMEOUT_SECS" => Some("5".to_string()),
            "ADVISORY_TIMEOUT_SECS" => Some("5".to_string()),
            _ => None,
        })
        .unwrap()
    }
}
