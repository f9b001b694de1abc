use crate::domain::Decimal;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub cpay_api_url: String,
    /// A machine's earnings ceiling is `investment * this` at purchase time.
    pub earnings_cap_multiplier: Decimal,
    /// Referrer's share of a referee's purchase, in percent.
    pub referral_bonus_percent: Decimal,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let cpay_api_url = env_map
            .get("CPAY_API_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("CPAY_API_URL".to_string()))?;

        let earnings_cap_multiplier = env_map
            .get("EARNINGS_CAP_MULTIPLIER")
            .map(|s| s.as_str())
            .unwrap_or("2")
            .parse::<Decimal>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "EARNINGS_CAP_MULTIPLIER".to_string(),
                    "must be a valid decimal".to_string(),
                )
            })?;
        if earnings_cap_multiplier < Decimal::from_i64(1) {
            return Err(ConfigError::InvalidValue(
                "EARNINGS_CAP_MULTIPLIER".to_string(),
                "must be >= 1".to_string(),
            ));
        }

        let referral_bonus_percent = env_map
            .get("REFERRAL_BONUS_PERCENT")
            .map(|s| s.as_str())
            .unwrap_or("5")
            .parse::<Decimal>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "REFERRAL_BONUS_PERCENT".to_string(),
                    "must be a valid decimal".to_string(),
                )
            })?;
        if referral_bonus_percent.is_negative() || referral_bonus_percent > Decimal::hundred() {
            return Err(ConfigError::InvalidValue(
                "REFERRAL_BONUS_PERCENT".to_string(),
                "must be between 0 and 100".to_string(),
            ));
        }

        Ok(Config {
            port,
            database_path,
            cpay_api_url,
            earnings_cap_multiplier,
            referral_bonus_percent,
        })
    }
}
