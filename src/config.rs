use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub offer_validity_days: u32,
    pub max_offer_days: u32,
    pub expiry_sweep_cron: String,
    pub expiry_sweep_batch: i64,
    pub integration_rps: u32,
    pub public_rps: u32,
    pub log_json: bool,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let config = Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            database_max_connections: get_env_parse_or("DATABASE_MAX_CONNECTIONS", 20)?,
            offer_validity_days: get_env_parse_or("OFFER_VALIDITY_DAYS", 5)?,
            max_offer_days: get_env_parse_or("MAX_OFFER_DAYS", 30)?,
            expiry_sweep_cron: env::var("EXPIRY_SWEEP_CRON")
                .unwrap_or_else(|_| "0 * * * * *".to_string()),
            expiry_sweep_batch: get_env_parse_or("EXPIRY_SWEEP_BATCH", 200)?,
            integration_rps: get_env_parse_or("INTEGRATION_RPS", 50)?,
            public_rps: get_env_parse_or("PUBLIC_RPS", 50)?,
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        };

        if config.offer_validity_days == 0 || config.offer_validity_days > config.max_offer_days {
            return Err(Error::Config(format!(
                "OFFER_VALIDITY_DAYS must be between 1 and MAX_OFFER_DAYS ({})",
                config.max_offer_days
            )));
        }
        Ok(config)
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<&'static Config> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    get_config()
}

pub fn get_config() -> Result<&'static Config> {
    CONFIG
        .get()
        .ok_or_else(|| Error::Config("Configuration has not been initialized".to_string()))
}
