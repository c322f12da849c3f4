use std::env;

use chrono_tz::Tz;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub schedule: ScheduleConfig,
    pub calendar: CalendarConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS.
    pub frontend_url: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// Shared secret used to verify viewer bearer tokens issued by the identity provider.
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// The single zone every stored date and wall-clock time is interpreted in.
    pub time_zone: Tz,
    /// Length of a session whose end time was never filled in.
    pub default_session_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    /// Timeout applied to each calendar source fetch independently.
    pub source_timeout_ms: u64,
    /// How long a viewer's merged calendar snapshot is kept around.
    pub snapshot_ttl_seconds: u64,
    /// How often the snapshot sweeper runs.
    pub sweep_interval_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
                request_timeout_seconds: env::var("REQUEST_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30u64),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/app.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
            },
            schedule: ScheduleConfig {
                time_zone: env::var("SCHEDULE_TIME_ZONE")
                    .unwrap_or_else(|_| "UTC".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("SCHEDULE_TIME_ZONE".to_string()))?,
                default_session_minutes: match env::var("SCHEDULE_DEFAULT_SESSION_MINUTES") {
                    Ok(v) => match v.parse::<i64>() {
                        Ok(minutes) if minutes > 0 => minutes,
                        _ => {
                            return Err(ConfigError::InvalidValue(
                                "SCHEDULE_DEFAULT_SESSION_MINUTES".to_string(),
                            ))
                        }
                    },
                    Err(_) => 120,
                },
            },
            calendar: CalendarConfig {
                source_timeout_ms: env::var("CALENDAR_SOURCE_TIMEOUT_MS")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .unwrap_or(5000u64),
                snapshot_ttl_seconds: env::var("CALENDAR_SNAPSHOT_TTL_SECONDS")
                    .unwrap_or_else(|_| "900".to_string())
                    .parse()
                    .unwrap_or(900u64),
                sweep_interval_seconds: env::var("CALENDAR_SWEEP_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300u64),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
                request_timeout_seconds: 30,
            },
            database: DatabaseConfig {
                url: "sqlite://data/app.db".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: String::new(),
            },
            schedule: ScheduleConfig {
                time_zone: Tz::UTC,
                default_session_minutes: 120,
            },
            calendar: CalendarConfig {
                source_timeout_ms: 5000,
                snapshot_ttl_seconds: 900,
                sweep_interval_seconds: 300,
            },
        }
    }
}
