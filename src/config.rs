use std::env;

use crate::error::AppError;

const DEFAULT_DATABASE_URL: &str = "sqlite://schedules.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 1;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
}

impl Config {
    pub fn new_from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let max_connections = match env::var("DB_MAX_CONNECTIONS") {
            Ok(raw) => parse_max_connections(&raw)?,
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };

        Self {
            database_url,
            max_connections,
        }
        .validated()
    }

    /// Command-line values win over the environment.
    pub fn with_database_url(mut self, database_url: Option<String>) -> Result<Self, AppError> {
        if let Some(url) = database_url {
            self.database_url = url;
        }
        self.validated()
    }

    fn validated(self) -> Result<Self, AppError> {
        if !self.database_url.starts_with("sqlite:") {
            return Err(AppError::Config(format!(
                "DATABASE_URL must be a sqlite URL, got '{}'",
                self.database_url
            )));
        }
        Ok(self)
    }
}

fn parse_max_connections(raw: &str) -> Result<u32, AppError> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(AppError::Config(format!(
            "DB_MAX_CONNECTIONS must be a positive integer, got '{}'",
            raw
        ))),
    }
}
