use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub db_name: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("ENROLLMENT_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("ENROLLMENT_SERVICE_PORT")
            .unwrap_or_else(|_| "3006".to_string())
            .parse()?;

        let db_url =
            env::var("ENROLLMENT_DATABASE_URL").context("ENROLLMENT_DATABASE_URL must be set")?;
        let db_name =
            env::var("ENROLLMENT_DATABASE_NAME").unwrap_or_else(|_| "enrollment_db".to_string());

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                db_name,
            },
            service_name: "enrollment-service".to_string(),
        })
    }
}
