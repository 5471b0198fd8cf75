//! Process-wide configuration, loaded once at startup from environment
//! variables. No config file or builder — the whole surface is a flat set
//! of `NOEMA_*` variables with sane defaults for local development.

use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub vec_db_path: String,
    pub embedding_dim: usize,
    pub embedder_model: String,
    pub generator_model: String,
    pub ingest_lock_timeout: Duration,
    pub max_hops: usize,
    pub similarity_top_k: usize,
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "./noema.db".to_string(),
            vec_db_path: "./noema.db".to_string(),
            embedding_dim: 1536,
            embedder_model: "mock".to_string(),
            generator_model: "mock".to_string(),
            ingest_lock_timeout: Duration::from_secs(60),
            max_hops: 2,
            similarity_top_k: 5,
            bind_addr: "127.0.0.1:8420".to_string(),
        }
    }
}

impl Config {
    /// Load from the process environment, falling back to defaults for any
    /// unset variable. `NOEMA_VEC_DB_PATH` defaults to `NOEMA_DB_PATH`'s
    /// resolved value when absent.
    pub fn from_env() -> ConfigResult<Self> {
        let defaults = Config::default();

        let db_path = env::var("NOEMA_DB_PATH").unwrap_or(defaults.db_path);
        let vec_db_path = env::var("NOEMA_VEC_DB_PATH").unwrap_or_else(|_| db_path.clone());
        let embedding_dim = parse_env("NOEMA_EMBEDDING_DIM", defaults.embedding_dim)?;
        let embedder_model = env::var("NOEMA_EMBEDDER_MODEL").unwrap_or(defaults.embedder_model);
        let generator_model =
            env::var("NOEMA_GENERATOR_MODEL").unwrap_or(defaults.generator_model);
        let ingest_lock_timeout_secs: u64 = parse_env(
            "NOEMA_INGEST_LOCK_TIMEOUT_SECS",
            defaults.ingest_lock_timeout.as_secs(),
        )?;
        let max_hops = parse_env("NOEMA_MAX_HOPS", defaults.max_hops)?;
        let similarity_top_k = parse_env("NOEMA_SIMILARITY_TOP_K", defaults.similarity_top_k)?;
        let bind_addr = env::var("NOEMA_BIND_ADDR").unwrap_or(defaults.bind_addr);

        Ok(Config {
            db_path,
            vec_db_path,
            embedding_dim,
            embedder_model,
            generator_model,
            ingest_lock_timeout: Duration::from_secs(ingest_lock_timeout_secs),
            max_hops,
            similarity_top_k,
            bind_addr,
        })
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, default: T) -> ConfigResult<T> {
    match env::var(var) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.embedding_dim, 1536);
        assert_eq!(config.max_hops, 2);
        assert_eq!(config.similarity_top_k, 5);
        assert_eq!(config.ingest_lock_timeout, Duration::from_secs(60));
    }

    #[test]
    fn vec_db_path_defaults_to_db_path_when_unset() {
        // Relies on this process not having NOEMA_VEC_DB_PATH / NOEMA_DB_PATH
        // set, which holds in a clean test environment.
        if env::var("NOEMA_DB_PATH").is_err() && env::var("NOEMA_VEC_DB_PATH").is_err() {
            let config = Config::from_env().unwrap();
            assert_eq!(config.vec_db_path, config.db_path);
        }
    }
}
