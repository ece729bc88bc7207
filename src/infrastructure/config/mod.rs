//! Runtime settings.
//!
//! Layered with `figment`: built-in defaults, then `casevault.toml` (or the
//! file named by `CASEVAULT_CONFIG`), then `CASEVAULT_*` environment
//! variables with `__` separating nested keys, e.g.
//! `CASEVAULT_HTTP__PORT=9000`.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::error::{AppError, Result};
use crate::domain::staging::DEFAULT_STAGING_TTL_SECONDS;
use crate::domain::vector_record::{IndexConfig, IndexType, MetricType, DEFAULT_VECTOR_DIM};
use crate::infrastructure::embedders::DEFAULT_MODEL;

pub const CONFIG_PATH_ENV: &str = "CASEVAULT_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "casevault.toml";
pub const ENV_PREFIX: &str = "CASEVAULT_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Settings {
    pub app_env: String,
    pub data_dir: PathBuf,
    #[validate(nested)]
    pub http: HttpSettings,
    #[validate(nested)]
    pub staging: StagingSettings,
    #[validate(nested)]
    pub vector_index: VectorIndexSettings,
    #[validate(nested)]
    pub embedding: EmbeddingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct HttpSettings {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct StagingSettings {
    pub db_file: String,
    #[validate(range(min = 1))]
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct VectorIndexSettings {
    pub db_file: String,
    #[validate(range(min = 1, max = 32768))]
    pub default_dim: usize,
    pub metric: MetricType,
    pub index_type: IndexType,
    #[validate(range(min = 1, max = 65536))]
    pub nlist: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Fastembed,
    Hash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    #[validate(length(min = 1))]
    pub model: String,
    #[validate(range(min = 1))]
    pub batch_size: usize,
    #[validate(range(min = 1))]
    pub max_length: usize,
    pub cache_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_env: "development".to_string(),
            data_dir: PathBuf::from("data"),
            http: HttpSettings {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            staging: StagingSettings {
                db_file: "staging.db".to_string(),
                ttl_seconds: DEFAULT_STAGING_TTL_SECONDS,
            },
            vector_index: VectorIndexSettings {
                db_file: "vectors.db".to_string(),
                default_dim: DEFAULT_VECTOR_DIM,
                metric: MetricType::Cosine,
                index_type: IndexType::IvfFlat,
                nlist: 128,
            },
            embedding: EmbeddingSettings {
                provider: EmbeddingProvider::Fastembed,
                model: DEFAULT_MODEL.to_string(),
                batch_size: 32,
                max_length: 512,
                cache_dir: None,
            },
        }
    }
}

impl Settings {
    /// Loads settings from the config file named by `CASEVAULT_CONFIG`
    /// (default `casevault.toml`, optional) and the environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(config_file: &Path) -> Result<Self> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| AppError::ConfigError(format!("Failed to load settings: {}", e)))?;

        settings
            .validate()
            .map_err(|e| AppError::ConfigError(format!("Invalid settings: {}", e)))?;
        Ok(settings)
    }

    pub fn staging_db_path(&self) -> PathBuf {
        self.data_dir.join(&self.staging.db_file)
    }

    pub fn vector_db_path(&self) -> PathBuf {
        self.data_dir.join(&self.vector_index.db_file)
    }

    /// Index configuration recorded on collections created by this process.
    pub fn index_config(&self) -> IndexConfig {
        IndexConfig {
            metric: self.vector_index.metric,
            index_type: self.vector_index.index_type,
            params: serde_json::json!({ "nlist": self.vector_index.nlist }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_without_file_or_env() {
        Jail::expect_with(|_jail| {
            let settings = Settings::load_from(Path::new("missing.toml")).unwrap();
            assert_eq!(settings, Settings::default());
            assert_eq!(settings.staging_db_path(), PathBuf::from("data/staging.db"));
            assert_eq!(settings.index_config(), IndexConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "casevault.toml",
                r#"
                    data_dir = "/var/lib/casevault"

                    [http]
                    port = 9000

                    [vector_index]
                    metric = "ip"
                    index_type = "flat"

                    [embedding]
                    provider = "hash"
                "#,
            )?;
            jail.set_env("CASEVAULT_HTTP__PORT", "9100");
            jail.set_env("CASEVAULT_STAGING__TTL_SECONDS", "60");

            let settings = Settings::load().unwrap();
            assert_eq!(settings.http.port, 9100);
            assert_eq!(settings.http.host, "127.0.0.1");
            assert_eq!(settings.staging.ttl_seconds, 60);
            assert_eq!(settings.vector_index.metric, MetricType::InnerProduct);
            assert_eq!(settings.vector_index.index_type, IndexType::Flat);
            assert_eq!(settings.embedding.provider, EmbeddingProvider::Hash);
            assert_eq!(
                settings.vector_db_path(),
                PathBuf::from("/var/lib/casevault/vectors.db")
            );
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        Jail::expect_with(|jail| {
            jail.set_env("CASEVAULT_STAGING__TTL_SECONDS", "0");
            assert!(matches!(
                Settings::load_from(Path::new("casevault.toml")),
                Err(AppError::ConfigError(_))
            ));

            jail.set_env("CASEVAULT_STAGING__TTL_SECONDS", "60");
            jail.set_env("CASEVAULT_EMBEDDING__PROVIDER", "openai");
            assert!(matches!(
                Settings::load_from(Path::new("casevault.toml")),
                Err(AppError::ConfigError(_))
            ));
            Ok(())
        });
    }
}
