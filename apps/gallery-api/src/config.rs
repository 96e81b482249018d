//! Configuration for the Gallery API

use core_config::{app_info, server::ServerConfig, AppInfo, FromEnv};
use domain_images::{QdrantConfig, SqliteConfig, StorageConfig};
use domain_inference::{ClipSettings, DiffusionSettings};

pub use core_config::Environment;

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub environment: Environment,
    pub server: ServerConfig,
    pub sqlite: SqliteConfig,
    pub qdrant: QdrantConfig,
    pub storage: StorageConfig,
    pub diffusion: DiffusionSettings,
    pub clip: ClipSettings,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let server = ServerConfig::from_env()?;

        Ok(Self {
            app: app_info!(),
            environment,
            server,
            sqlite: SqliteConfig::from_env(),
            qdrant: QdrantConfig::from_env(),
            storage: StorageConfig::from_env(),
            diffusion: DiffusionSettings::from_env(),
            clip: ClipSettings::from_env(),
        })
    }
}
