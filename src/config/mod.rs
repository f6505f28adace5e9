use anyhow::Context;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub avatars: AvatarConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct AvatarConfig {
    /// Directory avatar objects are written to.
    pub root: PathBuf,
    /// Base URL the fronting web tier serves that directory under.
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Endpoint of the knowledge-base processing pipeline.
    pub kb_processing_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("SERVER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let avatar_root = std::env::var("AVATAR_DIR")
            .unwrap_or_else(|_| "./leadserver-stack/avatars".to_string());
        let avatar_base_url = std::env::var("AVATAR_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{host}:{port}/avatars"));

        let kb_processing_url = std::env::var("KB_WEBHOOK_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5678/webhook/knowledge-base".to_string());

        Ok(AppConfig {
            server: ServerConfig { host, port },
            database: DatabaseConfig { url: database_url },
            avatars: AvatarConfig {
                root: PathBuf::from(avatar_root),
                public_base_url: avatar_base_url,
            },
            webhook: WebhookConfig { kb_processing_url },
        })
    }
}
