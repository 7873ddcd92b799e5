use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub default_prefix: String,
    pub log_webhook_url: Option<String>,

    // Nodo Lavalink
    pub lavalink_host: String,
    pub lavalink_port: u16,
    pub lavalink_password: String,

    // Base de datos
    pub database_url: String,

    // Desarrollo
    pub dev_mode: bool,
    pub env_file: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            default_prefix: std::env::var("BOT_PREFIX").unwrap_or_else(|_| "!".to_string()),
            log_webhook_url: std::env::var("LOG_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.is_empty()),

            // Nodo Lavalink
            lavalink_host: std::env::var("LAVALINK_HOST")
                .unwrap_or_else(|_| "localhost".to_string()),
            lavalink_port: std::env::var("LAVALINK_PORT")
                .unwrap_or_else(|_| "2333".to_string())
                .parse()?,
            lavalink_password: std::env::var("LAVALINK_PASSWORD")
                .unwrap_or_else(|_| "youshallnotpass".to_string()),

            // Base de datos
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/ritmo.db".to_string()),

            // Desarrollo
            dev_mode: std::env::var("DEV_MODE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,
            env_file: std::env::var("ENV_FILE")
                .unwrap_or_else(|_| ".env".to_string())
                .into(),
        };

        // El fichero SQLite necesita su directorio antes de abrirse
        if let Some(path) = config.database_url.strip_prefix("sqlite://") {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Comprobaciones de sanidad sobre los valores cargados
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.is_empty() {
            anyhow::bail!("DISCORD_TOKEN no puede estar vacío");
        }

        if self.default_prefix.is_empty() || self.default_prefix.len() > 10 {
            anyhow::bail!(
                "El prefijo debe tener entre 1 y 10 caracteres, tiene: {}",
                self.default_prefix.len()
            );
        }

        if self.lavalink_port == 0 {
            anyhow::bail!("LAVALINK_PORT no puede ser 0");
        }

        if let Some(url) = &self.log_webhook_url {
            if url::Url::parse(url).is_err() {
                anyhow::bail!("LOG_WEBHOOK_URL no es una URL válida: {}", url);
            }
        }

        Ok(())
    }

    /// Resumen sin secretos para el arranque
    pub fn summary(&self) -> String {
        format!(
            "Config:\n  \
            Prefijo por defecto: {}\n  \
            Nodo: {}:{}\n  \
            Base de datos: {}\n  \
            Webhook de logs: {}\n  \
            Modo desarrollo: {}",
            self.default_prefix,
            self.lavalink_host,
            self.lavalink_port,
            self.database_url,
            if self.log_webhook_url.is_some() { "sí" } else { "no" },
            self.dev_mode,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            discord_token: "token".to_string(),
            default_prefix: "!".to_string(),
            log_webhook_url: None,
            lavalink_host: "localhost".to_string(),
            lavalink_port: 2333,
            lavalink_password: "pass".to_string(),
            database_url: "sqlite::memory:".to_string(),
            dev_mode: false,
            env_file: ".env".into(),
        }
    }

    #[test]
    fn base_config_is_valid() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_oversized_prefix() {
        let mut config = base_config();
        config.default_prefix = "$".repeat(11);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_malformed_webhook_url() {
        let mut config = base_config();
        config.log_webhook_url = Some("no-es-una-url".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn summary_never_leaks_the_token() {
        let config = base_config();
        assert!(!config.summary().contains("token"));
    }
}
