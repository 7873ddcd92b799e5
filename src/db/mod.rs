use anyhow::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    FromRow,
};
use std::str::FromStr;
use tracing::info;

/// Configuración por servidor almacenada en SQLite
#[derive(Debug, Clone, FromRow)]
pub struct GuildSettings {
    pub id: i64,
    pub prefix: String,
    pub updated_at: DateTime<Utc>,
}

/// Migraciones embebidas; se aplican en cada arranque
const MIGRATIONS: &[&str] = &[include_str!("../../migrations/0001_create_guilds.sql")];

/// Almacén de configuraciones con caché de lectura
///
/// El prefijo se consulta en cada mensaje, así que las filas ya vistas
/// se sirven desde el DashMap y la base solo se toca al crear o
/// escribir.
pub struct SettingsStore {
    pool: SqlitePool,
    cache: DashMap<u64, GuildSettings>,
}

impl SettingsStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // SQLite con un solo escritor; una conexión basta para este uso
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::run_migrations(&pool).await?;
        info!("🗄️ Base de datos lista ({})", database_url);

        Ok(Self {
            pool,
            cache: DashMap::new(),
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        for migration in MIGRATIONS {
            sqlx::query(migration).execute(pool).await?;
        }
        Ok(())
    }

    /// Devuelve la configuración del servidor, creándola si no existe
    pub async fn guild(&self, guild_id: u64, default_prefix: &str) -> Result<GuildSettings> {
        if let Some(settings) = self.cache.get(&guild_id) {
            return Ok(settings.clone());
        }

        let id = guild_id as i64;
        sqlx::query(
            "INSERT INTO guilds (id, prefix, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(id)
        .bind(default_prefix)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let settings: GuildSettings =
            sqlx::query_as("SELECT id, prefix, updated_at FROM guilds WHERE id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        self.cache.insert(guild_id, settings.clone());
        Ok(settings)
    }

    /// Cambia el prefijo del servidor y refresca la caché
    pub async fn set_prefix(&self, guild_id: u64, prefix: &str) -> Result<GuildSettings> {
        let id = guild_id as i64;
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO guilds (id, prefix, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET prefix = excluded.prefix, \
             updated_at = excluded.updated_at",
        )
        .bind(id)
        .bind(prefix)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let settings = GuildSettings {
            id,
            prefix: prefix.to_string(),
            updated_at: now,
        };
        self.cache.insert(guild_id, settings.clone());
        info!("💾 Prefijo de guild {} actualizado a `{}`", guild_id, prefix);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn store() -> SettingsStore {
        SettingsStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn creates_guild_with_default_prefix() {
        let store = store().await;
        let settings = store.guild(42, "!").await.unwrap();
        assert_eq!(settings.id, 42);
        assert_eq!(settings.prefix, "!");
    }

    #[tokio::test]
    async fn get_or_create_is_stable_across_calls() {
        let store = store().await;
        store.guild(42, "!").await.unwrap();
        let again = store.guild(42, "?").await.unwrap();
        assert_eq!(again.prefix, "!");
    }

    #[tokio::test]
    async fn set_prefix_round_trips() {
        let store = store().await;
        store.guild(42, "!").await.unwrap();
        store.set_prefix(42, "$").await.unwrap();

        let settings = store.guild(42, "!").await.unwrap();
        assert_eq!(settings.prefix, "$");
    }

    #[tokio::test]
    async fn set_prefix_works_for_unseen_guilds() {
        let store = store().await;
        store.set_prefix(7, "%").await.unwrap();
        assert_eq!(store.guild(7, "!").await.unwrap().prefix, "%");
    }
}
