use common::error::{AppError, Res};
use sqlx::{PgPool, Postgres, Transaction};

use super::{Migration, SchemaSnapshot, all};

const HISTORY_TABLE: &str = "__schema_migrations";

/// Serializes concurrent migrators on the same database.
const MIGRATION_LOCK_KEY: i64 = 0x5354_4f52_4546_524f;

/// Applies and reverts migrations against PostgreSQL, one transaction each.
pub struct Migrator {
    migrations: Vec<Box<dyn Migration>>,
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new(all())
    }
}

impl Migrator {
    pub fn new(migrations: Vec<Box<dyn Migration>>) -> Self {
        Migrator { migrations }
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.migrations.iter().map(|m| m.id()).collect()
    }

    /// Replays the plan on an empty snapshot, checking that every `down`
    /// restores the schema its `up` started from. Returns the final schema.
    pub fn validate(&self) -> Res<SchemaSnapshot> {
        let mut ids = self.ids();
        ids.sort_unstable();
        if ids != self.ids() {
            return Err(AppError::Migration(
                "migrations are not in identifier order".to_string(),
            ));
        }
        if ids.windows(2).any(|w| w[0] == w[1]) {
            return Err(AppError::Migration("duplicate migration id".to_string()));
        }

        let mut snapshot = SchemaSnapshot::new();
        for migration in &self.migrations {
            let before = snapshot.clone();
            snapshot
                .apply_all(&migration.up_operations())
                .map_err(|e| in_migration(migration.id(), "up", e))?;

            let mut reverted = snapshot.clone();
            reverted
                .apply_all(&migration.down_operations())
                .map_err(|e| in_migration(migration.id(), "down", e))?;
            if reverted != before {
                return Err(AppError::Migration(format!(
                    "{}: down does not restore the schema",
                    migration.id()
                )));
            }
        }
        Ok(snapshot)
    }

    /// Ids recorded in the history table, oldest first.
    pub async fn applied(&self, pool: &PgPool) -> Res<Vec<String>> {
        ensure_history_table(pool).await?;
        let ids = sqlx::query_scalar::<_, String>(&format!(
            "SELECT id FROM {} ORDER BY id",
            HISTORY_TABLE
        ))
        .fetch_all(pool)
        .await?;
        Ok(ids)
    }

    /// Applies every migration not yet recorded. Returns the ids applied.
    pub async fn apply_pending(&self, pool: &PgPool) -> Res<Vec<&'static str>> {
        self.validate()?;
        let applied = self.applied(pool).await?;

        let mut done = Vec::new();
        for migration in &self.migrations {
            if applied.iter().any(|id| id == migration.id()) {
                continue;
            }
            self.apply(pool, migration.id()).await?;
            done.push(migration.id());
        }

        if done.is_empty() {
            log::info!("Database schema is up to date");
        }
        Ok(done)
    }

    /// Applies one migration. Fails if it has already been applied.
    pub async fn apply(&self, pool: &PgPool, id: &str) -> Res<()> {
        let migration = self.find(id)?;
        ensure_history_table(pool).await?;

        let mut tx = pool.begin().await?;
        lock(&mut tx).await?;

        if is_recorded(&mut tx, id).await? {
            return Err(AppError::Migration(format!("{} is already applied", id)));
        }

        for operation in migration.up_operations() {
            let sql = operation.to_sql();
            log::debug!("{}: {}", id, sql);
            sqlx::query(&sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Migration(format!("{}: {} failed: {}", id, sql, e)))?;
        }

        sqlx::query(&format!("INSERT INTO {} (id) VALUES ($1)", HISTORY_TABLE))
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        log::info!("Applied migration {}", id);
        Ok(())
    }

    /// Reverts the most recently applied migration, which must be `id`.
    pub async fn revert(&self, pool: &PgPool, id: &str) -> Res<()> {
        let migration = self.find(id)?;
        ensure_history_table(pool).await?;

        let mut tx = pool.begin().await?;
        lock(&mut tx).await?;

        let latest: Option<String> = sqlx::query_scalar(&format!(
            "SELECT id FROM {} ORDER BY id DESC LIMIT 1",
            HISTORY_TABLE
        ))
        .fetch_optional(&mut *tx)
        .await?;

        if latest.as_deref() != Some(id) {
            return Err(AppError::Migration(format!(
                "{} is not the latest applied migration",
                id
            )));
        }

        for operation in migration.down_operations() {
            let sql = operation.to_sql();
            log::debug!("{} (down): {}", id, sql);
            sqlx::query(&sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Migration(format!("{}: {} failed: {}", id, sql, e)))?;
        }

        sqlx::query(&format!("DELETE FROM {} WHERE id = $1", HISTORY_TABLE))
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        log::info!("Reverted migration {}", id);
        Ok(())
    }

    fn find(&self, id: &str) -> Res<&dyn Migration> {
        self.migrations
            .iter()
            .find(|m| m.id() == id)
            .map(|m| m.as_ref())
            .ok_or_else(|| AppError::Migration(format!("unknown migration {}", id)))
    }
}

async fn ensure_history_table(pool: &PgPool) -> Res<()> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, applied_at TIMESTAMPTZ NOT NULL DEFAULT now())",
        HISTORY_TABLE
    ))
    .execute(pool)
    .await?;
    Ok(())
}

async fn lock(tx: &mut Transaction<'_, Postgres>) -> Res<()> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn is_recorded(tx: &mut Transaction<'_, Postgres>, id: &str) -> Res<bool> {
    let exists: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
        HISTORY_TABLE
    ))
    .bind(id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(exists)
}

fn in_migration(id: &str, direction: &str, err: AppError) -> AppError {
    AppError::Migration(format!("{} ({}): {}", id, direction, err))
}
