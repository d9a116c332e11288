//! Collection registry stored in SQLite.

use super::{create_pool, run_migrations, Pool};
use crate::error::registry_error;
use jsync_engine::error::Result;
use jsync_engine::{CollectionInfo, CollectionRegistry, Error, ServiceId, ServiceType};
use sqlx::Row;
use std::future::Future;
use tokio::runtime::{Builder, Runtime};

/// A stored collection row from the database.
#[derive(Debug)]
pub struct StoredCollection {
    pub url: String,
    pub service_type: String,
    pub display_name: String,
    pub description: Option<String>,
    pub color: Option<i32>,
    pub read_only: bool,
    pub selected: bool,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for StoredCollection {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(StoredCollection {
            url: row.try_get("url")?,
            service_type: row.try_get("service_type")?,
            display_name: row.try_get("display_name")?,
            description: row.try_get("description")?,
            color: row.try_get("color")?,
            read_only: row.try_get("read_only")?,
            selected: row.try_get("selected")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredCollection {
    /// Convert database row to a collection.
    pub fn to_collection(&self) -> Result<CollectionInfo> {
        let service_type = ServiceType::parse(&self.service_type).ok_or_else(|| {
            Error::Registry(format!("unknown service type: {}", self.service_type))
        })?;

        Ok(CollectionInfo {
            url: self.url.clone(),
            service_type,
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            color: self.color,
            read_only: self.read_only,
            selected: self.selected,
        })
    }
}

/// Registry backed by a SQLite database.
///
/// The sync thread is blocking, so the registry owns a small runtime and
/// drives every query to completion on it. It must not be used from inside
/// another async runtime.
pub struct SqliteRegistry {
    pool: Pool,
    runtime: Runtime,
}

impl SqliteRegistry {
    /// Open the database and run pending migrations.
    pub fn open(database_url: &str) -> crate::error::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;

        let pool = runtime.block_on(create_pool(database_url))?;

        tracing::info!("Running database migrations...");
        runtime.block_on(run_migrations(&pool))?;

        Ok(Self { pool, runtime })
    }

    fn run<F, T>(&self, query: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        self.runtime.block_on(query).map_err(registry_error)
    }
}

impl Drop for SqliteRegistry {
    fn drop(&mut self) {
        self.runtime.block_on(self.pool.close());
    }
}

impl CollectionRegistry for SqliteRegistry {
    fn service_id(&mut self, account: &str, service_type: ServiceType) -> Result<ServiceId> {
        let pool = &self.pool;
        self.run(async move {
            sqlx::query("INSERT OR IGNORE INTO services (account, service_type) VALUES (?, ?)")
                .bind(account)
                .bind(service_type.as_str())
                .execute(pool)
                .await?;

            let row: (i64,) =
                sqlx::query_as("SELECT id FROM services WHERE account = ? AND service_type = ?")
                    .bind(account)
                    .bind(service_type.as_str())
                    .fetch_one(pool)
                    .await?;
            Ok::<_, sqlx::Error>(row.0)
        })
    }

    fn replace_collections(
        &mut self,
        service: ServiceId,
        collections: &[CollectionInfo],
    ) -> Result<()> {
        let pool = &self.pool;
        let known = self.run(async move {
            sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM services WHERE id = ?")
                .bind(service)
                .fetch_one(pool)
                .await
        })?;
        if known.0 == 0 {
            return Err(Error::Registry(format!("unknown service #{}", service)));
        }

        let now = chrono::Utc::now();
        self.run(async move {
            // Dropped without commit on error, which rolls back
            let mut tx = pool.begin().await?;

            sqlx::query("DELETE FROM collections WHERE service_id = ?")
                .bind(service)
                .execute(&mut *tx)
                .await?;

            for collection in collections {
                tracing::debug!(url = %collection.url, service, "Saving collection");
                sqlx::query(
                    r#"
                    INSERT INTO collections (
                        service_id, url, service_type, display_name, description,
                        color, read_only, selected, updated_at
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(service)
                .bind(&collection.url)
                .bind(collection.service_type.as_str())
                .bind(&collection.display_name)
                .bind(&collection.description)
                .bind(collection.color)
                .bind(collection.read_only)
                .bind(collection.selected)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await
        })
    }

    fn list_collections(&self, service: ServiceId) -> Result<Vec<CollectionInfo>> {
        let pool = &self.pool;
        let rows: Vec<StoredCollection> = self.run(async move {
            sqlx::query_as(
                r#"
                SELECT url, service_type, display_name, description,
                       color, read_only, selected, updated_at
                FROM collections
                WHERE service_id = ?
                ORDER BY url ASC
                "#,
            )
            .bind(service)
            .fetch_all(pool)
            .await
        })?;

        rows.iter()
            .map(|row| {
                tracing::debug!(url = %row.url, updated_at = %row.updated_at, "Loaded collection");
                row.to_collection()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_stamps_rows() {
        let mut registry = SqliteRegistry::open("sqlite::memory:").unwrap();
        let service = registry.service_id("alice", ServiceType::Tasks).unwrap();
        let before = chrono::Utc::now() - chrono::Duration::seconds(1);

        let chores = CollectionInfo::new(ServiceType::Tasks, "Chores").with_url("t-1");
        registry.replace_collections(service, &[chores]).unwrap();

        let pool = &registry.pool;
        let rows: Vec<StoredCollection> = registry
            .run(async move {
                sqlx::query_as(
                    r#"
                    SELECT url, service_type, display_name, description,
                           color, read_only, selected, updated_at
                    FROM collections
                    "#,
                )
                .fetch_all(pool)
                .await
            })
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert!(rows[0].updated_at >= before);
        assert!(rows[0].updated_at <= chrono::Utc::now());
        assert_eq!(rows[0].to_collection().unwrap().display_name, "Chores");
    }
}
