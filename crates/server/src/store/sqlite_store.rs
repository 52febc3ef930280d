//! SQLite-backed developer store.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use radar_common::geo::BoundingBox;
use radar_common::{Developer, GeoPoint};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::DeveloperChanges;

/// An enriched registration ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDeveloper {
    pub github_username: String,
    pub name: String,
    pub avatar_url: String,
    pub bio: Option<String>,
    pub techs: Vec<String>,
    pub location: GeoPoint,
}

#[derive(sqlx::FromRow)]
struct DeveloperRow {
    id: String,
    github_username: String,
    name: String,
    avatar_url: String,
    bio: Option<String>,
    longitude: f64,
    latitude: f64,
}

/// Ids bound per tag lookup, well under SQLite's variable limit.
const HYDRATE_BATCH: usize = 500;

const SELECT_DEVELOPERS: &str = "SELECT d.id, d.github_username, d.name, d.avatar_url, d.bio, \
     d.longitude, d.latitude FROM developers d";

pub struct DevStore {
    pool: SqlitePool,
}

impl DevStore {
    /// Connect and create tables if needed.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_db().await?;

        info!("[Store] Connected to {}", database_url);
        Ok(store)
    }

    /// Open a database file directly.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        Self::connect(&format!("sqlite:{}", path.display()), 5).await
    }

    async fn init_db(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS developers (
                id TEXT PRIMARY KEY,
                github_username TEXT NOT NULL UNIQUE COLLATE NOCASE,
                name TEXT NOT NULL,
                avatar_url TEXT NOT NULL,
                bio TEXT,
                longitude REAL NOT NULL,
                latitude REAL NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_developers_location ON developers (latitude, longitude)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS developer_techs (
                developer_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                tech TEXT NOT NULL,
                PRIMARY KEY (developer_id, tech),
                FOREIGN KEY (developer_id) REFERENCES developers(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_developer_techs_tech ON developer_techs (tech)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// All developers, oldest first.
    pub async fn list(&self) -> Result<Vec<Developer>, sqlx::Error> {
        let rows: Vec<DeveloperRow> =
            sqlx::query_as(&format!("{SELECT_DEVELOPERS} ORDER BY d.rowid"))
                .fetch_all(&self.pool)
                .await?;
        self.hydrate(rows).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Developer>, sqlx::Error> {
        let row: Option<DeveloperRow> =
            sqlx::query_as(&format!("{SELECT_DEVELOPERS} WHERE d.id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(self.hydrate(row.into_iter().collect()).await?.pop())
    }

    /// Case-insensitive, like GitHub logins.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<Developer>, sqlx::Error> {
        let row: Option<DeveloperRow> =
            sqlx::query_as(&format!("{SELECT_DEVELOPERS} WHERE d.github_username = ?"))
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        Ok(self.hydrate(row.into_iter().collect()).await?.pop())
    }

    /// Insert a developer. When the username is already taken the stored
    /// record is returned instead, with `false` for "created".
    pub async fn insert_or_existing(
        &self,
        new: NewDeveloper,
    ) -> Result<(Developer, bool), sqlx::Error> {
        match self.insert(new.clone()).await {
            Ok(dev) => Ok((dev, true)),
            Err(e) if is_unique_violation(&e) => {
                debug!("[Store] {} registered concurrently", new.github_username);
                match self.find_by_username(&new.github_username).await? {
                    Some(existing) => Ok((existing, false)),
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    pub async fn insert(&self, new: NewDeveloper) -> Result<Developer, sqlx::Error> {
        let id = Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO developers (id, github_username, name, avatar_url, bio, longitude, latitude, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.github_username)
        .bind(&new.name)
        .bind(&new.avatar_url)
        .bind(&new.bio)
        .bind(new.location.longitude())
        .bind(new.location.latitude())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        insert_techs(&mut tx, &id, &new.techs).await?;
        tx.commit().await?;

        info!("[Store] Developer registered: {} ({})", new.github_username, id);

        Ok(Developer {
            id,
            github_username: new.github_username,
            name: new.name,
            avatar_url: new.avatar_url,
            bio: new.bio,
            techs: new.techs,
            location: new.location,
        })
    }

    /// Apply changes; `None` when the id is unknown.
    pub async fn update(
        &self,
        id: &str,
        changes: DeveloperChanges,
    ) -> Result<Option<Developer>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM developers WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        if let Some(location) = changes.location {
            sqlx::query("UPDATE developers SET longitude = ?, latitude = ? WHERE id = ?")
                .bind(location.longitude())
                .bind(location.latitude())
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(techs) = &changes.techs {
            sqlx::query("DELETE FROM developer_techs WHERE developer_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_techs(&mut tx, id, techs).await?;
        }

        tx.commit().await?;
        info!("[Store] Developer updated: {}", id);

        self.get(id).await
    }

    /// Remove a developer, returning what was removed.
    pub async fn delete(&self, id: &str) -> Result<Option<Developer>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let row: Option<DeveloperRow> =
            sqlx::query_as(&format!("{SELECT_DEVELOPERS} WHERE d.id = ?"))
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let techs: Vec<(String,)> = sqlx::query_as(
            "SELECT tech FROM developer_techs WHERE developer_id = ? ORDER BY position",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM developers WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let dev = row.into_developer(techs.into_iter().map(|(tech,)| tech).collect())?;
        info!("[Store] Developer removed: {} ({})", dev.github_username, id);
        Ok(Some(dev))
    }

    /// Developers within `radius_km` of `center` having any of `techs`,
    /// nearest first.
    pub async fn search_nearby(
        &self,
        center: &GeoPoint,
        radius_km: f64,
        techs: &[String],
    ) -> Result<Vec<Developer>, sqlx::Error> {
        if techs.is_empty() {
            return Ok(Vec::new());
        }

        let bbox = BoundingBox::around(center, radius_km);

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_DEVELOPERS);
        query.push(" WHERE d.latitude BETWEEN ");
        query.push_bind(bbox.min_lat);
        query.push(" AND ");
        query.push_bind(bbox.max_lat);

        query.push(" AND (");
        for (i, (min_lon, max_lon)) in bbox.lon_ranges().into_iter().enumerate() {
            if i > 0 {
                query.push(" OR ");
            }
            query.push("d.longitude BETWEEN ");
            query.push_bind(min_lon);
            query.push(" AND ");
            query.push_bind(max_lon);
        }
        query.push(")");

        query.push(
            " AND EXISTS (SELECT 1 FROM developer_techs t WHERE t.developer_id = d.id AND t.tech IN (",
        );
        let mut separated = query.separated(", ");
        for tech in techs {
            separated.push_bind(tech.clone());
        }
        separated.push_unseparated("))");

        let rows: Vec<DeveloperRow> = query.build_query_as().fetch_all(&self.pool).await?;
        let candidates = rows.len();

        let mut devs: Vec<(f64, Developer)> = self
            .hydrate(rows)
            .await?
            .into_iter()
            .map(|dev| (center.distance_km(&dev.location), dev))
            .filter(|(distance, _)| *distance <= radius_km)
            .collect();
        devs.sort_by(|a, b| a.0.total_cmp(&b.0));

        debug!(
            "[Store] search {:?} r={}km techs={:?}: {} candidates, {} hits",
            center,
            radius_km,
            techs,
            candidates,
            devs.len()
        );

        Ok(devs.into_iter().map(|(_, dev)| dev).collect())
    }

    /// Attach ordered tech lists to rows, querying ids in batches.
    async fn hydrate(&self, rows: Vec<DeveloperRow>) -> Result<Vec<Developer>, sqlx::Error> {
        let mut techs: HashMap<String, Vec<String>> = HashMap::new();

        for chunk in rows.chunks(HYDRATE_BATCH) {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT developer_id, tech FROM developer_techs WHERE developer_id IN (",
            );
            let mut separated = query.separated(", ");
            for row in chunk {
                separated.push_bind(row.id.clone());
            }
            separated.push_unseparated(") ORDER BY developer_id, position");

            let tech_rows: Vec<(String, String)> =
                query.build_query_as().fetch_all(&self.pool).await?;
            for (developer_id, tech) in tech_rows {
                techs.entry(developer_id).or_default().push(tech);
            }
        }

        rows.into_iter()
            .map(|row| {
                let dev_techs = techs.remove(&row.id).unwrap_or_default();
                row.into_developer(dev_techs)
            })
            .collect()
    }
}

impl DeveloperRow {
    fn into_developer(self, techs: Vec<String>) -> Result<Developer, sqlx::Error> {
        let location = GeoPoint::new(self.latitude, self.longitude)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Developer {
            id: self.id,
            github_username: self.github_username,
            name: self.name,
            avatar_url: self.avatar_url,
            bio: self.bio,
            techs,
            location,
        })
    }
}

async fn insert_techs(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    developer_id: &str,
    techs: &[String],
) -> Result<(), sqlx::Error> {
    for (position, tech) in techs.iter().enumerate() {
        sqlx::query(
            "INSERT OR IGNORE INTO developer_techs (developer_id, position, tech) VALUES (?, ?, ?)",
        )
        .bind(developer_id)
        .bind(position as i64)
        .bind(tech)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn dev(username: &str, techs: &[&str], lat: f64, lon: f64) -> NewDeveloper {
        NewDeveloper {
            github_username: username.to_string(),
            name: username.to_uppercase(),
            avatar_url: format!("https://avatars.example/{username}"),
            bio: Some(format!("{username} bio")),
            techs: techs.iter().map(|t| t.to_string()).collect(),
            location: GeoPoint::new(lat, lon).unwrap(),
        }
    }

    fn names(devs: &[Developer]) -> Vec<&str> {
        devs.iter().map(|d| d.github_username.as_str()).collect()
    }

    #[tokio::test]
    async fn test_insert_list_get() {
        let dir = tempdir().unwrap();
        let store = DevStore::open(&dir.path().join("radar.sqlite")).await.unwrap();

        let a = store.insert(dev("alice", &["Rust", "Go"], -23.55, -46.63)).await.unwrap();
        store.insert(dev("bob", &["Elixir"], -22.90, -43.20)).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(names(&all), vec!["alice", "bob"]);
        assert_eq!(all[0].techs, vec!["Rust", "Go"]);

        let fetched = store.get(&a.id).await.unwrap().unwrap();
        assert_eq!(fetched, a);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_username_unique_case_insensitive() {
        let dir = tempdir().unwrap();
        let store = DevStore::open(&dir.path().join("radar.sqlite")).await.unwrap();

        let (first, created) = store
            .insert_or_existing(dev("Alice", &["Rust"], 0.0, 0.0))
            .await
            .unwrap();
        assert!(created);

        let (second, created) = store
            .insert_or_existing(dev("alice", &["Go"], 1.0, 1.0))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.techs, vec!["Rust"]);
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(store.find_by_username("ALICE").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_search_radius_and_techs() {
        let dir = tempdir().unwrap();
        let store = DevStore::open(&dir.path().join("radar.sqlite")).await.unwrap();
        let center = GeoPoint::new(-23.5505, -46.6333).unwrap();

        store.insert(dev("near_rust", &["Rust"], -23.5614, -46.6559)).await.unwrap();
        store.insert(dev("nearest_go", &["Go", "Rust"], -23.5510, -46.6340)).await.unwrap();
        store.insert(dev("near_java", &["Java"], -23.5520, -46.6350)).await.unwrap();
        // Campinas, ~85 km away.
        store.insert(dev("far_rust", &["Rust"], -22.9099, -47.0626)).await.unwrap();

        let hits = store
            .search_nearby(&center, 10.0, &["Rust".to_string()])
            .await
            .unwrap();
        assert_eq!(names(&hits), vec!["nearest_go", "near_rust"]);

        let hits = store
            .search_nearby(&center, 10.0, &["Java".to_string(), "Go".to_string()])
            .await
            .unwrap();
        assert_eq!(names(&hits), vec!["nearest_go", "near_java"]);

        let hits = store.search_nearby(&center, 100.0, &["Rust".to_string()]).await.unwrap();
        assert_eq!(hits.len(), 3);

        assert!(store.search_nearby(&center, 10.0, &[]).await.unwrap().is_empty());
        assert!(store
            .search_nearby(&center, 10.0, &["rust".to_string()])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_search_across_antimeridian() {
        let dir = tempdir().unwrap();
        let store = DevStore::open(&dir.path().join("radar.sqlite")).await.unwrap();

        store.insert(dev("fiji_east", &["Rust"], -17.0, -179.99)).await.unwrap();
        let center = GeoPoint::new(-17.0, 179.99).unwrap();
        let hits = store.search_nearby(&center, 10.0, &["Rust".to_string()]).await.unwrap();
        assert_eq!(names(&hits), vec!["fiji_east"]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let dir = tempdir().unwrap();
        let store = DevStore::open(&dir.path().join("radar.sqlite")).await.unwrap();
        let a = store.insert(dev("alice", &["Rust"], 0.0, 0.0)).await.unwrap();

        let changes = DeveloperChanges {
            techs: Some(vec!["Zig".to_string(), "C".to_string()]),
            location: Some(GeoPoint::new(10.0, 20.0).unwrap()),
        };
        let updated = store.update(&a.id, changes.clone()).await.unwrap().unwrap();
        assert_eq!(updated.techs, vec!["Zig", "C"]);
        assert_eq!(updated.location.longitude(), 20.0);
        assert!(store.update("missing", changes).await.unwrap().is_none());

        let removed = store.delete(&a.id).await.unwrap().unwrap();
        assert_eq!(removed, updated);
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.delete(&a.id).await.unwrap().is_none());

        let orphans: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM developer_techs")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(orphans.0, 0);
    }

    #[tokio::test]
    async fn test_list_and_search_beyond_sqlite_variable_limit() {
        let dir = tempdir().unwrap();
        let store = DevStore::open(&dir.path().join("radar.sqlite")).await.unwrap();

        sqlx::query(
            "INSERT INTO developers (id, github_username, name, avatar_url, bio, longitude, latitude, created_at) \
             WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 33000) \
             SELECT 'dev-' || n, 'user' || n, 'User', 'https://avatars.example/u', NULL, 0.0, 0.0, \
             '2026-01-01T00:00:00Z' FROM seq",
        )
        .execute(store.pool())
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO developer_techs (developer_id, position, tech) SELECT id, 0, 'Rust' FROM developers",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 33000);
        assert!(all.iter().all(|d| d.techs == vec!["Rust"]));

        let center = GeoPoint::new(0.0, 0.0).unwrap();
        let hits = store
            .search_nearby(&center, 10.0, &["Rust".to_string()])
            .await
            .unwrap();
        assert_eq!(hits.len(), 33000);
    }
}
