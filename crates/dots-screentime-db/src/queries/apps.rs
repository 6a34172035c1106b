use crate::connection::Database;
use crate::error::{DbError, Result};
use crate::models::{DbApp, NewApp};

pub struct AppQueries;

impl AppQueries {
    pub async fn create(db: &Database, app: NewApp) -> Result<DbApp> {
        let pool = db.pool()?;

        sqlx::query(
            r#"
            INSERT INTO apps (id, process_name, display_name, category, file_path, icon_base64)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&app.id)
        .bind(&app.process_name)
        .bind(&app.display_name)
        .bind(&app.category)
        .bind(&app.file_path)
        .bind(&app.icon_base64)
        .execute(pool)
        .await?;

        Self::get_by_id(db, &app.id).await
    }

    /// Return the app for `process_name`, inserting `app` if none exists yet.
    ///
    /// Two resolvers racing on the same name both end up with the same row.
    pub async fn get_or_create(db: &Database, app: NewApp) -> Result<DbApp> {
        let pool = db.pool()?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO apps
                (id, process_name, display_name, category, file_path, icon_base64)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&app.id)
        .bind(&app.process_name)
        .bind(&app.display_name)
        .bind(&app.category)
        .bind(&app.file_path)
        .bind(&app.icon_base64)
        .execute(pool)
        .await?;

        Self::get_by_process_name(db, &app.process_name)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("App {} not found", app.process_name)))
    }

    pub async fn get_by_id(db: &Database, id: &str) -> Result<DbApp> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbApp>("SELECT * FROM apps WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("App {} not found", id)))
    }

    pub async fn get_by_process_name(db: &Database, process_name: &str) -> Result<Option<DbApp>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbApp>("SELECT * FROM apps WHERE process_name = ? COLLATE NOCASE")
            .bind(process_name)
            .fetch_optional(pool)
            .await
            .map_err(DbError::Sqlx)
    }

    pub async fn list_all(db: &Database) -> Result<Vec<DbApp>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbApp>("SELECT * FROM apps ORDER BY display_name COLLATE NOCASE")
            .fetch_all(pool)
            .await
            .map_err(DbError::Sqlx)
    }

    pub async fn update_category(db: &Database, id: &str, category: Option<&str>) -> Result<()> {
        let pool = db.pool()?;

        let result = sqlx::query("UPDATE apps SET category = ? WHERE id = ?")
            .bind(category)
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            Err(DbError::NotFound(format!("App {} not found", id)))
        } else {
            Ok(())
        }
    }

    /// Fill in icon and path if they are still empty; existing values win.
    pub async fn fill_details(
        db: &Database,
        id: &str,
        file_path: Option<&str>,
        icon_base64: Option<&str>,
    ) -> Result<()> {
        let pool = db.pool()?;

        sqlx::query(
            r#"
            UPDATE apps SET
                file_path = COALESCE(file_path, ?),
                icon_base64 = COALESCE(icon_base64, ?)
            WHERE id = ?
            "#,
        )
        .bind(file_path)
        .bind(icon_base64)
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_test_db;

    #[tokio::test]
    async fn test_create_and_lookup_app() {
        let (db, _dir) = setup_test_db().await;

        let mut app = NewApp::new("firefox", "Firefox");
        app.category = Some("Browser".to_string());
        let created = AppQueries::create(&db, app).await.unwrap();

        assert_eq!(created.process_name, "firefox");
        assert_eq!(created.category.as_deref(), Some("Browser"));

        let found = AppQueries::get_by_process_name(&db, "FireFox").await.unwrap();
        assert_eq!(found.unwrap().id, created.id);

        assert!(AppQueries::get_by_process_name(&db, "code").await.unwrap().is_none());
        assert!(matches!(AppQueries::get_by_id(&db, "missing").await, Err(DbError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let (db, _dir) = setup_test_db().await;

        let first = AppQueries::get_or_create(&db, NewApp::new("code", "VS Code")).await.unwrap();
        let second = AppQueries::get_or_create(&db, NewApp::new("code", "Other")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.display_name, "VS Code");
        assert_eq!(AppQueries::list_all(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fill_details_keeps_existing_values() {
        let (db, _dir) = setup_test_db().await;

        let app = AppQueries::create(&db, NewApp::new("steam", "Steam")).await.unwrap();
        AppQueries::fill_details(&db, &app.id, Some("/usr/bin/steam"), Some("aWNvbg==")).await.unwrap();
        AppQueries::fill_details(&db, &app.id, Some("/opt/steam"), None).await.unwrap();

        let app = AppQueries::get_by_id(&db, &app.id).await.unwrap();
        assert_eq!(app.file_path.as_deref(), Some("/usr/bin/steam"));
        assert_eq!(app.icon_base64.as_deref(), Some("aWNvbg=="));

        AppQueries::update_category(&db, &app.id, Some("Games")).await.unwrap();
        let app = AppQueries::get_by_id(&db, &app.id).await.unwrap();
        assert_eq!(app.category.as_deref(), Some("Games"));
    }
}
