use crate::database::PageRepository;
use crate::domain::{ContentHash, Page, PageVersion};
use crate::features::pages::model::{DbPage, DbPageContent, DbPageVersion};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Pool, Sqlite, SqliteConnection};
use uuid::Uuid;

pub struct SqliteRepository {
    pool: Pool<Sqlite>,
}

impl SqliteRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PageRepository for SqliteRepository {
    async fn get_page(&self, id: Uuid) -> Result<Option<Page>> {
        let db_page_opt = sqlx::query_as::<_, DbPage>("SELECT * FROM pages WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match db_page_opt {
            Some(db_page) => Ok(Some(db_page.try_into()?)),
            None => Ok(None),
        }
    }

    async fn find_version_by_id(&self, id: Uuid) -> Result<Option<PageVersion>> {
        // the version row and its contents come from the same transaction, so a
        // concurrent save can never hand us half of the old blocks and half of the new
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, DbPageVersion>("SELECT * FROM page_versions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;

        let version = match row {
            Some(row) => Some(assemble_version(&mut tx, row).await?),
            None => None,
        };

        tx.commit().await?;
        Ok(version)
    }

    async fn find_version_by_hash(&self, hash: &ContentHash) -> Result<Option<PageVersion>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, DbPageVersion>(
            r#"
            SELECT * FROM page_versions
            WHERE hash = ?
            ORDER BY updated_at DESC, id ASC
            LIMIT 1
            "#,
        )
        .bind(hash.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let version = match row {
            Some(row) => Some(assemble_version(&mut tx, row).await?),
            None => None,
        };

        tx.commit().await?;
        Ok(version)
    }

    async fn list_versions(&self, page_id: Uuid) -> Result<Vec<PageVersion>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, DbPageVersion>(
            "SELECT * FROM page_versions WHERE page_id = ? ORDER BY updated_at ASC, id ASC",
        )
        .bind(page_id.to_string())
        .fetch_all(&mut *tx)
        .await?;

        let mut versions = Vec::with_capacity(rows.len());
        for row in rows {
            versions.push(assemble_version(&mut tx, row).await?);
        }

        tx.commit().await?;
        Ok(versions)
    }

    async fn save_page(&self, page: &Page) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        upsert_page(&mut tx, page).await?;
        tx.commit()
            .await
            .context(format!("Failed to save page {}", page.id))?;

        Ok(())
    }

    async fn save_version(&self, version: &PageVersion) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        upsert_version(&mut tx, version).await?;
        tx.commit()
            .await
            .context(format!("Failed to save page version {}", version.id))?;

        Ok(())
    }

    async fn commit_publication(&self, page: &Page, version: &PageVersion) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        upsert_version(&mut tx, version).await?;
        upsert_page(&mut tx, page).await?;
        tx.commit()
            .await
            .context(format!("Failed to publish page version {}", version.id))?;

        Ok(())
    }

    async fn delete_version(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM page_contents WHERE page_version_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM page_versions WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit()
            .await
            .context(format!("Failed to delete page version {}", id))?;

        Ok(())
    }
}

async fn assemble_version(conn: &mut SqliteConnection, row: DbPageVersion) -> Result<PageVersion> {
    let contents = sqlx::query_as::<_, DbPageContent>(
        "SELECT * FROM page_contents WHERE page_version_id = ? ORDER BY position ASC",
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?;

    row.into_version(contents)
}

async fn upsert_page(conn: &mut SqliteConnection, page: &Page) -> Result<()> {
    let db_page: DbPage = page.into();

    sqlx::query(
        r#"
        INSERT INTO pages (id, label, template, current_version_id)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            label = excluded.label,
            template = excluded.template,
            current_version_id = excluded.current_version_id
        "#,
    )
    .bind(&db_page.id)
    .bind(&db_page.label)
    .bind(&db_page.template)
    .bind(&db_page.current_version_id)
    .execute(&mut *conn)
    .await
    .context(format!("Failed to upsert page {}", db_page.id))?;

    Ok(())
}

// contents are replaced wholesale; positions are rewritten from the vector order
async fn upsert_version(conn: &mut SqliteConnection, version: &PageVersion) -> Result<()> {
    let db_version: DbPageVersion = version.into();

    sqlx::query(
        r#"
        INSERT INTO page_versions (id, page_id, title, description, hash, status, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            hash = excluded.hash,
            status = excluded.status,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&db_version.id)
    .bind(&db_version.page_id)
    .bind(&db_version.title)
    .bind(&db_version.description)
    .bind(&db_version.hash)
    .bind(&db_version.status)
    .bind(db_version.updated_at)
    .execute(&mut *conn)
    .await
    .context(format!("Failed to upsert page version {}", db_version))?;

    sqlx::query("DELETE FROM page_contents WHERE page_version_id = ?")
        .bind(&db_version.id)
        .execute(&mut *conn)
        .await?;

    for (position, content) in version.contents.iter().enumerate() {
        let db_content = DbPageContent::from_content(version.id, position, content)?;

        sqlx::query(
            r#"
            INSERT INTO page_contents (id, page_version_id, position, markup, assets)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&db_content.id)
        .bind(&db_content.page_version_id)
        .bind(db_content.position)
        .bind(&db_content.markup)
        .bind(&db_content.assets)
        .execute(&mut *conn)
        .await
        .context(format!(
            "Failed to store content {} of page version {}",
            db_content.id, db_version
        ))?;
    }

    Ok(())
}
