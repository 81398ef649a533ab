//! Image blob storage.

use anyhow::Result;
use rusqlite::OptionalExtension;

use super::Database;

/// An image accepted for storage, before it has an id.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct StoredImage {
    pub id: String,
    pub uploader_id: i64,
    pub filename: String,
    pub content_type: String,
    pub sha256_hash: String,
    pub data: Vec<u8>,
}

impl Database {
    pub fn get_image(&self, image_id: &str) -> Result<Option<StoredImage>> {
        let conn = self.conn()?;
        let image = conn
            .query_row(
                r#"
                SELECT id, uploader_id, filename, content_type, sha256_hash, data
                FROM images
                WHERE id = ?
                "#,
                [image_id],
                |row| {
                    Ok(StoredImage {
                        id: row.get(0)?,
                        uploader_id: row.get(1)?,
                        filename: row.get(2)?,
                        content_type: row.get(3)?,
                        sha256_hash: row.get(4)?,
                        data: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(image)
    }

    pub fn image_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
