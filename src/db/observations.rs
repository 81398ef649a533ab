//! Observation records and their image blobs.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::{format_timestamp, Database, NewImage, User};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub id: i64,
    pub uploader_id: i64,
    pub uploader_username: String,
    pub species: String,
    pub image_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: String,
}

/// Validated observation fields, ready to persist.
#[derive(Debug, Clone)]
pub struct NewObservation {
    pub species: String,
    pub latitude: f64,
    pub longitude: f64,
    pub image: NewImage,
}

const OBSERVATION_COLUMNS: &str =
    "id, uploader_id, uploader_username, species, image_id, latitude, longitude, created_at";

fn observation_from_row(row: &Row<'_>) -> rusqlite::Result<Observation> {
    Ok(Observation {
        id: row.get(0)?,
        uploader_id: row.get(1)?,
        uploader_username: row.get(2)?,
        species: row.get(3)?,
        image_id: row.get(4)?,
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl Database {
    /// Store the image blob and the observation referencing it in one
    /// transaction.
    pub fn create_observation(
        &self,
        uploader: &User,
        observation: &NewObservation,
        at: DateTime<Utc>,
    ) -> Result<Observation> {
        let image_id = uuid::Uuid::new_v4().to_string();
        let created_at = format_timestamp(at);
        let sha256 = format!("{:x}", Sha256::digest(&observation.image.data));

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO images (id, uploader_id, filename, content_type, size_bytes, sha256_hash, data, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                image_id,
                uploader.id,
                observation.image.filename,
                observation.image.content_type,
                observation.image.data.len() as i64,
                sha256,
                observation.image.data,
                created_at,
            ],
        )?;
        tx.execute(
            r#"
            INSERT INTO observations (uploader_id, uploader_username, species, image_id, latitude, longitude, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                uploader.id,
                uploader.username,
                observation.species,
                image_id,
                observation.latitude,
                observation.longitude,
                created_at,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Observation {
            id,
            uploader_id: uploader.id,
            uploader_username: uploader.username.clone(),
            species: observation.species.clone(),
            image_id,
            latitude: observation.latitude,
            longitude: observation.longitude,
            created_at,
        })
    }

    pub fn get_observation(&self, observation_id: i64) -> Result<Option<Observation>> {
        let conn = self.conn()?;
        let observation = conn
            .query_row(
                &format!("SELECT {OBSERVATION_COLUMNS} FROM observations WHERE id = ?"),
                [observation_id],
                observation_from_row,
            )
            .optional()?;
        Ok(observation)
    }

    /// All observations of one uploader, newest first.
    pub fn observations_by_uploader(&self, uploader_id: i64) -> Result<Vec<Observation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations WHERE uploader_id = ? ORDER BY created_at DESC, id DESC"
        ))?;
        let results = stmt
            .query_map([uploader_id], observation_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(results)
    }

    /// Every observation, newest first.
    pub fn all_observations(&self) -> Result<Vec<Observation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations ORDER BY created_at DESC, id DESC"
        ))?;
        let results = stmt
            .query_map([], observation_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(results)
    }

    pub fn recent_observations(&self, limit: usize) -> Result<Vec<Observation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations ORDER BY created_at DESC, id DESC LIMIT ?"
        ))?;
        let results = stmt
            .query_map([limit as i64], observation_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(results)
    }

    /// Delete an observation together with its image. Returns false when
    /// no such observation exists.
    pub fn delete_observation(&self, observation_id: i64) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let image_id: Option<String> = tx
            .query_row(
                "SELECT image_id FROM observations WHERE id = ?",
                [observation_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(image_id) = image_id else {
            return Ok(false);
        };

        tx.execute("DELETE FROM observations WHERE id = ?", [observation_id])?;
        tx.execute("DELETE FROM images WHERE id = ?", [&image_id])?;
        tx.commit()?;
        Ok(true)
    }

    pub fn observation_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
