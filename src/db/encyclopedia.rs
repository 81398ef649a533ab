//! Cached encyclopedia summaries.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{format_timestamp, parse_timestamp, Database};

#[derive(Debug, Clone, PartialEq)]
pub struct EncyclopediaEntry {
    pub species: String,
    pub summary: String,
    pub cached_at: DateTime<Utc>,
}

impl Database {
    pub fn get_encyclopedia_entry(&self, species_key: &str) -> Result<Option<EncyclopediaEntry>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT species, summary, cached_at FROM encyclopedia WHERE species_key = ?",
                [species_key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        // An unreadable timestamp counts as a miss so the entry gets refreshed
        Ok(row.and_then(|(species, summary, cached_at)| {
            parse_timestamp(&cached_at).map(|cached_at| EncyclopediaEntry {
                species,
                summary,
                cached_at,
            })
        }))
    }

    pub fn upsert_encyclopedia_entry(
        &self,
        species_key: &str,
        entry: &EncyclopediaEntry,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO encyclopedia (species_key, species, summary, cached_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(species_key) DO UPDATE SET
                species = excluded.species,
                summary = excluded.summary,
                cached_at = excluded.cached_at
            "#,
            params![
                species_key,
                entry.species,
                entry.summary,
                format_timestamp(entry.cached_at)
            ],
        )?;
        Ok(())
    }

    pub fn encyclopedia_entry_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM encyclopedia", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
