use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::client::client_from_row;
use super::core::Database;
use crate::matching::types::{ClientRecord, MatchField, MatchType};
use crate::TARGET_DB;

/// Review lifecycle of a suspected duplicate pair. PENDING rows form the
/// human review queue; MERGED and DISMISSED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DuplicateStatus {
    Pending,
    Merged,
    Dismissed,
}

impl fmt::Display for DuplicateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateStatus::Pending => write!(f, "PENDING"),
            DuplicateStatus::Merged => write!(f, "MERGED"),
            DuplicateStatus::Dismissed => write!(f, "DISMISSED"),
        }
    }
}

impl From<&str> for DuplicateStatus {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "MERGED" => DuplicateStatus::Merged,
            "DISMISSED" => DuplicateStatus::Dismissed,
            _ => DuplicateStatus::Pending,
        }
    }
}

/// A persisted suspected-duplicate pair. The two client ids are stored in
/// canonical order: client1_id sorts lexicographically before client2_id.
#[derive(Debug, Clone)]
pub struct PendingDuplicate {
    pub id: String,
    pub client1_id: String,
    pub client2_id: String,
    pub match_type: MatchType,
    pub confidence_score: f64,
    pub match_fields: Vec<MatchField>,
    pub status: DuplicateStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub resolution_notes: Option<String>,
    pub created_at: String,

    // Related client records, populated for the review queue listing
    pub client1: Option<ClientRecord>,
    pub client2: Option<ClientRecord>,
}

/// Counts for the review-queue dashboard
#[derive(Debug, Clone, Default)]
pub struct DuplicateStats {
    pub total: i64,
    pub pending: i64,
    pub dismissed: i64,
    pub merged: i64,
    pub pending_by_match_type: Vec<(String, i64)>,
}

fn duplicate_from_row(row: &SqliteRow) -> PendingDuplicate {
    let match_type: String = row.get("match_type");
    let status: String = row.get("status");
    let match_fields: String = row.get("match_fields");

    // Lenient decode; a corrupt field list degrades to empty rather than
    // poisoning the whole queue
    let match_fields: Vec<String> = serde_json::from_str(&match_fields).unwrap_or_default();

    PendingDuplicate {
        id: row.get("id"),
        client1_id: row.get("client1_id"),
        client2_id: row.get("client2_id"),
        match_type: MatchType::from(match_type.as_str()),
        confidence_score: row.get("confidence_score"),
        match_fields: match_fields
            .iter()
            .map(|f| MatchField::from(f.as_str()))
            .collect(),
        status: DuplicateStatus::from(status.as_str()),
        reviewed_by: row.get("reviewed_by"),
        reviewed_at: row.get("reviewed_at"),
        resolution_notes: row.get("resolution_notes"),
        created_at: row.get("created_at"),
        client1: None,
        client2: None,
    }
}

impl Database {
    /// Look up a duplicate row by its canonical pair key, any status
    pub async fn find_duplicate_by_pair(
        &self,
        client1_id: &str,
        client2_id: &str,
    ) -> Result<Option<PendingDuplicate>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT * FROM potential_duplicates WHERE client1_id = ?1 AND client2_id = ?2",
        )
        .bind(client1_id)
        .bind(client2_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|r| duplicate_from_row(&r)))
    }

    pub async fn get_duplicate(
        &self,
        duplicate_id: &str,
    ) -> Result<Option<PendingDuplicate>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM potential_duplicates WHERE id = ?1")
            .bind(duplicate_id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|r| duplicate_from_row(&r)))
    }

    /// Insert a new PENDING row for a canonically ordered pair. The unique
    /// index on (client1_id, client2_id) rejects re-detection of a pair.
    #[instrument(target = "db_query", level = "debug", skip(self, match_fields))]
    pub async fn insert_pending_duplicate(
        &self,
        client1_id: &str,
        client2_id: &str,
        match_type: MatchType,
        confidence_score: f64,
        match_fields: &[MatchField],
    ) -> Result<String, sqlx::Error> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let fields: Vec<String> = match_fields.iter().map(|f| f.to_string()).collect();
        let fields_json = serde_json::to_string(&fields).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            r#"
            INSERT INTO potential_duplicates
            (id, client1_id, client2_id, match_type, confidence_score,
             match_fields, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'PENDING', ?7)
            "#,
        )
        .bind(&id)
        .bind(client1_id)
        .bind(client2_id)
        .bind(match_type.to_string())
        .bind(confidence_score)
        .bind(&fields_json)
        .bind(&now)
        .execute(self.pool())
        .await?;

        debug!(
            target: TARGET_DB,
            "Recorded potential duplicate ({}, {}) as {}", client1_id, client2_id, match_type
        );

        Ok(id)
    }

    /// The human review queue: PENDING rows ordered by confidence descending,
    /// with both related client records attached.
    pub async fn list_pending_duplicates(&self) -> Result<Vec<PendingDuplicate>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM potential_duplicates
            WHERE status = 'PENDING'
            ORDER BY confidence_score DESC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        let mut duplicates = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut duplicate = duplicate_from_row(row);
            duplicate.client1 = self.get_client(&duplicate.client1_id).await?;
            duplicate.client2 = self.get_client(&duplicate.client2_id).await?;
            duplicates.push(duplicate);
        }

        Ok(duplicates)
    }

    /// Stamp a single row with a terminal review decision
    pub async fn resolve_duplicate(
        &self,
        duplicate_id: &str,
        status: DuplicateStatus,
        reviewed_by: &str,
        resolution_notes: &str,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            UPDATE potential_duplicates
            SET status = ?1, reviewed_by = ?2, reviewed_at = ?3, resolution_notes = ?4
            WHERE id = ?5
            "#,
        )
        .bind(status.to_string())
        .bind(reviewed_by)
        .bind(&now)
        .bind(resolution_notes)
        .bind(duplicate_id)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Collect review-queue statistics across all statuses
    pub async fn duplicate_stats(&self) -> Result<DuplicateStats, sqlx::Error> {
        let mut stats = DuplicateStats::default();

        stats.total = sqlx::query_scalar("SELECT COUNT(*) FROM potential_duplicates")
            .fetch_one(self.pool())
            .await?;
        stats.pending =
            sqlx::query_scalar("SELECT COUNT(*) FROM potential_duplicates WHERE status = 'PENDING'")
                .fetch_one(self.pool())
                .await?;
        stats.dismissed = sqlx::query_scalar(
            "SELECT COUNT(*) FROM potential_duplicates WHERE status = 'DISMISSED'",
        )
        .fetch_one(self.pool())
        .await?;
        stats.merged =
            sqlx::query_scalar("SELECT COUNT(*) FROM potential_duplicates WHERE status = 'MERGED'")
                .fetch_one(self.pool())
                .await?;

        let rows = sqlx::query(
            r#"
            SELECT match_type, COUNT(*) as count FROM potential_duplicates
            WHERE status = 'PENDING'
            GROUP BY match_type
            ORDER BY count DESC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        stats.pending_by_match_type = rows
            .iter()
            .map(|row| (row.get("match_type"), row.get("count")))
            .collect();

        Ok(stats)
    }
}
