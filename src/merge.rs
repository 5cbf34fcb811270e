//! Transactional client merge.
//!
//! Merging relocates every dependent record from the source client to the
//! target, marks the source as merged away, and closes every pending
//! duplicate pair touching either client. The whole operation runs inside a
//! single database transaction: a failure at any point rolls everything back
//! and the caller can retry the merge wholesale.

use chrono::Utc;
use dashmap::DashMap;
use lazy_static::lazy_static;
use sqlx::{Row, Sqlite, Transaction};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::db::duplicate::DuplicateStatus;
use crate::db::Database;
use crate::error::DedupeError;
use crate::review::canonical_pair;

pub(crate) const TARGET_MERGE: &str = "merge";

const DEFAULT_MERGE_NOTES: &str = "Clients merged";

/// Record types owned by a client. A merge bulk-reassigns the owning
/// client id on every one of these; the list is closed and the relocations
/// have no cross-dependencies, so their order is irrelevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependentRecord {
    EmergencyContact,
    LegalGuardian,
    Insurance,
    Appointment,
    ClinicalNote,
    TreatmentPlan,
    Diagnosis,
    Medication,
    Document,
    Charge,
    Payment,
    Statement,
}

impl DependentRecord {
    pub const ALL: [DependentRecord; 12] = [
        DependentRecord::EmergencyContact,
        DependentRecord::LegalGuardian,
        DependentRecord::Insurance,
        DependentRecord::Appointment,
        DependentRecord::ClinicalNote,
        DependentRecord::TreatmentPlan,
        DependentRecord::Diagnosis,
        DependentRecord::Medication,
        DependentRecord::Document,
        DependentRecord::Charge,
        DependentRecord::Payment,
        DependentRecord::Statement,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            DependentRecord::EmergencyContact => "emergency_contacts",
            DependentRecord::LegalGuardian => "legal_guardians",
            DependentRecord::Insurance => "insurance_records",
            DependentRecord::Appointment => "appointments",
            DependentRecord::ClinicalNote => "clinical_notes",
            DependentRecord::TreatmentPlan => "treatment_plans",
            DependentRecord::Diagnosis => "diagnoses",
            DependentRecord::Medication => "medications",
            DependentRecord::Document => "client_documents",
            DependentRecord::Charge => "charge_entries",
            DependentRecord::Payment => "payment_records",
            DependentRecord::Statement => "client_statements",
        }
    }
}

impl fmt::Display for DependentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table())
    }
}

/// What a completed merge moved
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub records_relocated: u64,
    pub duplicates_resolved: u64,
}

lazy_static! {
    // One async mutex per in-flight pair, keyed on the smaller client id, so
    // two merges touching the same pair cannot interleave their relocations
    static ref MERGE_LOCKS: DashMap<String, Arc<Mutex<()>>> = DashMap::new();
}

/// Merge the source client into the target client.
///
/// Runs as one atomic transaction: either every dependent record relocates,
/// the source is flagged as merged, and all pending pairs touching either
/// client close as MERGED, or none of it happens.
pub async fn merge_clients(
    db: &Database,
    source_client_id: &str,
    target_client_id: &str,
    reviewed_by: &str,
    resolution_notes: Option<&str>,
) -> Result<MergeOutcome, DedupeError> {
    let (lock_key, _) = canonical_pair(source_client_id, target_client_id);
    let lock = MERGE_LOCKS
        .entry(lock_key.to_string())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone();
    let _guard = lock.lock().await;

    let notes = resolution_notes.unwrap_or(DEFAULT_MERGE_NOTES);

    let mut transaction = db.pool().begin().await?;
    match apply_merge(
        &mut transaction,
        source_client_id,
        target_client_id,
        reviewed_by,
        notes,
    )
    .await
    {
        Ok(outcome) => {
            transaction.commit().await?;
            info!(
                target: TARGET_MERGE,
                "Merged client {} into {}: {} records relocated, {} pending duplicates resolved",
                source_client_id, target_client_id,
                outcome.records_relocated, outcome.duplicates_resolved
            );
            Ok(outcome)
        }
        Err(err) => {
            transaction.rollback().await?;
            Err(err)
        }
    }
}

/// Is the client merged already? None when the client does not exist.
async fn fetch_merge_state(
    transaction: &mut Transaction<'_, Sqlite>,
    client_id: &str,
) -> Result<Option<bool>, sqlx::Error> {
    let row = sqlx::query("SELECT is_merged FROM clients WHERE id = ?1")
        .bind(client_id)
        .fetch_optional(&mut **transaction)
        .await?;

    Ok(row.map(|r| r.get("is_merged")))
}

async fn apply_merge(
    transaction: &mut Transaction<'_, Sqlite>,
    source_client_id: &str,
    target_client_id: &str,
    reviewed_by: &str,
    notes: &str,
) -> Result<MergeOutcome, DedupeError> {
    // Both ends are validated inside the transaction so a concurrent merge
    // cannot slip between the check and the updates
    let source_merged = fetch_merge_state(transaction, source_client_id)
        .await?
        .ok_or_else(|| DedupeError::ClientNotFound(source_client_id.to_string()))?;
    if source_merged {
        return Err(DedupeError::AlreadyMerged(source_client_id.to_string()));
    }

    let target_merged = fetch_merge_state(transaction, target_client_id)
        .await?
        .ok_or_else(|| DedupeError::ClientNotFound(target_client_id.to_string()))?;
    if target_merged {
        return Err(DedupeError::AlreadyMerged(target_client_id.to_string()));
    }

    let mut outcome = MergeOutcome::default();

    // 1. Relocate every dependent record type to the target
    for record in DependentRecord::ALL {
        let result = sqlx::query(&format!(
            "UPDATE {} SET client_id = ?1 WHERE client_id = ?2",
            record.table()
        ))
        .bind(target_client_id)
        .bind(source_client_id)
        .execute(&mut **transaction)
        .await?;

        if result.rows_affected() > 0 {
            debug!(
                target: TARGET_MERGE,
                "Relocated {} rows from {}", result.rows_affected(), record.table()
            );
        }
        outcome.records_relocated += result.rows_affected();
    }

    // 2. Mark the source client as merged away
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        UPDATE clients
        SET is_merged = 1, merged_into = ?1, merged_at = ?2
        WHERE id = ?3
        "#,
    )
    .bind(target_client_id)
    .bind(&now)
    .bind(source_client_id)
    .execute(&mut **transaction)
    .await?;

    // 3. Close every pending pair that references either client, on either
    // side of the pair key
    let result = sqlx::query(
        r#"
        UPDATE potential_duplicates
        SET status = ?1, reviewed_by = ?2, reviewed_at = ?3, resolution_notes = ?4
        WHERE status = 'PENDING'
          AND (client1_id IN (?5, ?6) OR client2_id IN (?5, ?6))
        "#,
    )
    .bind(DuplicateStatus::Merged.to_string())
    .bind(reviewed_by)
    .bind(&now)
    .bind(notes)
    .bind(source_client_id)
    .bind(target_client_id)
    .execute(&mut **transaction)
    .await?;

    outcome.duplicates_resolved = result.rows_affected();

    Ok(outcome)
}
