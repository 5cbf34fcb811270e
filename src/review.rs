//! Review queue for suspected duplicate clients.
//!
//! Detected matches are persisted as unordered client pairs with a canonical
//! key so repeated detection can never produce a second row, then surfaced to
//! a human reviewer who either dismisses the pair or merges the records.

use tracing::{debug, info};

use crate::db::duplicate::{DuplicateStats, DuplicateStatus, PendingDuplicate};
use crate::db::{Database, DbUniqueViolationExt};
use crate::error::DedupeError;
use crate::matching::types::MatchCandidate;

pub(crate) const TARGET_REVIEW: &str = "review";

const DEFAULT_DISMISS_NOTES: &str = "Not a duplicate";

/// Canonical unordered pair key: the lexicographically smaller id always
/// comes first, so one stored row covers both argument orders.
pub fn canonical_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Persist scan results as PENDING review-queue rows, one per distinct pair.
///
/// Re-detection of a pair is a no-op: the first recorded match type and score
/// for a pair win. Returns how many new rows were recorded.
pub async fn save_potential_duplicates(
    db: &Database,
    new_client_id: &str,
    matches: &[MatchCandidate],
) -> Result<usize, DedupeError> {
    let mut inserted = 0;

    for candidate in matches {
        let (client1_id, client2_id) = canonical_pair(new_client_id, &candidate.client_id);

        // Fast path; the unique pair index remains the authoritative guard
        if db
            .find_duplicate_by_pair(client1_id, client2_id)
            .await?
            .is_some()
        {
            debug!(
                target: TARGET_REVIEW,
                "Pair ({}, {}) already recorded, skipping", client1_id, client2_id
            );
            continue;
        }

        match db
            .insert_pending_duplicate(
                client1_id,
                client2_id,
                candidate.match_type,
                candidate.confidence,
                &candidate.fields,
            )
            .await
        {
            Ok(_) => inserted += 1,
            Err(err) if err.is_unique_violation() => {
                // A concurrent scan recorded the pair first; same outcome
                debug!(
                    target: TARGET_REVIEW,
                    "Pair ({}, {}) inserted concurrently, skipping", client1_id, client2_id
                );
            }
            Err(err) => return Err(err.into()),
        }
    }

    info!(
        target: TARGET_REVIEW,
        "Recorded {} new potential duplicates for client {}", inserted, new_client_id
    );

    Ok(inserted)
}

/// The human review queue: PENDING pairs with both client records attached,
/// strongest matches first.
pub async fn get_pending_duplicates(db: &Database) -> Result<Vec<PendingDuplicate>, DedupeError> {
    Ok(db.list_pending_duplicates().await?)
}

/// Reject a suspected pair as not being the same person.
///
/// Only PENDING rows can be dismissed; resolved rows are terminal and a
/// second decision would overwrite the recorded audit trail.
pub async fn dismiss_duplicate(
    db: &Database,
    duplicate_id: &str,
    reviewed_by: &str,
    resolution_notes: Option<&str>,
) -> Result<(), DedupeError> {
    let duplicate = db
        .get_duplicate(duplicate_id)
        .await?
        .ok_or_else(|| DedupeError::DuplicateNotFound(duplicate_id.to_string()))?;

    if duplicate.status != DuplicateStatus::Pending {
        return Err(DedupeError::NotPending {
            id: duplicate_id.to_string(),
            status: duplicate.status.to_string(),
        });
    }

    let notes = resolution_notes.unwrap_or(DEFAULT_DISMISS_NOTES);
    db.resolve_duplicate(duplicate_id, DuplicateStatus::Dismissed, reviewed_by, notes)
        .await?;

    info!(
        target: TARGET_REVIEW,
        "Dismissed potential duplicate {} (reviewer: {})", duplicate_id, reviewed_by
    );

    Ok(())
}

/// Review-queue counts, overall and per match type for the pending backlog
pub async fn duplicate_stats(db: &Database) -> Result<DuplicateStats, DedupeError> {
    Ok(db.duplicate_stats().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::types::{ClientFields, MatchField, MatchType};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    async fn test_db(dir: &TempDir) -> Database {
        let path = dir.path().join("review.db");
        Database::new(path.to_str().unwrap()).await.unwrap()
    }

    fn intake(first: &str, last: &str) -> ClientFields {
        ClientFields {
            first_name: first.to_string(),
            last_name: last.to_string(),
            date_of_birth: Utc.with_ymd_and_hms(1990, 5, 15, 0, 0, 0).unwrap(),
            primary_phone: "5551234567".to_string(),
            address_street1: None,
            address_zip_code: None,
        }
    }

    async fn candidate_for(db: &Database, client_id: &str) -> MatchCandidate {
        let client = db.get_client(client_id).await.unwrap().unwrap();
        MatchCandidate::new(
            &client,
            MatchType::Phonetic,
            0.85,
            vec![
                MatchField::FirstName,
                MatchField::LastName,
                MatchField::DateOfBirth,
            ],
        )
    }

    #[test]
    fn test_canonical_pair_ordering() {
        assert_eq!(canonical_pair("zzz", "aaa"), ("aaa", "zzz"));
        assert_eq!(canonical_pair("aaa", "zzz"), ("aaa", "zzz"));
        assert_eq!(canonical_pair("same", "same"), ("same", "same"));
    }

    #[tokio::test]
    async fn test_pair_key_canonicalized_regardless_of_argument_order() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir).await;

        let id_a = db.add_client(&intake("John", "Doe")).await.unwrap();
        let id_b = db.add_client(&intake("Jon", "Doe")).await.unwrap();

        // Save with the larger id as the "new client"
        let (new_id, matched_id) = if id_a > id_b {
            (id_a.clone(), id_b.clone())
        } else {
            (id_b.clone(), id_a.clone())
        };

        let matches = vec![candidate_for(&db, &matched_id).await];
        save_potential_duplicates(&db, &new_id, &matches)
            .await
            .unwrap();

        let (smaller, larger) = canonical_pair(&id_a, &id_b);
        let row = db
            .find_duplicate_by_pair(smaller, larger)
            .await
            .unwrap()
            .expect("pair row should exist under the canonical key");
        assert_eq!(row.client1_id, smaller);
        assert_eq!(row.client2_id, larger);
    }

    #[tokio::test]
    async fn test_save_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir).await;

        let id_a = db.add_client(&intake("John", "Doe")).await.unwrap();
        let id_b = db.add_client(&intake("Jon", "Doe")).await.unwrap();

        let matches = vec![candidate_for(&db, &id_b).await];
        let first = save_potential_duplicates(&db, &id_a, &matches)
            .await
            .unwrap();
        let second = save_potential_duplicates(&db, &id_a, &matches)
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 0);

        let stats = duplicate_stats(&db).await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.pending, 1);
    }

    #[tokio::test]
    async fn test_pending_queue_ordered_with_clients_attached() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir).await;

        let id_a = db.add_client(&intake("John", "Doe")).await.unwrap();
        let id_b = db.add_client(&intake("Jon", "Doe")).await.unwrap();
        let id_c = db.add_client(&intake("Johnny", "Doe")).await.unwrap();

        let client_b = db.get_client(&id_b).await.unwrap().unwrap();
        let client_c = db.get_client(&id_c).await.unwrap().unwrap();

        let matches = vec![
            MatchCandidate::new(&client_c, MatchType::PartialDob, 0.65, vec![]),
            MatchCandidate::new(&client_b, MatchType::Phonetic, 0.85, vec![]),
        ];
        save_potential_duplicates(&db, &id_a, &matches)
            .await
            .unwrap();

        let queue = get_pending_duplicates(&db).await.unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].confidence_score, 0.85);
        assert_eq!(queue[1].confidence_score, 0.65);
        assert!(queue[0].client1.is_some());
        assert!(queue[0].client2.is_some());
    }

    #[tokio::test]
    async fn test_dismiss_applies_default_notes() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir).await;

        let id_a = db.add_client(&intake("John", "Doe")).await.unwrap();
        let id_b = db.add_client(&intake("Jon", "Doe")).await.unwrap();
        let matches = vec![candidate_for(&db, &id_b).await];
        save_potential_duplicates(&db, &id_a, &matches)
            .await
            .unwrap();

        let queue = get_pending_duplicates(&db).await.unwrap();
        let duplicate_id = queue[0].id.clone();

        dismiss_duplicate(&db, &duplicate_id, "reviewer-1", None)
            .await
            .unwrap();

        let row = db.get_duplicate(&duplicate_id).await.unwrap().unwrap();
        assert_eq!(row.status, DuplicateStatus::Dismissed);
        assert_eq!(row.reviewed_by.as_deref(), Some("reviewer-1"));
        assert!(row.reviewed_at.is_some());
        assert_eq!(row.resolution_notes.as_deref(), Some("Not a duplicate"));
    }

    #[tokio::test]
    async fn test_dismiss_missing_row_errors() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir).await;

        let result = dismiss_duplicate(&db, "no-such-id", "reviewer-1", None).await;
        assert!(matches!(result, Err(DedupeError::DuplicateNotFound(_))));
    }

    #[tokio::test]
    async fn test_dismiss_resolved_row_errors() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir).await;

        let id_a = db.add_client(&intake("John", "Doe")).await.unwrap();
        let id_b = db.add_client(&intake("Jon", "Doe")).await.unwrap();
        let matches = vec![candidate_for(&db, &id_b).await];
        save_potential_duplicates(&db, &id_a, &matches)
            .await
            .unwrap();

        let queue = get_pending_duplicates(&db).await.unwrap();
        let duplicate_id = queue[0].id.clone();

        dismiss_duplicate(&db, &duplicate_id, "reviewer-1", None)
            .await
            .unwrap();
        let result = dismiss_duplicate(&db, &duplicate_id, "reviewer-2", None).await;

        assert!(matches!(
            result,
            Err(DedupeError::NotPending { .. })
        ));

        // The first decision is untouched
        let row = db.get_duplicate(&duplicate_id).await.unwrap().unwrap();
        assert_eq!(row.reviewed_by.as_deref(), Some("reviewer-1"));
    }

    #[tokio::test]
    async fn test_stats_track_status_transitions() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir).await;

        let id_a = db.add_client(&intake("John", "Doe")).await.unwrap();
        let id_b = db.add_client(&intake("Jon", "Doe")).await.unwrap();
        let id_c = db.add_client(&intake("Johnny", "Doe")).await.unwrap();

        let matches = vec![
            candidate_for(&db, &id_b).await,
            candidate_for(&db, &id_c).await,
        ];
        save_potential_duplicates(&db, &id_a, &matches)
            .await
            .unwrap();

        let queue = get_pending_duplicates(&db).await.unwrap();
        dismiss_duplicate(&db, &queue[0].id, "reviewer-1", None)
            .await
            .unwrap();

        let stats = duplicate_stats(&db).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.dismissed, 1);
        assert_eq!(stats.merged, 0);
        assert_eq!(
            stats.pending_by_match_type,
            vec![("PHONETIC".to_string(), 1)]
        );
    }
}
