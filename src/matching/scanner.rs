use std::collections::HashMap;
use tracing::{debug, info};

use super::rules;
use super::types::{ClientFields, MatchCandidate};
use super::TARGET_MATCH;
use crate::db::Database;
use crate::error::DedupeError;

/// Scan the active client population for suspected duplicates of the given
/// intake fields.
///
/// Detectors run in fixed order per existing client; an exact hit
/// short-circuits the rest for that client since they would only restate the
/// same pair at lower confidence. The result keeps one entry per matched
/// client (the highest-confidence detector wins) ordered by confidence
/// descending. Read-only: persisting the matches is a separate step.
pub async fn check_for_duplicates(
    db: &Database,
    input: &ClientFields,
    exclude_client_id: Option<&str>,
) -> Result<Vec<MatchCandidate>, DedupeError> {
    let clients = db.list_active_clients(exclude_client_id).await?;

    info!(
        target: TARGET_MATCH,
        "Scanning {} active clients for duplicates of {} {}",
        clients.len(), input.first_name, input.last_name
    );

    let mut matches: Vec<MatchCandidate> = Vec::new();

    for client in &clients {
        if let Some(exact) = rules::exact_match(input, client) {
            matches.push(exact);
            continue;
        }

        if let Some(candidate) = rules::phonetic_match(input, client) {
            matches.push(candidate);
        }
        if let Some(candidate) = rules::fuzzy_match(input, client) {
            matches.push(candidate);
        }
        if let Some(candidate) = rules::partial_dob_match(input, client) {
            matches.push(candidate);
        }
        if let Some(candidate) = rules::address_match(input, client) {
            matches.push(candidate);
        }
    }

    // Keep only the strongest result per matched client; ties keep the
    // first-detected result
    let mut best: Vec<MatchCandidate> = Vec::new();
    let mut index_by_client: HashMap<String, usize> = HashMap::new();

    for candidate in matches {
        match index_by_client.get(&candidate.client_id) {
            Some(&idx) if best[idx].confidence >= candidate.confidence => {}
            Some(&idx) => best[idx] = candidate,
            None => {
                index_by_client.insert(candidate.client_id.clone(), best.len());
                best.push(candidate);
            }
        }
    }

    best.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    debug!(
        target: TARGET_MATCH,
        "{} candidates remain after per-client deduplication", best.len()
    );

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::types::MatchType;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    async fn test_db(dir: &TempDir) -> Database {
        let path = dir.path().join("scan.db");
        Database::new(path.to_str().unwrap()).await.unwrap()
    }

    fn intake(
        first: &str,
        last: &str,
        dob: (i32, u32, u32),
        phone: &str,
        street: Option<&str>,
        zip: Option<&str>,
    ) -> ClientFields {
        ClientFields {
            first_name: first.to_string(),
            last_name: last.to_string(),
            date_of_birth: Utc.with_ymd_and_hms(dob.0, dob.1, dob.2, 10, 30, 0).unwrap(),
            primary_phone: phone.to_string(),
            address_street1: street.map(str::to_string),
            address_zip_code: zip.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_empty_population_yields_no_matches() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir).await;

        let input = intake("John", "Doe", (1990, 5, 15), "5551234567", None, None);
        let result = check_for_duplicates(&db, &input, None).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_exact_match_short_circuits_other_detectors() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir).await;

        let existing = intake(
            "John",
            "Doe",
            (1990, 5, 15),
            "(555) 123-4567",
            Some("123 Main St"),
            Some("12345"),
        );
        let id = db.add_client(&existing).await.unwrap();

        // Same person; phonetic/fuzzy/address would all fire too but the
        // exact hit suppresses them
        let input = intake(
            "john",
            "DOE",
            (1990, 5, 15),
            "555-123-4567",
            Some("123 Main St"),
            Some("12345"),
        );
        let result = check_for_duplicates(&db, &input, None).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].client_id, id);
        assert_eq!(result[0].match_type, MatchType::Exact);
        assert_eq!(result[0].confidence, 1.0);
    }

    #[tokio::test]
    async fn test_deduplication_keeps_highest_confidence_per_client() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir).await;

        // Phonetic (0.85), fuzzy (~0.84) and partial-DOB (0.65) all fire for
        // this pair; exactly one entry survives, at 0.85
        let existing = intake(
            "Jonathon",
            "Anderson",
            (1990, 5, 15),
            "5559990000",
            None,
            None,
        );
        let id = db.add_client(&existing).await.unwrap();

        let input = intake(
            "Jonathan",
            "Anderson",
            (1990, 5, 15),
            "5551234567",
            None,
            None,
        );
        let result = check_for_duplicates(&db, &input, None).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].client_id, id);
        assert_eq!(result[0].match_type, MatchType::Phonetic);
        assert_eq!(result[0].confidence, 0.85);
    }

    #[tokio::test]
    async fn test_results_ranked_by_confidence_descending() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir).await;

        // Exact duplicate: 1.0
        let exact = intake(
            "John",
            "Doe",
            (2000, 1, 15),
            "5551234567",
            Some("123 Main St"),
            Some("12345"),
        );
        let exact_id = db.add_client(&exact).await.unwrap();

        // Same address, vaguely similar name: 0.75
        let neighbor = intake(
            "Johnny",
            "Doe",
            (1985, 3, 1),
            "5550001111",
            Some("123 Main St"),
            Some("12345"),
        );
        let neighbor_id = db.add_client(&neighbor).await.unwrap();

        // Same name, same birth month, different day, no address: 0.65
        let partial = intake("John", "Doe", (2000, 1, 28), "5552223333", None, None);
        let partial_id = db.add_client(&partial).await.unwrap();

        let input = intake(
            "John",
            "Doe",
            (2000, 1, 15),
            "5551234567",
            Some("123 Main St"),
            Some("12345"),
        );
        let result = check_for_duplicates(&db, &input, None).await.unwrap();

        let ids: Vec<&str> = result.iter().map(|m| m.client_id.as_str()).collect();
        let confidences: Vec<f64> = result.iter().map(|m| m.confidence).collect();
        assert_eq!(
            ids,
            vec![exact_id.as_str(), neighbor_id.as_str(), partial_id.as_str()]
        );
        assert_eq!(confidences, vec![1.0, 0.75, 0.65]);
    }

    #[tokio::test]
    async fn test_exclude_client_id_skips_self() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir).await;

        let existing = intake("John", "Doe", (1990, 5, 15), "5551234567", None, None);
        let id = db.add_client(&existing).await.unwrap();

        let result = check_for_duplicates(&db, &existing, Some(&id))
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_merged_clients_excluded_from_scans() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir).await;

        let existing = intake("John", "Doe", (1990, 5, 15), "5551234567", None, None);
        let id = db.add_client(&existing).await.unwrap();

        sqlx::query("UPDATE clients SET is_merged = 1 WHERE id = ?1")
            .bind(&id)
            .execute(db.pool())
            .await
            .unwrap();

        let result = check_for_duplicates(&db, &existing, None).await.unwrap();
        assert!(result.is_empty());
    }
}
