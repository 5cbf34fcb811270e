use chrono::Datelike;

use super::normalizer::{normalize_phone, normalize_text, parse_calendar_date};
use super::similarity::{similarity_ratio, soundex};
use super::types::{ClientFields, ClientRecord, MatchCandidate, MatchField, MatchType};

// Confidence assigned by each detector
const EXACT_CONFIDENCE: f64 = 1.0;
const PHONETIC_CONFIDENCE: f64 = 0.85;
const PARTIAL_DOB_CONFIDENCE: f64 = 0.65;
const ADDRESS_CONFIDENCE: f64 = 0.75;

// Fuzzy confidence is the average name similarity scaled so it can never
// reach the exact detector's 1.0
const FUZZY_SCALE: f64 = 0.9;

// Name similarity floors per detector
const FUZZY_NAME_THRESHOLD: f64 = 0.8;
const PARTIAL_DOB_NAME_THRESHOLD: f64 = 0.7;
const ADDRESS_NAME_THRESHOLD: f64 = 0.6;

/// Whether the intake date of birth and the stored one fall on the same
/// calendar date. An unparseable stored date never matches.
fn dob_matches(input: &ClientFields, existing: &ClientRecord) -> bool {
    match parse_calendar_date(&existing.date_of_birth) {
        Some(existing_dob) => input.date_of_birth.date_naive() == existing_dob,
        None => false,
    }
}

/// Similarity ratios for (first, last) name over normalized forms
fn name_similarities(input: &ClientFields, existing: &ClientRecord) -> (f64, f64) {
    let first = similarity_ratio(
        &normalize_text(&input.first_name),
        &normalize_text(&existing.first_name),
    );
    let last = similarity_ratio(
        &normalize_text(&input.last_name),
        &normalize_text(&existing.last_name),
    );
    (first, last)
}

/// Exact detector: normalized name, calendar DOB and normalized phone all equal
pub fn exact_match(input: &ClientFields, existing: &ClientRecord) -> Option<MatchCandidate> {
    let name_match = normalize_text(&input.first_name) == normalize_text(&existing.first_name)
        && normalize_text(&input.last_name) == normalize_text(&existing.last_name);

    let phone_match =
        normalize_phone(&input.primary_phone) == normalize_phone(&existing.primary_phone);

    if name_match && dob_matches(input, existing) && phone_match {
        return Some(MatchCandidate::new(
            existing,
            MatchType::Exact,
            EXACT_CONFIDENCE,
            vec![
                MatchField::FirstName,
                MatchField::LastName,
                MatchField::DateOfBirth,
                MatchField::PrimaryPhone,
            ],
        ));
    }

    None
}

/// Phonetic detector: both name Soundex codes equal plus calendar DOB equal
pub fn phonetic_match(input: &ClientFields, existing: &ClientRecord) -> Option<MatchCandidate> {
    let name_match = soundex(&input.first_name) == soundex(&existing.first_name)
        && soundex(&input.last_name) == soundex(&existing.last_name);

    if name_match && dob_matches(input, existing) {
        return Some(MatchCandidate::new(
            existing,
            MatchType::Phonetic,
            PHONETIC_CONFIDENCE,
            vec![
                MatchField::FirstName,
                MatchField::LastName,
                MatchField::DateOfBirth,
            ],
        ));
    }

    None
}

/// Fuzzy detector: both names at least 80% similar plus calendar DOB equal
pub fn fuzzy_match(input: &ClientFields, existing: &ClientRecord) -> Option<MatchCandidate> {
    let (first_similarity, last_similarity) = name_similarities(input, existing);

    let names_similar =
        first_similarity >= FUZZY_NAME_THRESHOLD && last_similarity >= FUZZY_NAME_THRESHOLD;

    if names_similar && dob_matches(input, existing) {
        let avg_similarity = (first_similarity + last_similarity) / 2.0;
        return Some(MatchCandidate::new(
            existing,
            MatchType::Fuzzy,
            avg_similarity * FUZZY_SCALE,
            vec![
                MatchField::FirstName,
                MatchField::LastName,
                MatchField::DateOfBirth,
            ],
        ));
    }

    None
}

/// Partial-DOB detector: same birth year and month (day may differ) with
/// names at least 70% similar
pub fn partial_dob_match(input: &ClientFields, existing: &ClientRecord) -> Option<MatchCandidate> {
    let existing_dob = match parse_calendar_date(&existing.date_of_birth) {
        Some(dob) => dob,
        None => return None,
    };

    let input_dob = input.date_of_birth.date_naive();
    let year_month_match =
        input_dob.year() == existing_dob.year() && input_dob.month() == existing_dob.month();

    if !year_month_match {
        return None;
    }

    let (first_similarity, last_similarity) = name_similarities(input, existing);
    let names_similar = first_similarity >= PARTIAL_DOB_NAME_THRESHOLD
        && last_similarity >= PARTIAL_DOB_NAME_THRESHOLD;

    if names_similar {
        return Some(MatchCandidate::new(
            existing,
            MatchType::PartialDob,
            PARTIAL_DOB_CONFIDENCE,
            vec![
                MatchField::FirstName,
                MatchField::LastName,
                MatchField::Year,
                MatchField::Month,
            ],
        ));
    }

    None
}

/// Address detector: same street line and postal code with names at least
/// 60% similar. Absent or blank address fields on either side never match.
pub fn address_match(input: &ClientFields, existing: &ClientRecord) -> Option<MatchCandidate> {
    let (input_street, input_zip) = match (&input.address_street1, &input.address_zip_code) {
        (Some(street), Some(zip)) => (normalize_text(street), normalize_text(zip)),
        _ => return None,
    };

    let (existing_street, existing_zip) =
        match (&existing.address_street1, &existing.address_zip_code) {
            (Some(street), Some(zip)) => (normalize_text(street), normalize_text(zip)),
            _ => return None,
        };

    if input_street.is_empty() || input_zip.is_empty() {
        return None;
    }

    if input_street != existing_street || input_zip != existing_zip {
        return None;
    }

    let (first_similarity, last_similarity) = name_similarities(input, existing);
    let names_similar =
        first_similarity >= ADDRESS_NAME_THRESHOLD && last_similarity >= ADDRESS_NAME_THRESHOLD;

    if names_similar {
        return Some(MatchCandidate::new(
            existing,
            MatchType::Address,
            ADDRESS_CONFIDENCE,
            vec![
                MatchField::AddressStreet1,
                MatchField::AddressZipCode,
                MatchField::Name,
            ],
        ));
    }

    None
}
