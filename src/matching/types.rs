use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Detection algorithm that produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    Exact,
    Phonetic,
    Fuzzy,
    PartialDob,
    Address,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Exact => write!(f, "EXACT"),
            MatchType::Phonetic => write!(f, "PHONETIC"),
            MatchType::Fuzzy => write!(f, "FUZZY"),
            MatchType::PartialDob => write!(f, "PARTIAL_DOB"),
            MatchType::Address => write!(f, "ADDRESS"),
        }
    }
}

impl From<&str> for MatchType {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "EXACT" => MatchType::Exact,
            "PHONETIC" => MatchType::Phonetic,
            "PARTIAL_DOB" => MatchType::PartialDob,
            "ADDRESS" => MatchType::Address,
            _ => MatchType::Fuzzy,
        }
    }
}

/// Field that contributed to a match decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchField {
    FirstName,
    LastName,
    DateOfBirth,
    PrimaryPhone,
    Year,
    Month,
    AddressStreet1,
    AddressZipCode,
    Name,
}

impl fmt::Display for MatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchField::FirstName => write!(f, "firstName"),
            MatchField::LastName => write!(f, "lastName"),
            MatchField::DateOfBirth => write!(f, "dateOfBirth"),
            MatchField::PrimaryPhone => write!(f, "primaryPhone"),
            MatchField::Year => write!(f, "year"),
            MatchField::Month => write!(f, "month"),
            MatchField::AddressStreet1 => write!(f, "addressStreet1"),
            MatchField::AddressZipCode => write!(f, "addressZipCode"),
            MatchField::Name => write!(f, "name"),
        }
    }
}

impl From<&str> for MatchField {
    fn from(s: &str) -> Self {
        match s {
            "firstName" => MatchField::FirstName,
            "lastName" => MatchField::LastName,
            "dateOfBirth" => MatchField::DateOfBirth,
            "primaryPhone" => MatchField::PrimaryPhone,
            "year" => MatchField::Year,
            "month" => MatchField::Month,
            "addressStreet1" => MatchField::AddressStreet1,
            "addressZipCode" => MatchField::AddressZipCode,
            _ => MatchField::Name,
        }
    }
}

/// One registered client as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,
    pub first_name: String,
    pub last_name: String,

    // Calendar date stored as text; comparisons parse it best-effort
    pub date_of_birth: String,
    pub primary_phone: String,
    pub address_street1: Option<String>,
    pub address_zip_code: Option<String>,

    // Once merged the record is excluded from scans and from being a
    // merge target; merged_into points at the surviving record.
    pub is_merged: bool,
    pub merged_into: Option<String>,
    pub merged_at: Option<String>,
}

/// Client intake fields fed to the duplicate scanner
#[derive(Debug, Clone)]
pub struct ClientFields {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: DateTime<Utc>,
    pub primary_phone: String,
    pub address_street1: Option<String>,
    pub address_zip_code: Option<String>,
}

/// Result of one detector run against one existing client.
///
/// Transient: lives only for the scan call that produced it.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub client_id: String,
    pub match_type: MatchType,

    // In (0, 1]; the sole ranking key for the review queue
    pub confidence: f64,
    pub fields: Vec<MatchField>,
    pub matched_client: ClientRecord,
}

impl MatchCandidate {
    pub fn new(
        matched_client: &ClientRecord,
        match_type: MatchType,
        confidence: f64,
        fields: Vec<MatchField>,
    ) -> Self {
        MatchCandidate {
            client_id: matched_client.id.clone(),
            match_type,
            confidence,
            fields,
            matched_client: matched_client.clone(),
        }
    }
}
