use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::core::Database;
use crate::matching::types::{ClientFields, ClientRecord};
use crate::merge::DependentRecord;
use crate::TARGET_DB;

const CLIENT_COLUMNS: &str = "id, first_name, last_name, date_of_birth, primary_phone, \
     address_street1, address_zip_code, is_merged, merged_into, merged_at";

pub(crate) fn client_from_row(row: &SqliteRow) -> ClientRecord {
    ClientRecord {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        date_of_birth: row.get("date_of_birth"),
        primary_phone: row.get("primary_phone"),
        address_street1: row.get("address_street1"),
        address_zip_code: row.get("address_zip_code"),
        is_merged: row.get("is_merged"),
        merged_into: row.get("merged_into"),
        merged_at: row.get("merged_at"),
    }
}

impl Database {
    /// Register a new client record and return its generated id
    #[instrument(target = "db_query", level = "debug", skip(self, fields))]
    pub async fn add_client(&self, fields: &ClientFields) -> Result<String, sqlx::Error> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO clients
            (id, first_name, last_name, date_of_birth, primary_phone,
             address_street1, address_zip_code, is_merged, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)
            "#,
        )
        .bind(&id)
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(fields.date_of_birth.date_naive().to_string())
        .bind(&fields.primary_phone)
        .bind(&fields.address_street1)
        .bind(&fields.address_zip_code)
        .bind(&now)
        .execute(self.pool())
        .await?;

        debug!(target: TARGET_DB, "Registered client {}", id);

        Ok(id)
    }

    pub async fn get_client(&self, client_id: &str) -> Result<Option<ClientRecord>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1"
        ))
        .bind(client_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|r| client_from_row(&r)))
    }

    /// All clients that have not been merged away, optionally excluding one
    /// identifier (used when re-checking an existing client against the rest
    /// of the population).
    pub async fn list_active_clients(
        &self,
        exclude_client_id: Option<&str>,
    ) -> Result<Vec<ClientRecord>, sqlx::Error> {
        let rows = match exclude_client_id {
            Some(exclude) => {
                sqlx::query(&format!(
                    "SELECT {CLIENT_COLUMNS} FROM clients WHERE is_merged = 0 AND id != ?1"
                ))
                .bind(exclude)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {CLIENT_COLUMNS} FROM clients WHERE is_merged = 0"
                ))
                .fetch_all(self.pool())
                .await?
            }
        };

        Ok(rows.iter().map(client_from_row).collect())
    }

    /// Attach a dependent record (appointment, note, charge, ...) to a client
    pub async fn add_dependent_record(
        &self,
        record: DependentRecord,
        client_id: &str,
        payload: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(&format!(
            "INSERT INTO {} (client_id, payload, created_at) VALUES (?1, ?2, ?3)",
            record.table()
        ))
        .bind(client_id)
        .bind(payload)
        .bind(&now)
        .execute(self.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn count_dependent_records(
        &self,
        record: DependentRecord,
        client_id: &str,
    ) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE client_id = ?1",
            record.table()
        ))
        .bind(client_id)
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }
}
