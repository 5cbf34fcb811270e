use tracing::info;

use super::core::Database;
use crate::merge::DependentRecord;
use crate::TARGET_DB;

impl Database {
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clients (
                id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                date_of_birth TEXT NOT NULL,
                primary_phone TEXT NOT NULL,
                address_street1 TEXT,
                address_zip_code TEXT,
                is_merged INTEGER NOT NULL DEFAULT 0,
                merged_into TEXT,
                merged_at TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (merged_into) REFERENCES clients (id)
            );
            CREATE INDEX IF NOT EXISTS idx_clients_is_merged ON clients (is_merged);
            CREATE INDEX IF NOT EXISTS idx_clients_last_name ON clients (last_name);

            -- Suspected duplicate pairs awaiting human review. The pair key is
            -- stored in canonical order (smaller id first) and the unique index
            -- is the authoritative guard against double detection.
            CREATE TABLE IF NOT EXISTS potential_duplicates (
                id TEXT PRIMARY KEY,
                client1_id TEXT NOT NULL,
                client2_id TEXT NOT NULL,
                match_type TEXT NOT NULL, -- EXACT, PHONETIC, FUZZY, PARTIAL_DOB, ADDRESS
                confidence_score REAL NOT NULL,
                match_fields TEXT NOT NULL, -- JSON array of contributing field tags
                status TEXT NOT NULL DEFAULT 'PENDING', -- PENDING, MERGED, DISMISSED
                reviewed_by TEXT,
                reviewed_at TEXT,
                resolution_notes TEXT,
                created_at TEXT NOT NULL,
                UNIQUE (client1_id, client2_id),
                FOREIGN KEY (client1_id) REFERENCES clients (id),
                FOREIGN KEY (client2_id) REFERENCES clients (id)
            );
            CREATE INDEX IF NOT EXISTS idx_potential_duplicates_status ON potential_duplicates (status);
            CREATE INDEX IF NOT EXISTS idx_potential_duplicates_confidence ON potential_duplicates (confidence_score);
            "#,
        )
        .execute(&mut *conn)
        .await?;

        // One table per dependent record type; the merge relocates the owning
        // client_id on each of these.
        for record in DependentRecord::ALL {
            let table = record.table();
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    client_id TEXT NOT NULL,
                    payload TEXT,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (client_id) REFERENCES clients (id)
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_client_id ON {table} (client_id);
                "#
            ))
            .execute(&mut *conn)
            .await?;
        }

        info!(target: TARGET_DB, "Tables ensured to exist");

        Ok(())
    }
}
