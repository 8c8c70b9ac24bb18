use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// A stored document: primary key pair, optional secondary-index key pair,
/// and a JSON attribute document.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub pk: String,
    pub sk: String,
    pub pk1: Option<String>,
    pub sk1: Option<String>,
    pub attrs: serde_json::Value,
}

/// Embedded key-value document store.
///
/// Items are addressed by the `(pk, sk)` primary key; `(pk1, sk1)` forms a
/// secondary index for partition-wide queries. Reads and writes are
/// independent single statements; there is no cross-operation locking, so a
/// check-then-write sequence is not atomic (see `put_if_absent` for the
/// conditional variant).
#[derive(Clone)]
pub struct DocumentStore {
    conn: Arc<Mutex<Connection>>,
}

impl DocumentStore {
    /// Open the store and create the schema if needed.
    pub fn new(database_path: &str) -> Result<Self> {
        let conn = Connection::open(database_path)
            .context(format!("Failed to open store at {}", database_path))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                pk TEXT NOT NULL,
                sk TEXT NOT NULL,
                pk1 TEXT,
                sk1 TEXT,
                attrs TEXT NOT NULL,
                PRIMARY KEY (pk, sk)
            )",
            [],
        )
        .context("Failed to create documents table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS index_1 ON documents (pk1, sk1)",
            [],
        )
        .context("Failed to create secondary index")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Point lookup by exact primary key.
    pub fn get(&self, pk: &str, sk: &str) -> Result<Option<Record>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT pk, sk, pk1, sk1, attrs FROM documents WHERE pk = ?1 AND sk = ?2",
        )?;

        let record = stmt
            .query_row(params![pk, sk], Self::row_to_record)
            .optional()
            .context("Failed to read document")?;

        record.map(Self::parse_attrs).transpose()
    }

    /// Create or fully overwrite a document.
    pub fn put(&self, record: &Record) -> Result<()> {
        let attrs = serde_json::to_string(&record.attrs)
            .context("Failed to serialize document attributes")?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO documents (pk, sk, pk1, sk1, attrs)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (pk, sk) DO UPDATE SET
                pk1 = excluded.pk1,
                sk1 = excluded.sk1,
                attrs = excluded.attrs",
            params![record.pk, record.sk, record.pk1, record.sk1, attrs],
        )
        .context("Failed to write document")?;

        Ok(())
    }

    /// Conditional write: insert only if no document exists under the key.
    /// Returns `false` (and writes nothing) when the key is already taken.
    pub fn put_if_absent(&self, record: &Record) -> Result<bool> {
        let attrs = serde_json::to_string(&record.attrs)
            .context("Failed to serialize document attributes")?;

        let conn = self.conn.lock().unwrap();
        let inserted = conn
            .execute(
                "INSERT INTO documents (pk, sk, pk1, sk1, attrs)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (pk, sk) DO NOTHING",
                params![record.pk, record.sk, record.pk1, record.sk1, attrs],
            )
            .context("Failed to write document")?;

        Ok(inserted > 0)
    }

    /// Delete by exact primary key. Returns `true` iff a document was removed.
    pub fn delete(&self, pk: &str, sk: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn
            .execute(
                "DELETE FROM documents WHERE pk = ?1 AND sk = ?2",
                params![pk, sk],
            )
            .context("Failed to delete document")?;

        Ok(deleted > 0)
    }

    /// Index-scoped query: all documents sharing a secondary partition key,
    /// ordered by sort key.
    pub fn query_index(&self, pk1: &str) -> Result<Vec<Record>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT pk, sk, pk1, sk1, attrs FROM documents WHERE pk1 = ?1 ORDER BY sk1",
        )?;

        let rows = stmt
            .query_map(params![pk1], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query secondary index")?;

        rows.into_iter().map(Self::parse_attrs).collect()
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, Option<String>, Option<String>, String)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
        ))
    }

    fn parse_attrs(
        (pk, sk, pk1, sk1, attrs): (String, String, Option<String>, Option<String>, String),
    ) -> Result<Record> {
        let attrs = serde_json::from_str(&attrs)
            .context("Stored document attributes are not valid JSON")?;
        Ok(Record {
            pk,
            sk,
            pk1,
            sk1,
            attrs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (DocumentStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test_store.db");
        let store = DocumentStore::new(db_path.to_str().unwrap()).expect("Failed to open store");
        (store, temp_dir)
    }

    fn sample_record(pk: &str) -> Record {
        Record {
            pk: pk.to_string(),
            sk: "profile".to_string(),
            pk1: Some("profile".to_string()),
            sk1: Some(pk.to_string()),
            attrs: serde_json::json!({"name": "Test", "calleeDetails": true}),
        }
    }

    // ==================== Initialization Tests ====================

    #[test]
    fn test_store_creation() {
        let (store, _temp_dir) = create_test_store();
        let result = store.get("missing", "profile").expect("Should read");
        assert!(result.is_none());
    }

    #[test]
    fn test_store_reopening_persists_data() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("persist.db");
        let path_str = db_path.to_str().unwrap();

        {
            let store = DocumentStore::new(path_str).expect("open");
            store.put(&sample_record("+15551234")).expect("put");
        }

        {
            let store = DocumentStore::new(path_str).expect("reopen");
            let record = store.get("+15551234", "profile").expect("get");
            assert!(record.is_some(), "Document should persist across reopen");
        }
    }

    #[test]
    fn test_invalid_store_path() {
        let result = DocumentStore::new("/non/existent/path/store.db");
        assert!(result.is_err());
    }

    // ==================== Point Lookup Tests ====================

    #[test]
    fn test_get_missing_returns_none() {
        let (store, _temp_dir) = create_test_store();
        assert!(store.get("+15550000", "profile").expect("get").is_none());
    }

    #[test]
    fn test_put_then_get_roundtrip() {
        let (store, _temp_dir) = create_test_store();
        let record = sample_record("+15551234");

        store.put(&record).expect("put");
        let fetched = store.get("+15551234", "profile").expect("get").expect("exists");

        assert_eq!(fetched, record);
    }

    #[test]
    fn test_get_distinguishes_sort_key() {
        let (store, _temp_dir) = create_test_store();
        store.put(&sample_record("+15551234")).expect("put");

        assert!(store.get("+15551234", "session").expect("get").is_none());
        assert!(store.get("+15551234", "profile").expect("get").is_some());
    }

    // ==================== Put Tests ====================

    #[test]
    fn test_put_overwrites_existing() {
        let (store, _temp_dir) = create_test_store();
        let mut record = sample_record("+15551234");
        store.put(&record).expect("put");

        record.attrs = serde_json::json!({"name": "Updated"});
        store.put(&record).expect("overwrite");

        let fetched = store.get("+15551234", "profile").expect("get").expect("exists");
        assert_eq!(fetched.attrs["name"], "Updated");
    }

    #[test]
    fn test_put_if_absent_inserts_new() {
        let (store, _temp_dir) = create_test_store();
        let created = store.put_if_absent(&sample_record("+15551234")).expect("put");
        assert!(created);
    }

    #[test]
    fn test_put_if_absent_rejects_existing() {
        let (store, _temp_dir) = create_test_store();
        let record = sample_record("+15551234");
        store.put(&record).expect("put");

        let mut conflicting = record.clone();
        conflicting.attrs = serde_json::json!({"name": "Other"});
        let created = store.put_if_absent(&conflicting).expect("conditional put");

        assert!(!created, "Conditional write must fail on existing key");

        // Original attributes untouched
        let fetched = store.get("+15551234", "profile").expect("get").expect("exists");
        assert_eq!(fetched.attrs["name"], "Test");
    }

    // ==================== Delete Tests ====================

    #[test]
    fn test_delete_existing() {
        let (store, _temp_dir) = create_test_store();
        store.put(&sample_record("+15551234")).expect("put");

        let deleted = store.delete("+15551234", "profile").expect("delete");
        assert!(deleted);
        assert!(store.get("+15551234", "profile").expect("get").is_none());
    }

    #[test]
    fn test_delete_missing_returns_false() {
        let (store, _temp_dir) = create_test_store();
        let deleted = store.delete("+15559999", "profile").expect("delete");
        assert!(!deleted);
    }

    // ==================== Index Query Tests ====================

    #[test]
    fn test_query_index_empty() {
        let (store, _temp_dir) = create_test_store();
        let records = store.query_index("profile").expect("query");
        assert!(records.is_empty());
    }

    #[test]
    fn test_query_index_returns_partition() {
        let (store, _temp_dir) = create_test_store();
        store.put(&sample_record("+15551111")).expect("put");
        store.put(&sample_record("+15552222")).expect("put");

        let other = Record {
            pk: "CA-1".to_string(),
            sk: "session".to_string(),
            pk1: Some("session".to_string()),
            sk1: Some("CA-1".to_string()),
            attrs: serde_json::json!({}),
        };
        store.put(&other).expect("put");

        let records = store.query_index("profile").expect("query");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.pk1.as_deref() == Some("profile")));
    }

    #[test]
    fn test_query_index_orders_by_sort_key() {
        let (store, _temp_dir) = create_test_store();
        store.put(&sample_record("+15553333")).expect("put");
        store.put(&sample_record("+15551111")).expect("put");
        store.put(&sample_record("+15552222")).expect("put");

        let records = store.query_index("profile").expect("query");
        let keys: Vec<&str> = records.iter().map(|r| r.pk.as_str()).collect();
        assert_eq!(keys, vec!["+15551111", "+15552222", "+15553333"]);
    }

    #[test]
    fn test_query_index_excludes_unindexed_documents() {
        let (store, _temp_dir) = create_test_store();
        let unindexed = Record {
            pk: "k".to_string(),
            sk: "v".to_string(),
            pk1: None,
            sk1: None,
            attrs: serde_json::json!({"raw": true}),
        };
        store.put(&unindexed).expect("put");

        assert!(store.query_index("profile").expect("query").is_empty());
        // Still reachable by point lookup
        assert!(store.get("k", "v").expect("get").is_some());
    }

    // ==================== Attribute Document Tests ====================

    #[test]
    fn test_attrs_preserve_nested_json() {
        let (store, _temp_dir) = create_test_store();
        let record = Record {
            pk: "+15551234".to_string(),
            sk: "profile".to_string(),
            pk1: Some("profile".to_string()),
            sk1: Some("+15551234".to_string()),
            attrs: serde_json::json!({
                "name": "O'Brien \"The Caller\"",
                "calleeDetails": false,
                "nested": {"list": [1, 2, 3]}
            }),
        };

        store.put(&record).expect("put");
        let fetched = store.get("+15551234", "profile").expect("get").expect("exists");
        assert_eq!(fetched.attrs, record.attrs);
    }

    #[test]
    fn test_sql_injection_in_keys_is_inert() {
        let (store, _temp_dir) = create_test_store();
        let mut record = sample_record("x'; DROP TABLE documents; --");
        record.sk1 = Some(record.pk.clone());
        store.put(&record).expect("put");

        let fetched = store
            .get("x'; DROP TABLE documents; --", "profile")
            .expect("get");
        assert!(fetched.is_some());
    }

    // ==================== Concurrency Tests ====================

    #[test]
    fn test_store_clone_shares_connection() {
        let (store, _temp_dir) = create_test_store();
        let store_clone = store.clone();

        store.put(&sample_record("+15551234")).expect("put");
        assert!(store_clone.get("+15551234", "profile").expect("get").is_some());
    }

    #[test]
    fn test_concurrent_reads_and_writes() {
        let (store, _temp_dir) = create_test_store();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..20 {
                        let record = Record {
                            pk: format!("+1555{}{:03}", i, j),
                            sk: "profile".to_string(),
                            pk1: Some("profile".to_string()),
                            sk1: Some(format!("+1555{}{:03}", i, j)),
                            attrs: serde_json::json!({"i": i, "j": j}),
                        };
                        store.put(&record).expect("put");
                        let _ = store.query_index("profile").expect("query");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("Thread should complete");
        }

        let records = store.query_index("profile").expect("query");
        assert_eq!(records.len(), 160);
    }
}
