//! `SQLite`-backed storage.

// Sequence numbers and confirmation counts are stored as i64 but never negative.
// Mutex poisoning indicates a panic in another thread, which is unrecoverable.
#![allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::missing_panics_doc
)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};

use super::{ContractRecord, LedgerStore, StoreError};
use crate::codec;
use crate::contract::{ContractId, OperationId};
use crate::ledger::OpNode;
use crate::schema::Schema;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

const SELECT_OPERATION: &str = "SELECT seq, state, body, witness, status FROM operations";

/// Storage in a single `SQLite` database in WAL mode.
///
/// Clones share the connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.path).finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens or creates a database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates a database that lives only as long as the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the database runs in WAL mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the pragma query fails.
    pub fn verify_wal_mode(&self) -> Result<bool, StoreError> {
        let conn = self.conn.lock().expect("lock poisoned");
        let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        Ok(mode.eq_ignore_ascii_case("wal"))
    }
}

/// Raw columns of an operation row, decoded outside the row callback.
struct OperationRow {
    seq: i64,
    state: String,
    body: Vec<u8>,
    witness: Option<Vec<u8>>,
    status: Option<Vec<u8>>,
}

impl OperationRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            state: row.get(1)?,
            body: row.get(2)?,
            witness: row.get(3)?,
            status: row.get(4)?,
        })
    }

    fn decode(self) -> Result<OpNode, StoreError> {
        Ok(OpNode {
            seq: self.seq as u64,
            operation: codec::from_slice(&self.body)?,
            state: self.state.parse().map_err(StoreError::Corrupted)?,
            witness: self.witness.as_deref().map(codec::from_slice).transpose()?,
            status: self.status.as_deref().map(codec::from_slice).transpose()?,
        })
    }
}

impl LedgerStore for SqliteStore {
    fn put_schema(&self, schema: &Schema) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("lock poisoned");
        conn.execute(
            "INSERT OR IGNORE INTO schemas (schema_id, body) VALUES (?1, ?2)",
            params![schema.id().as_bytes().as_slice(), codec::to_vec(schema)],
        )?;
        Ok(())
    }

    fn schemas(&self) -> Result<Vec<Schema>, StoreError> {
        let conn = self.conn.lock().expect("lock poisoned");
        let mut stmt = conn.prepare("SELECT body FROM schemas ORDER BY schema_id")?;
        let bodies = stmt
            .query_map([], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        bodies
            .iter()
            .map(|body| codec::from_slice(body).map_err(StoreError::from))
            .collect()
    }

    fn put_contract(&self, record: &ContractRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("lock poisoned");
        conn.execute(
            "INSERT OR IGNORE INTO contracts (contract_id, schema_id, genesis, min_confirmations)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.contract_id().as_bytes().as_slice(),
                record.genesis.genesis.schema_id.as_bytes().as_slice(),
                codec::to_vec(&record.genesis),
                i64::from(record.min_confirmations),
            ],
        )?;
        Ok(())
    }

    fn contracts(&self) -> Result<Vec<ContractRecord>, StoreError> {
        let conn = self.conn.lock().expect("lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT genesis, min_confirmations FROM contracts ORDER BY contract_id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(genesis, min_confirmations)| {
                Ok(ContractRecord {
                    genesis: codec::from_slice(&genesis)?,
                    min_confirmations: u32::try_from(min_confirmations).map_err(|_| {
                        StoreError::Corrupted(format!("min_confirmations {min_confirmations}"))
                    })?,
                })
            })
            .collect()
    }

    fn put_operations(&self, contract_id: ContractId, nodes: &[OpNode]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().expect("lock poisoned");
        let tx = conn.transaction()?;

        let known = tx
            .query_row(
                "SELECT 1 FROM contracts WHERE contract_id = ?1",
                params![contract_id.as_bytes().as_slice()],
                |_| Ok(()),
            )
            .optional()?;
        if known.is_none() {
            return Err(StoreError::UnknownContract(contract_id));
        }

        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO operations (contract_id, opid, seq, state, body, witness, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for node in nodes {
                stmt.execute(params![
                    contract_id.as_bytes().as_slice(),
                    node.id().as_bytes().as_slice(),
                    node.seq as i64,
                    node.state.as_str(),
                    codec::to_vec(&node.operation),
                    node.witness.as_ref().map(codec::to_vec),
                    node.status.as_ref().map(codec::to_vec),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn operations(&self, contract_id: ContractId) -> Result<Vec<OpNode>, StoreError> {
        let conn = self.conn.lock().expect("lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "{SELECT_OPERATION} WHERE contract_id = ?1 ORDER BY seq ASC"
        ))?;
        let rows = stmt
            .query_map(params![contract_id.as_bytes().as_slice()], OperationRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(OperationRow::decode).collect()
    }

    fn get_operation(
        &self,
        contract_id: ContractId,
        opid: &OperationId,
    ) -> Result<Option<OpNode>, StoreError> {
        let conn = self.conn.lock().expect("lock poisoned");
        let row = conn
            .query_row(
                &format!("{SELECT_OPERATION} WHERE contract_id = ?1 AND opid = ?2"),
                params![contract_id.as_bytes().as_slice(), opid.as_bytes().as_slice()],
                OperationRow::read,
            )
            .optional()?;
        row.map(OperationRow::decode).transpose()
    }
}
