//! Durable storage for contracts and their operation graphs.
//!
//! A [`LedgerStore`] keeps three things: registered schemas, contract
//! genesis records, and operation nodes keyed by contract and operation id.
//! Ledgers are rebuilt from these on startup with
//! [`Ledger::restore`](crate::ledger::Ledger::restore); projections are never
//! stored, since replay derives them.

mod memory;
mod sqlite;


pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
use thiserror::Error;

use crate::codec::CodecError;
use crate::contract::{ContractId, OperationId, SignedGenesis};
use crate::ledger::OpNode;
use crate::schema::Schema;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored blob failed to decode.
    #[error("stored record failed to decode: {0}")]
    Codec(#[from] CodecError),

    /// A stored record is inconsistent.
    #[error("corrupted record: {0}")]
    Corrupted(String),

    /// An operation was stored for a contract that is not stored.
    #[error("unknown contract {0}")]
    UnknownContract(ContractId),
}

/// What is persisted per contract besides its operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractRecord {
    pub genesis: SignedGenesis,
    pub min_confirmations: u32,
}

impl ContractRecord {
    #[must_use]
    pub fn contract_id(&self) -> ContractId {
        self.genesis.contract_id()
    }
}

/// Get/put persistence by contract and operation id.
///
/// Implementations must make each call atomic: a failed `put_operations`
/// stores none of the nodes.
pub trait LedgerStore: Send + Sync {
    /// Stores a schema. Storing the same schema again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn put_schema(&self, schema: &Schema) -> Result<(), StoreError>;

    /// All stored schemas.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or a record is corrupted.
    fn schemas(&self) -> Result<Vec<Schema>, StoreError>;

    /// Stores a contract. Storing the same contract again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn put_contract(&self, record: &ContractRecord) -> Result<(), StoreError>;

    /// All stored contracts.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or a record is corrupted.
    fn contracts(&self) -> Result<Vec<ContractRecord>, StoreError>;

    /// Inserts or replaces operation nodes of a stored contract.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownContract`] if the contract is not
    /// stored, or an error if the backend fails.
    fn put_operations(&self, contract_id: ContractId, nodes: &[OpNode]) -> Result<(), StoreError>;

    /// Operation nodes of a contract in sequence order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or a record is corrupted.
    fn operations(&self, contract_id: ContractId) -> Result<Vec<OpNode>, StoreError>;

    /// A single operation node.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the record is corrupted.
    fn get_operation(
        &self,
        contract_id: ContractId,
        opid: &OperationId,
    ) -> Result<Option<OpNode>, StoreError>;
}
