//! In-memory storage.

// Mutex poisoning indicates a panic in another thread, which is unrecoverable.
#![allow(clippy::missing_panics_doc)]

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use super::{ContractRecord, LedgerStore, StoreError};
use crate::contract::{ContractId, OperationId, SchemaId};
use crate::ledger::OpNode;
use crate::schema::Schema;

#[derive(Debug, Default)]
struct Inner {
    schemas: BTreeMap<SchemaId, Schema>,
    contracts: BTreeMap<ContractId, ContractRecord>,
    operations: HashMap<ContractId, HashMap<OperationId, OpNode>>,
}

/// Storage that lives as long as the process. Used when no database is
/// configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn put_schema(&self, schema: &Schema) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.schemas.entry(schema.id()).or_insert_with(|| schema.clone());
        Ok(())
    }

    fn schemas(&self) -> Result<Vec<Schema>, StoreError> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.schemas.values().cloned().collect())
    }

    fn put_contract(&self, record: &ContractRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner
            .contracts
            .entry(record.contract_id())
            .or_insert_with(|| record.clone());
        Ok(())
    }

    fn contracts(&self) -> Result<Vec<ContractRecord>, StoreError> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.contracts.values().cloned().collect())
    }

    fn put_operations(&self, contract_id: ContractId, nodes: &[OpNode]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("lock poisoned");
        if !inner.contracts.contains_key(&contract_id) {
            return Err(StoreError::UnknownContract(contract_id));
        }
        let operations = inner.operations.entry(contract_id).or_default();
        for node in nodes {
            operations.insert(node.id(), node.clone());
        }
        Ok(())
    }

    fn operations(&self, contract_id: ContractId) -> Result<Vec<OpNode>, StoreError> {
        let inner = self.inner.read().expect("lock poisoned");
        let mut nodes: Vec<OpNode> = inner
            .operations
            .get(&contract_id)
            .map(|operations| operations.values().cloned().collect())
            .unwrap_or_default();
        nodes.sort_by_key(|node| node.seq);
        Ok(nodes)
    }

    fn get_operation(
        &self,
        contract_id: ContractId,
        opid: &OperationId,
    ) -> Result<Option<OpNode>, StoreError> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner
            .operations
            .get(&contract_id)
            .and_then(|operations| operations.get(opid))
            .cloned())
    }
}
