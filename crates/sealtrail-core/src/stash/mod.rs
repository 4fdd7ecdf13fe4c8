//! Multi-contract facade over ledgers, storage and schemas.
//!
//! A [`Stash`] holds every contract the caller knows. Mutations of one
//! contract (`call`, `include`, `sync`, `import`) are serialized by a
//! per-contract async writer lock and applied to a private copy of the
//! ledger; the copy is persisted and then published as the new snapshot.
//! Readers (`state`, `export`, `ledger`) never wait for writers: they see
//! the last published snapshot, never a half-applied mutation.

// Lock poisoning indicates a panic in another thread, which is unrecoverable.
#![allow(clippy::missing_panics_doc)]


use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::StashConfig;
use crate::consignment::{self, Consignment, ExportError, ImportContext, ImportError};
use crate::contract::{
    ContractId, Operation, OperationId, SchemaId, SealDefinition, SignedGenesis, Witness,
    WitnessId, WitnessStatus,
};
use crate::crypto::{Ed25519Validator, SignatureValidator};
use crate::ledger::{CallParams, Ledger, LedgerError, SyncReport};
use crate::resolver::WitnessResolver;
use crate::schema::{Schema, SchemaError, SchemaRegistry, standard};
use crate::state::{self, ContractStateView, StateFilter};
use crate::store::{ContractRecord, LedgerStore, MemoryStore, SqliteStore, StoreError};
use crate::validation::Validator;

/// Errors raised by stash operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StashError {
    /// The contract is not in the stash.
    #[error("unknown contract {0}")]
    UnknownContract(ContractId),

    /// The contract was already issued or imported.
    #[error("contract {0} already exists")]
    ContractExists(ContractId),

    /// The genesis signature does not verify.
    #[error("issuer signature of contract {0} is invalid")]
    InvalidSignature(ContractId),

    /// Schema registration or lookup failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A ledger mutation was rejected.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A consignment was rejected.
    #[error(transparent)]
    Import(#[from] ImportError),

    /// A consignment could not be built.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Persistence failed; the published state is unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of [`Stash::import`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub contract_id: ContractId,
    /// Whether the import created the contract.
    pub created: bool,
    pub imported: Vec<OperationId>,
    pub skipped: Vec<OperationId>,
}

struct ContractHandle {
    writer: tokio::sync::Mutex<()>,
    current: RwLock<Arc<Ledger>>,
}

impl ContractHandle {
    fn new(ledger: Ledger) -> Self {
        Self {
            writer: tokio::sync::Mutex::new(()),
            current: RwLock::new(Arc::new(ledger)),
        }
    }

    fn current(&self) -> Arc<Ledger> {
        Arc::clone(&self.current.read().expect("lock poisoned"))
    }

    fn publish(&self, ledger: Ledger) {
        *self.current.write().expect("lock poisoned") = Arc::new(ledger);
    }
}

/// All contracts known to the caller.
pub struct Stash {
    config: StashConfig,
    registry: SchemaRegistry,
    validator: Validator,
    signatures: Arc<dyn SignatureValidator>,
    store: Arc<dyn LedgerStore>,
    contracts: RwLock<HashMap<ContractId, Arc<ContractHandle>>>,
    /// Serializes contract creation.
    creating: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for Stash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stash")
            .field("config", &self.config)
            .field("contracts", &self.contracts().len())
            .finish_non_exhaustive()
    }
}

impl Stash {
    /// Opens the stash described by `config` with the default validator,
    /// Ed25519 issuer signatures and the standard schemas registered.
    ///
    /// Uses a `SQLite` database when `config.database` is set and memory
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or its content
    /// does not restore.
    pub fn open(config: StashConfig) -> Result<Self, StashError> {
        let store: Arc<dyn LedgerStore> = match &config.database {
            Some(path) => Arc::new(SqliteStore::open(path)?),
            None => Arc::new(MemoryStore::new()),
        };
        let stash = Self::with_parts(config, store, Validator::default(), Arc::new(Ed25519Validator))?;
        stash.registry.register(standard::fungible_asset())?;
        stash.registry.register(standard::collectible())?;
        Ok(stash)
    }

    /// Builds a stash from explicit collaborators and restores every
    /// stored contract.
    ///
    /// # Errors
    ///
    /// Returns an error if stored schemas or contracts fail to load.
    pub fn with_parts(
        config: StashConfig,
        store: Arc<dyn LedgerStore>,
        validator: Validator,
        signatures: Arc<dyn SignatureValidator>,
    ) -> Result<Self, StashError> {
        let registry = SchemaRegistry::new();
        for schema in store.schemas()? {
            registry.register(schema)?;
        }

        let mut contracts = HashMap::new();
        for record in store.contracts()? {
            let contract_id = record.contract_id();
            let schema = registry.get(&record.genesis.genesis.schema_id)?;
            let nodes = store.operations(contract_id)?;
            let ledger = Ledger::restore(
                record.genesis,
                schema,
                validator.clone(),
                record.min_confirmations,
                nodes,
            )?;
            contracts.insert(contract_id, Arc::new(ContractHandle::new(ledger)));
        }
        info!(
            contracts = contracts.len(),
            schemas = registry.len(),
            "opened stash"
        );

        Ok(Self {
            config,
            registry,
            validator,
            signatures,
            store,
            contracts: RwLock::new(contracts),
            creating: tokio::sync::Mutex::new(()),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &StashConfig {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Registers and stores a schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema is invalid, conflicts or cannot be
    /// stored.
    pub fn register_schema(&self, schema: Schema) -> Result<SchemaId, StashError> {
        self.store.put_schema(&schema)?;
        Ok(self.registry.register(schema)?)
    }

    /// Identifiers of all contracts, sorted.
    #[must_use]
    pub fn contracts(&self) -> Vec<ContractId> {
        let mut ids: Vec<ContractId> = self
            .contracts
            .read()
            .expect("lock poisoned")
            .keys()
            .copied()
            .collect();
        ids.sort();
        ids
    }

    /// The published snapshot of a contract.
    ///
    /// # Errors
    ///
    /// Returns [`StashError::UnknownContract`] if the contract is not here.
    pub fn ledger(&self, contract_id: ContractId) -> Result<Arc<Ledger>, StashError> {
        Ok(self.handle(contract_id)?.current())
    }

    /// Issues a new contract from a signed genesis.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature is invalid, the schema unknown,
    /// the genesis invalid or the contract already present.
    pub async fn issue(&self, genesis: SignedGenesis) -> Result<ContractId, StashError> {
        let contract_id = genesis.contract_id();
        if !genesis.verify(self.signatures.as_ref()) {
            return Err(StashError::InvalidSignature(contract_id));
        }
        let schema = self.registry.get(&genesis.genesis.schema_id)?;

        let _creating = self.creating.lock().await;
        if self.find(contract_id).is_some() {
            return Err(StashError::ContractExists(contract_id));
        }
        let mut ledger = Ledger::issue(
            genesis,
            schema,
            self.validator.clone(),
            self.config.min_confirmations,
        )?;
        self.create(&mut ledger)?;
        self.insert(ledger);
        Ok(contract_id)
    }

    /// Stages a new operation. See [`Ledger::call`].
    ///
    /// # Errors
    ///
    /// Returns an error if the contract is unknown, the operation invalid
    /// or persistence fails.
    pub async fn call(&self, contract_id: ContractId, params: CallParams) -> Result<Operation, StashError> {
        self.mutate(contract_id, |ledger| ledger.call(params)).await
    }

    /// Anchors a staged operation. See [`Ledger::include`].
    ///
    /// # Errors
    ///
    /// Returns an error if the contract is unknown, the witness rejected
    /// or persistence fails.
    pub async fn include(
        &self,
        contract_id: ContractId,
        opid: OperationId,
        witness: Witness,
    ) -> Result<(), StashError> {
        self.mutate(contract_id, |ledger| ledger.include(&opid, witness)).await
    }

    /// Applies witness status updates to one contract. See [`Ledger::sync`].
    ///
    /// # Errors
    ///
    /// Returns an error if the contract is unknown or persistence fails.
    pub async fn sync(
        &self,
        contract_id: ContractId,
        updates: &[(WitnessId, WitnessStatus)],
    ) -> Result<SyncReport, StashError> {
        self.mutate(contract_id, |ledger| Ok(ledger.sync(updates))).await
    }

    /// Applies witness status updates to every contract and returns the
    /// reports that changed something.
    ///
    /// # Errors
    ///
    /// Returns the first persistence failure; contracts synced before it
    /// keep their new state.
    pub async fn sync_all(
        &self,
        updates: &[(WitnessId, WitnessStatus)],
    ) -> Result<Vec<(ContractId, SyncReport)>, StashError> {
        let mut reports = Vec::new();
        for contract_id in self.contracts() {
            let report = self.sync(contract_id, updates).await?;
            if !report.is_empty() {
                reports.push((contract_id, report));
            }
        }
        Ok(reports)
    }

    /// Imports a consignment, creating the contract if it is new.
    ///
    /// # Errors
    ///
    /// Returns an error if the consignment is rejected or persistence
    /// fails. Nothing is merged in either case.
    pub async fn import(
        &self,
        consignment: &Consignment,
        resolver: &dyn WitnessResolver,
    ) -> Result<ImportReport, StashError> {
        let contract_id = consignment.contract_id;
        let ctx = ImportContext {
            registry: &self.registry,
            validator: &self.validator,
            resolver,
            signatures: self.signatures.as_ref(),
            timeout: self.config.resolver_timeout(),
            min_confirmations: self.config.min_confirmations,
            max_operations: self.config.max_consignment_operations,
        };

        let handle = match self.find(contract_id) {
            Some(handle) => handle,
            None => {
                let _creating = self.creating.lock().await;
                match self.find(contract_id) {
                    Some(handle) => handle,
                    None => {
                        let mut outcome = consignment::import(None, consignment, &ctx).await?;
                        self.create(&mut outcome.ledger)?;
                        self.insert(outcome.ledger);
                        return Ok(ImportReport {
                            contract_id,
                            created: true,
                            imported: outcome.imported,
                            skipped: outcome.skipped,
                        });
                    },
                }
            },
        };

        let _writer = handle.writer.lock().await;
        let current = handle.current();
        let mut outcome = consignment::import(Some(&current), consignment, &ctx).await?;
        self.persist(&mut outcome.ledger)?;
        handle.publish(outcome.ledger);
        Ok(ImportReport {
            contract_id,
            created: false,
            imported: outcome.imported,
            skipped: outcome.skipped,
        })
    }

    /// Exports the history of `terminals`.
    ///
    /// # Errors
    ///
    /// Returns an error if the contract is unknown or the history cannot
    /// be exported.
    pub fn export(
        &self,
        contract_id: ContractId,
        terminals: &BTreeSet<SealDefinition>,
    ) -> Result<Consignment, StashError> {
        let ledger = self.ledger(contract_id)?;
        Ok(consignment::export(&ledger, terminals)?)
    }

    /// Projects the current state of a contract.
    ///
    /// # Errors
    ///
    /// Returns [`StashError::UnknownContract`] if the contract is not here.
    pub fn state(&self, contract_id: ContractId, filter: &StateFilter) -> Result<ContractStateView, StashError> {
        let ledger = self.ledger(contract_id)?;
        Ok(state::project(&ledger, filter))
    }

    fn find(&self, contract_id: ContractId) -> Option<Arc<ContractHandle>> {
        self.contracts
            .read()
            .expect("lock poisoned")
            .get(&contract_id)
            .cloned()
    }

    fn handle(&self, contract_id: ContractId) -> Result<Arc<ContractHandle>, StashError> {
        self.find(contract_id)
            .ok_or(StashError::UnknownContract(contract_id))
    }

    fn insert(&self, ledger: Ledger) {
        let contract_id = ledger.contract_id();
        self.contracts
            .write()
            .expect("lock poisoned")
            .insert(contract_id, Arc::new(ContractHandle::new(ledger)));
    }

    /// Stores a new contract with its schema and operations.
    fn create(&self, ledger: &mut Ledger) -> Result<(), StashError> {
        self.store.put_schema(ledger.schema())?;
        self.store.put_contract(&ContractRecord {
            genesis: ledger.genesis().clone(),
            min_confirmations: ledger.min_confirmations(),
        })?;
        self.persist(ledger)?;
        info!(contract_id = %ledger.contract_id(), "added contract");
        Ok(())
    }

    fn persist(&self, ledger: &mut Ledger) -> Result<(), StashError> {
        let changes = ledger.take_changes();
        if !changes.is_empty() {
            self.store.put_operations(ledger.contract_id(), &changes)?;
            debug!(contract_id = %ledger.contract_id(), nodes = changes.len(), "persisted operations");
        }
        Ok(())
    }

    /// Applies `mutation` to a private copy of the ledger under the writer
    /// lock, persists it, then publishes it.
    async fn mutate<T>(
        &self,
        contract_id: ContractId,
        mutation: impl FnOnce(&mut Ledger) -> Result<T, LedgerError> + Send,
    ) -> Result<T, StashError> {
        let handle = self.handle(contract_id)?;
        let _writer = handle.writer.lock().await;
        let mut ledger = Ledger::clone(&handle.current());
        let value = mutation(&mut ledger)?;
        self.persist(&mut ledger)?;
        handle.publish(ledger);
        Ok(value)
    }
}
