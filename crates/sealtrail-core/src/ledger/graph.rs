//! The ledger proper: issue, call, include, accept and sync.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::LedgerError;
use super::node::{OpNode, OpState};
use super::projection::Projection;
use crate::contract::{
    ContractId, Extension, GlobalState, Operation, OperationId, OperationKind, OwnedAssignments,
    SealDefinition, SignedGenesis, StateValue, Transition, TypeName, Witness, WitnessId,
    WitnessStatus,
};
use crate::resolver::ChainEvidence;
use crate::schema::Schema;
use crate::validation::{
    EmptyView, SealEntry, StateView, ValidationOutcome, Validator, WitnessBinding,
};

/// Caller-supplied content of a new transition or extension.
#[derive(Clone, Debug)]
pub struct CallParams {
    class: OperationKind,
    kind: TypeName,
    inputs: BTreeSet<SealDefinition>,
    globals: GlobalState,
    assignments: OwnedAssignments,
    nonce: u64,
}

impl CallParams {
    /// A transition of the named kind.
    pub fn transition(kind: TypeName) -> Self {
        Self::new(OperationKind::Transition, kind)
    }

    /// An extension of the named kind.
    pub fn extension(kind: TypeName) -> Self {
        Self::new(OperationKind::Extension, kind)
    }

    fn new(class: OperationKind, kind: TypeName) -> Self {
        Self {
            class,
            kind,
            inputs: BTreeSet::new(),
            globals: GlobalState::new(),
            assignments: OwnedAssignments::new(),
            nonce: 0,
        }
    }

    /// Spends a seal.
    #[must_use]
    pub fn input(mut self, seal: SealDefinition) -> Self {
        self.inputs.insert(seal);
        self
    }

    /// Assigns owned state to a new seal.
    #[must_use]
    pub fn assign(mut self, ty: TypeName, seal: SealDefinition, value: StateValue) -> Self {
        self.assignments.entry(ty).or_default().insert(seal, value);
        self
    }

    /// Declares a global value.
    #[must_use]
    pub fn global(mut self, name: TypeName, value: StateValue) -> Self {
        self.globals.entry(name).or_default().push(value);
        self
    }

    #[must_use]
    pub const fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    fn build(self, contract_id: ContractId) -> Result<Operation, LedgerError> {
        match self.class {
            OperationKind::Transition => Ok(Operation::Transition(Transition {
                contract_id,
                kind: self.kind,
                inputs: self.inputs,
                globals: self.globals,
                assignments: self.assignments,
                nonce: self.nonce,
            })),
            OperationKind::Extension if self.inputs.is_empty() => {
                Ok(Operation::Extension(Extension {
                    contract_id,
                    kind: self.kind,
                    globals: self.globals,
                    assignments: self.assignments,
                    nonce: self.nonce,
                }))
            },
            OperationKind::Extension => Err(LedgerError::InvalidCall(
                "extensions cannot spend seals".into(),
            )),
            OperationKind::Genesis => Err(LedgerError::InvalidCall(
                "genesis is created by issue".into(),
            )),
        }
    }
}

/// Outcome of applying witness status updates.
///
/// A non-empty `retracted` list is the reorg retraction event: those
/// operations, listed descendants first, no longer contribute to state.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct SyncReport {
    /// Operations that became final.
    pub promoted: Vec<OperationId>,
    /// Operations retracted because a witness they depend on is invalid.
    pub retracted: Vec<OperationId>,
    /// Updated witnesses that anchor nothing in this ledger.
    pub unknown: Vec<WitnessId>,
}

impl SyncReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.promoted.is_empty() && self.retracted.is_empty()
    }
}

/// Operation graph and derived state of one contract.
#[derive(Clone, Debug)]
pub struct Ledger {
    contract_id: ContractId,
    schema: Arc<Schema>,
    genesis: SignedGenesis,
    validator: Validator,
    min_confirmations: u32,
    nodes: HashMap<OperationId, OpNode>,
    order: Vec<OperationId>,
    witnesses: BTreeMap<WitnessId, BTreeSet<OperationId>>,
    projection: Projection,
    changed: BTreeSet<OperationId>,
}

impl Ledger {
    /// Validates a genesis against an empty state and creates its ledger.
    ///
    /// The issuer signature is not checked here; callers accepting a
    /// genesis from elsewhere verify it first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] if the genesis is invalid.
    pub fn issue(
        genesis: SignedGenesis,
        schema: Arc<Schema>,
        validator: Validator,
        min_confirmations: u32,
    ) -> Result<Self, LedgerError> {
        let operation = Operation::Genesis(genesis.genesis.clone());
        validator.validate(&schema, &EmptyView, &operation, None)?;

        let contract_id = genesis.contract_id();
        let mut ledger = Self::empty(genesis, schema, validator, min_confirmations);
        ledger.push(operation, OpState::Final, None, None);
        ledger.rebuild();
        ledger.changed.clear();
        info!(contract_id = %contract_id, schema = %ledger.schema.name, "issued contract");
        Ok(ledger)
    }

    /// Rebuilds a ledger from persisted nodes without revalidating them.
    ///
    /// `nodes` must be the non-genesis operations in sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Corrupted`] if the nodes do not form a graph
    /// of this contract.
    pub fn restore(
        genesis: SignedGenesis,
        schema: Arc<Schema>,
        validator: Validator,
        min_confirmations: u32,
        nodes: Vec<OpNode>,
    ) -> Result<Self, LedgerError> {
        let mut ledger = Self::empty(genesis.clone(), schema, validator, min_confirmations);
        ledger.push(Operation::Genesis(genesis.genesis), OpState::Final, None, None);

        let contract_id = ledger.contract_id;
        let corrupted = |reason: String| LedgerError::Corrupted {
            contract_id,
            reason,
        };
        for node in nodes {
            let opid = node.id();
            if node.operation.is_genesis() || node.operation.contract_id() != contract_id {
                return Err(corrupted(format!("operation {opid} does not belong here")));
            }
            if ledger.nodes.contains_key(&opid) {
                return Err(corrupted(format!("operation {opid} stored twice")));
            }
            if node.state != OpState::Staged && node.witness.is_none() {
                return Err(corrupted(format!("operation {opid} is {} without witness", node.state)));
            }
            ledger.push(node.operation, node.state, node.witness, node.status);
        }
        ledger.rebuild();
        ledger.changed.clear();
        debug!(contract_id = %contract_id, operations = ledger.order.len(), "restored ledger");
        Ok(ledger)
    }

    fn empty(
        genesis: SignedGenesis,
        schema: Arc<Schema>,
        validator: Validator,
        min_confirmations: u32,
    ) -> Self {
        Self {
            contract_id: genesis.contract_id(),
            schema,
            genesis,
            validator,
            min_confirmations,
            nodes: HashMap::new(),
            order: Vec::new(),
            witnesses: BTreeMap::new(),
            projection: Projection::default(),
            changed: BTreeSet::new(),
        }
    }

    #[must_use]
    pub const fn contract_id(&self) -> ContractId {
        self.contract_id
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[must_use]
    pub const fn genesis(&self) -> &SignedGenesis {
        &self.genesis
    }

    #[must_use]
    pub const fn validator(&self) -> &Validator {
        &self.validator
    }

    #[must_use]
    pub const fn min_confirmations(&self) -> u32 {
        self.min_confirmations
    }

    #[must_use]
    pub const fn projection(&self) -> &Projection {
        &self.projection
    }

    #[must_use]
    pub fn node(&self, opid: &OperationId) -> Option<&OpNode> {
        self.nodes.get(opid)
    }

    #[must_use]
    pub fn contains(&self, opid: &OperationId) -> bool {
        self.nodes.contains_key(opid)
    }

    /// All nodes, genesis first, in sequence order.
    pub fn nodes(&self) -> impl Iterator<Item = &OpNode> + Clone {
        self.order.iter().filter_map(|opid| self.nodes.get(opid))
    }

    /// Number of operations, genesis and retracted ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Always false: a ledger holds at least its genesis.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The live operation that assigned `seal`.
    #[must_use]
    pub fn producer(&self, seal: &SealDefinition) -> Option<&OpNode> {
        self.projection
            .seal(seal)
            .and_then(|entry| self.nodes.get(&entry.producer))
    }

    /// Validates an operation against the current state.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self, operation: &Operation, witness: Option<WitnessBinding<'_>>) -> ValidationOutcome {
        self.validator.validate(&self.schema, self, operation, witness)
    }

    /// Builds, validates and stages a new operation.
    ///
    /// The operation reserves its inputs but contributes no state until a
    /// witness is attached with [`include`](Self::include).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidCall`] for malformed parameters,
    /// [`LedgerError::AlreadyKnown`] for a duplicate and
    /// [`LedgerError::Validation`] if validation fails.
    pub fn call(&mut self, params: CallParams) -> Result<Operation, LedgerError> {
        let operation = params.build(self.contract_id)?;
        let opid = operation.id();
        if self.contains(&opid) {
            return Err(LedgerError::AlreadyKnown(opid));
        }
        self.validate(&operation, None)?;

        self.push(operation.clone(), OpState::Staged, None, None);
        self.rebuild();
        debug!(contract_id = %self.contract_id, opid = %opid, "staged operation");
        Ok(operation)
    }

    /// Attaches a witness to a staged operation and anchors it.
    ///
    /// Attaching the same witness again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] with
    /// [`ErrorKind::InvalidWitness`](crate::validation::ErrorKind::InvalidWitness)
    /// if the witness does not commit to the operation, and
    /// [`LedgerError::WitnessConflict`] or [`LedgerError::InvalidState`] if
    /// the operation cannot take this witness.
    pub fn include(&mut self, opid: &OperationId, witness: Witness) -> Result<(), LedgerError> {
        let node = self
            .nodes
            .get(opid)
            .ok_or(LedgerError::UnknownOperation(*opid))?;
        match (node.state, &node.witness) {
            (OpState::Staged, _) => {},
            (OpState::Anchored | OpState::Final, Some(existing)) if *existing == witness => {
                return Ok(());
            },
            (OpState::Anchored | OpState::Final, Some(existing)) => {
                return Err(LedgerError::WitnessConflict {
                    opid: *opid,
                    existing: existing.id,
                });
            },
            (state, _) => {
                return Err(LedgerError::InvalidState { opid: *opid, state });
            },
        }

        self.validator.check_witness(
            self.contract_id,
            &node.operation,
            WitnessBinding {
                witness: &witness,
                chain: None,
            },
        )?;

        self.witnesses.entry(witness.id).or_default().insert(*opid);
        if let Some(node) = self.nodes.get_mut(opid) {
            node.state = OpState::Anchored;
            node.status = Some(WitnessStatus::Tentative);
            node.witness = Some(witness);
        }
        self.changed.insert(*opid);
        self.rebuild();
        debug!(contract_id = %self.contract_id, opid = %opid, "anchored operation");
        Ok(())
    }

    /// Fully validates an operation arriving with a witness and chain
    /// evidence, then adds it as anchored or final.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AlreadyKnown`] for a duplicate and
    /// [`LedgerError::Validation`] if any check fails.
    pub fn accept(
        &mut self,
        operation: Operation,
        witness: Witness,
        evidence: &ChainEvidence,
    ) -> Result<OpState, LedgerError> {
        let opid = operation.id();
        if self.contains(&opid) {
            return Err(LedgerError::AlreadyKnown(opid));
        }
        self.validate(
            &operation,
            Some(WitnessBinding {
                witness: &witness,
                chain: Some(evidence),
            }),
        )?;
        Ok(self.insert_validated(operation, witness, evidence.status))
    }

    /// Adds an operation that has already passed full validation against
    /// the current state.
    pub(crate) fn insert_validated(
        &mut self,
        operation: Operation,
        witness: Witness,
        status: Option<WitnessStatus>,
    ) -> OpState {
        let state = match status {
            Some(status) if status.is_final(self.min_confirmations) => OpState::Final,
            _ => OpState::Anchored,
        };
        let opid = operation.id();
        self.push(operation, state, Some(witness), status);
        self.rebuild();
        debug!(contract_id = %self.contract_id, opid = %opid, state = %state, "accepted operation");
        state
    }

    /// Applies witness status changes.
    ///
    /// Anchored operations whose witness reaches the confirmation threshold
    /// become final. Operations whose witness turns invalid are retracted
    /// together with every operation that transitively spends their
    /// outputs, and the state is replayed without them before returning.
    pub fn sync(&mut self, updates: &[(WitnessId, WitnessStatus)]) -> SyncReport {
        let mut report = SyncReport::default();
        let mut invalid = BTreeSet::new();

        for (witness_id, status) in updates {
            let Some(opids) = self.witnesses.get(witness_id) else {
                report.unknown.push(*witness_id);
                continue;
            };
            for opid in opids {
                let Some(node) = self.nodes.get_mut(opid) else {
                    continue;
                };
                if !node.state.is_live() {
                    continue;
                }
                node.status = Some(*status);
                self.changed.insert(*opid);
                if !status.is_valid() {
                    invalid.insert(*opid);
                } else if node.state == OpState::Anchored && status.is_final(self.min_confirmations) {
                    node.state = OpState::Final;
                    report.promoted.push(*opid);
                }
            }
        }

        if !invalid.is_empty() {
            report.promoted.retain(|opid| !invalid.contains(opid));
            report.retracted = self.retract(invalid);
            warn!(
                contract_id = %self.contract_id,
                retracted = report.retracted.len(),
                "chain reorganization retracted operations"
            );
        }
        self.rebuild();
        report
    }

    /// Marks `roots` and all their live descendants retracted, visiting
    /// them in reverse sequence order. Returns them in that order.
    fn retract(&mut self, roots: BTreeSet<OperationId>) -> Vec<OperationId> {
        let mut doomed = roots;
        for opid in &self.order {
            let Some(node) = self.nodes.get(opid) else {
                continue;
            };
            if !node.state.is_live() || doomed.contains(opid) {
                continue;
            }
            let depends = node.operation.inputs().iter().any(|seal| {
                self.projection
                    .seal(seal)
                    .is_some_and(|entry| doomed.contains(&entry.producer))
            });
            if depends {
                doomed.insert(*opid);
            }
        }

        let mut retracted = Vec::with_capacity(doomed.len());
        for opid in self.order.iter().rev() {
            if !doomed.contains(opid) {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(opid) {
                node.state = OpState::Retracted;
                self.changed.insert(*opid);
                retracted.push(*opid);
            }
        }
        retracted
    }

    /// Nodes changed since the last call, for persistence.
    pub fn take_changes(&mut self) -> Vec<OpNode> {
        let changed = std::mem::take(&mut self.changed);
        changed
            .into_iter()
            .filter_map(|opid| self.nodes.get(&opid).cloned())
            .collect()
    }

    fn push(
        &mut self,
        operation: Operation,
        state: OpState,
        witness: Option<Witness>,
        status: Option<WitnessStatus>,
    ) {
        let opid = operation.id();
        if let Some(witness) = &witness {
            self.witnesses.entry(witness.id).or_default().insert(opid);
        }
        let node = OpNode {
            seq: self.order.len() as u64,
            operation,
            state,
            witness,
            status,
        };
        self.order.push(opid);
        self.nodes.insert(opid, node);
        self.changed.insert(opid);
    }

    fn rebuild(&mut self) {
        let projection = Projection::replay(&self.schema, self.nodes());
        self.projection = projection;
    }
}

impl StateView for Ledger {
    fn contract_id(&self) -> Option<ContractId> {
        Some(self.contract_id)
    }

    fn seal(&self, seal: &SealDefinition) -> Option<&SealEntry> {
        self.projection.seal(seal)
    }

    fn global(&self, name: &TypeName) -> Vec<StateValue> {
        self.projection
            .global(name)
            .iter()
            .map(|entry| entry.value.clone())
            .collect()
    }
}
