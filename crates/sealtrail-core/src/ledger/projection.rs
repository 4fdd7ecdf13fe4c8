//! State derived by replaying the operation graph.

use std::collections::{BTreeMap, HashMap};

use super::node::{OpNode, OpState};
use crate::contract::{Operation, OperationId, SealDefinition, StateValue, TypeName};
use crate::schema::{Cardinality, Schema};
use crate::validation::{SealEntry, SealUse};

/// One accepted value of a global type.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GlobalEntry {
    /// Declared value.
    pub value: StateValue,
    /// Operation that declared it.
    pub opid: OperationId,
}

/// Seal and global state of a contract.
///
/// Always rebuilt from the graph: accepted operations are applied in
/// sequence order, then staged operations reserve their inputs and mark
/// their outputs pending. Two ledgers with the same live operations have
/// equal projections. A once-global keeps the first value accepted for it.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Projection {
    seals: HashMap<SealDefinition, SealEntry>,
    globals: BTreeMap<TypeName, Vec<GlobalEntry>>,
}

impl Projection {
    /// Replays `nodes`, which must be in sequence order.
    pub(crate) fn replay<'a>(
        schema: &Schema,
        nodes: impl Iterator<Item = &'a OpNode> + Clone,
    ) -> Self {
        let mut projection = Self::default();
        for node in nodes.clone().filter(|node| node.state.is_accepted()) {
            projection.accept(schema, node.id(), &node.operation);
        }
        for node in nodes.filter(|node| node.state == OpState::Staged) {
            projection.stage(node.id(), &node.operation);
        }
        projection
    }

    fn accept(&mut self, schema: &Schema, opid: OperationId, operation: &Operation) {
        for seal in operation.inputs() {
            if let Some(entry) = self.seals.get_mut(seal) {
                entry.status = SealUse::Spent { by: opid };
            }
        }
        for (ty, seal, value) in operation.outputs() {
            self.seals.insert(
                *seal,
                SealEntry {
                    ty: ty.clone(),
                    value: value.clone(),
                    producer: opid,
                    status: SealUse::Open,
                },
            );
        }
        for (name, values) in operation.globals() {
            let once = schema
                .global_types
                .get(name)
                .is_some_and(|ty| ty.cardinality == Cardinality::Once);
            let entries = self.globals.entry(name.clone()).or_default();
            if once && !entries.is_empty() {
                continue;
            }
            entries.extend(values.iter().map(|value| GlobalEntry {
                value: value.clone(),
                opid,
            }));
        }
    }

    fn stage(&mut self, opid: OperationId, operation: &Operation) {
        for seal in operation.inputs() {
            if let Some(entry) = self.seals.get_mut(seal) {
                if entry.status == SealUse::Open {
                    entry.status = SealUse::Reserved { by: opid };
                }
            }
        }
        for (ty, seal, value) in operation.outputs() {
            self.seals.entry(*seal).or_insert_with(|| SealEntry {
                ty: ty.clone(),
                value: value.clone(),
                producer: opid,
                status: SealUse::Pending,
            });
        }
    }

    #[must_use]
    pub fn seal(&self, seal: &SealDefinition) -> Option<&SealEntry> {
        self.seals.get(seal)
    }

    /// Every seal assigned by a live operation.
    pub fn seals(&self) -> impl Iterator<Item = (&SealDefinition, &SealEntry)> {
        self.seals.iter()
    }

    /// Unspent allocations: open or merely reserved by a staged spend.
    pub fn allocations(&self) -> impl Iterator<Item = (&SealDefinition, &SealEntry)> {
        self.seals.iter().filter(|(_, entry)| {
            matches!(entry.status, SealUse::Open | SealUse::Reserved { .. })
        })
    }

    #[must_use]
    pub fn global(&self, name: &TypeName) -> &[GlobalEntry] {
        self.globals.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn globals(&self) -> impl Iterator<Item = (&TypeName, &[GlobalEntry])> {
        self.globals
            .iter()
            .map(|(name, entries)| (name, entries.as_slice()))
    }
}
