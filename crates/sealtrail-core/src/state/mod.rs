//! Read-only contract state queries.
//!
//! [`project`] turns a ledger's projection into a [`ContractStateView`]:
//! global values per type, owned allocations per type with the finality of
//! the operation that assigned them, and computed aggregates such as total
//! supply. Projection never mutates the ledger and may run against any
//! snapshot.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::contract::{ContractId, OperationId, Outpoint, SealDefinition, StateValue, TypeName};
use crate::ledger::{Ledger, OpState};
use crate::schema::Aggregation;

/// Which allocations to report.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum StateFilter {
    /// Every unspent allocation.
    #[default]
    All,
    /// Only allocations on these seals.
    Seals(BTreeSet<SealDefinition>),
    /// Only allocations on seals bound to these outpoints.
    Outpoints(BTreeSet<Outpoint>),
}

impl StateFilter {
    #[must_use]
    pub fn matches(&self, seal: &SealDefinition) -> bool {
        match self {
            Self::All => true,
            Self::Seals(seals) => seals.contains(seal),
            Self::Outpoints(outpoints) => outpoints.contains(&seal.outpoint),
        }
    }
}

/// One value of a global type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalValue {
    pub value: StateValue,
    pub opid: OperationId,
}

/// One unspent allocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedAllocation {
    pub seal: SealDefinition,
    pub value: StateValue,
    pub opid: OperationId,
    /// State of the operation that assigned it.
    pub status: OpState,
}

/// Snapshot of a contract's state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractStateView {
    pub contract_id: ContractId,
    pub global: BTreeMap<TypeName, Vec<GlobalValue>>,
    pub owned: BTreeMap<TypeName, Vec<OwnedAllocation>>,
    pub aggregated: BTreeMap<TypeName, u64>,
}

impl ContractStateView {
    /// Sum of the amounts held under an owned type.
    #[must_use]
    pub fn balance(&self, ty: &TypeName) -> u64 {
        self.owned
            .get(ty)
            .into_iter()
            .flatten()
            .filter_map(|allocation| allocation.value.amount())
            .fold(0u64, u64::saturating_add)
    }
}

/// Projects the current state of `ledger`.
#[must_use]
pub fn project(ledger: &Ledger, filter: &StateFilter) -> ContractStateView {
    let projection = ledger.projection();

    let global = projection
        .globals()
        .map(|(name, entries)| {
            let values = entries
                .iter()
                .map(|entry| GlobalValue {
                    value: entry.value.clone(),
                    opid: entry.opid,
                })
                .collect();
            (name.clone(), values)
        })
        .collect();

    let mut owned: BTreeMap<TypeName, Vec<OwnedAllocation>> = BTreeMap::new();
    for (seal, entry) in projection.allocations() {
        if !filter.matches(seal) {
            continue;
        }
        let status = ledger
            .node(&entry.producer)
            .map_or(OpState::Anchored, |node| node.state);
        owned.entry(entry.ty.clone()).or_default().push(OwnedAllocation {
            seal: *seal,
            value: entry.value.clone(),
            opid: entry.producer,
            status,
        });
    }
    for allocations in owned.values_mut() {
        allocations.sort_by_key(|allocation| allocation.seal);
    }

    let aggregated = ledger
        .schema()
        .global_types
        .iter()
        .filter(|(_, ty)| ty.aggregation == Aggregation::Sum)
        .map(|(name, _)| {
            let total = projection
                .global(name)
                .iter()
                .filter_map(|entry| entry.value.amount())
                .fold(0u64, u64::saturating_add);
            (name.clone(), total)
        })
        .collect();

    ContractStateView {
        contract_id: ledger.contract_id(),
        global,
        owned,
        aggregated,
    }
}
