//! Read access to predecessor state.

use serde::{Deserialize, Serialize};

use crate::contract::{ContractId, OperationId, SealDefinition, StateValue, TypeName};

/// Lifecycle position of an assigned seal.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "use")]
pub enum SealUse {
    /// Assigned by an accepted operation and unspent.
    Open,
    /// Assigned by an operation that is still staged; not yet spendable.
    Pending,
    /// Unspent but claimed as input by a staged operation.
    Reserved { by: OperationId },
    /// Closed by an accepted operation.
    Spent { by: OperationId },
}

/// What the state knows about one seal.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SealEntry {
    pub ty: TypeName,
    pub value: StateValue,
    pub producer: OperationId,
    pub status: SealUse,
}

/// The state an operation is validated against.
///
/// Implementations must be cheap to query and safe to share across the
/// threads of a parallel validation batch.
pub trait StateView: Sync {
    /// The contract the state belongs to; `None` before genesis.
    fn contract_id(&self) -> Option<ContractId>;

    /// Entry for a seal ever assigned by a live operation.
    fn seal(&self, seal: &SealDefinition) -> Option<&SealEntry>;

    /// Accepted values of a global type, in acceptance order.
    fn global(&self, name: &TypeName) -> Vec<StateValue>;
}

/// State of a contract that does not exist yet.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyView;

impl StateView for EmptyView {
    fn contract_id(&self) -> Option<ContractId> {
        None
    }

    fn seal(&self, _seal: &SealDefinition) -> Option<&SealEntry> {
        None
    }

    fn global(&self, _name: &TypeName) -> Vec<StateValue> {
        Vec::new()
    }
}
