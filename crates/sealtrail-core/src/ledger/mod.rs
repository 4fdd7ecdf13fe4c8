//! Per-contract operation graph.
//!
//! A [`Ledger`] owns one contract's accepted history: an arena of
//! operations keyed by [`OperationId`](crate::contract::OperationId), where
//! edges are the seals an operation spends. The seal and global state are a
//! [`Projection`] rebuilt by replaying live operations in sequence order,
//! which makes retraction after a chain reorganization a matter of marking
//! the affected subtree and replaying.
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! use sealtrail_core::contract::{Genesis, SealDefinition, SignedGenesis, StateValue, Txid};
//! use sealtrail_core::crypto::IssuerSigner;
//! use sealtrail_core::ledger::{CallParams, Ledger};
//! use sealtrail_core::schema::standard;
//! use sealtrail_core::validation::Validator;
//!
//! let schema = Arc::new(standard::fungible_asset());
//! let signer = IssuerSigner::from_secret_bytes(&[7; 32]);
//! let s1 = SealDefinition::new(Txid::from_bytes([1; 32]), 0, 1);
//! let genesis = Genesis {
//!     schema_id: schema.id(),
//!     issuer: signer.issuer_id(),
//!     timestamp: 0,
//!     testnet: true,
//!     globals: BTreeMap::from([
//!         (standard::TICKER, vec![StateValue::text("DEMO")]),
//!         (standard::NAME, vec![StateValue::text("Demo")]),
//!         (standard::PRECISION, vec![StateValue::Amount(0)]),
//!         (standard::MAX_SUPPLY, vec![StateValue::Amount(1000)]),
//!         (standard::TOTAL_SUPPLY, vec![StateValue::Amount(1000)]),
//!     ]),
//!     assignments: BTreeMap::from([(
//!         standard::ASSET_OWNER,
//!         BTreeMap::from([(s1, StateValue::Amount(1000))]),
//!     )]),
//! };
//!
//! let mut ledger = Ledger::issue(
//!     SignedGenesis::sign(genesis, &signer),
//!     schema,
//!     Validator::default(),
//!     32,
//! )
//! .unwrap();
//!
//! let s2 = SealDefinition::new(Txid::from_bytes([2; 32]), 0, 2);
//! let op = ledger
//!     .call(
//!         CallParams::transition(standard::TRANSFER)
//!             .input(s1)
//!             .assign(standard::ASSET_OWNER, s2, StateValue::Amount(1000)),
//!     )
//!     .unwrap();
//! assert!(ledger.node(&op.id()).is_some());
//! ```

mod graph;
mod node;
mod projection;


use thiserror::Error;

pub use graph::{CallParams, Ledger, SyncReport};
pub use node::{OpNode, OpState};
pub use projection::{GlobalEntry, Projection};

use crate::contract::{ContractId, OperationId, WitnessId};
use crate::validation::ValidationError;

/// Errors raised by ledger mutations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LedgerError {
    /// The operation failed validation; the ledger is unchanged.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No such operation in this ledger.
    #[error("unknown operation {0}")]
    UnknownOperation(OperationId),

    /// The operation is already part of the graph.
    #[error("operation {0} is already known")]
    AlreadyKnown(OperationId),

    /// The operation is not in a state that allows the request.
    #[error("operation {opid} is {state}")]
    InvalidState {
        /// Operation concerned.
        opid: OperationId,
        /// Its current state.
        state: OpState,
    },

    /// A different witness already anchors the operation.
    #[error("operation {opid} is already anchored by witness {existing}")]
    WitnessConflict {
        /// Operation concerned.
        opid: OperationId,
        /// Witness currently attached.
        existing: WitnessId,
    },

    /// The call parameters cannot form a valid operation.
    #[error("invalid call: {0}")]
    InvalidCall(String),

    /// Persisted graph data is inconsistent.
    #[error("corrupted ledger for contract {contract_id}: {reason}")]
    Corrupted {
        /// Contract concerned.
        contract_id: ContractId,
        /// What is inconsistent.
        reason: String,
    },
}
