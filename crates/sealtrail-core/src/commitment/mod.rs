//! Multi-protocol commitments binding operations to witness transactions.
//!
//! A witness transaction publishes a single 32-byte commitment that may
//! aggregate messages from many contracts. Each contract contributes one
//! leaf `H_leaf(contract_id || operation_id)`; leaves are sorted
//! lexicographically and combined pairwise with `H_node(left || right)`
//! until one root remains. When a level has an odd number of nodes the last
//! node is paired with itself.
//!
//! A [`MerkleProof`] discloses only the sibling path of one leaf, so a
//! consignment for one contract reveals nothing about the other contracts
//! committed in the same transaction.
//!
//! The [`CommitmentScheme`] trait lets hosts plug in a different
//! aggregation rule; [`MerkleMpc`] is the default.

mod merkle;

use std::fmt;

pub use merkle::{MerkleProof, MpcError, MpcTree};
use subtle::ConstantTimeEq;

use crate::contract::{Commitment, ContractId, OperationId};

/// Verifies that a published commitment binds a given operation.
pub trait CommitmentScheme: Send + Sync + fmt::Debug {
    /// Returns `true` iff `proof` shows that `published` commits to
    /// `opid` on behalf of `contract_id`.
    fn verify(
        &self,
        contract_id: ContractId,
        opid: OperationId,
        proof: &MerkleProof,
        published: &Commitment,
    ) -> bool;
}

/// Sorted-leaf Merkle aggregation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MerkleMpc;

impl CommitmentScheme for MerkleMpc {
    fn verify(
        &self,
        contract_id: ContractId,
        opid: OperationId,
        proof: &MerkleProof,
        published: &Commitment,
    ) -> bool {
        proof
            .root_for(MpcTree::leaf(contract_id, opid))
            .is_some_and(|root| bool::from(root.as_bytes()[..].ct_eq(&published.as_bytes()[..])))
    }
}
