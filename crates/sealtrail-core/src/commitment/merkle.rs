//! Sorted-leaf Merkle tree over contract messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{CodecError, StrictDecode, StrictEncode, StrictReader, StrictWriter};
use crate::contract::{Commitment, ContractId, OperationId};
use crate::crypto::{Hash, TaggedHasher};

/// Maximum proof depth; supports trees of up to 2^32 leaves.
const MAX_PATH_LEN: usize = 32;

/// Errors building a commitment tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MpcError {
    /// No messages were supplied.
    #[error("commitment tree requires at least one message")]
    Empty,

    /// A contract contributed more than one message.
    #[error("contract {0} appears more than once")]
    DuplicateContract(ContractId),
}

/// Inclusion proof for one leaf of an [`MpcTree`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Index of the leaf in sorted order.
    pub position: u32,
    /// Number of leaves in the tree.
    pub width: u32,
    /// Sibling hashes from the leaf level upwards.
    #[serde(with = "hash_list")]
    pub path: Vec<Hash>,
}

impl MerkleProof {
    /// Recomputes the root for `leaf`, or `None` if the proof is
    /// structurally inconsistent with its declared width.
    #[must_use]
    pub fn root_for(&self, leaf: Hash) -> Option<Commitment> {
        if self.width == 0 || self.position >= self.width {
            return None;
        }
        let mut hash = leaf;
        let mut position = self.position;
        let mut width = self.width;
        for sibling in &self.path {
            if width <= 1 {
                return None;
            }
            hash = if position % 2 == 0 {
                MpcTree::node(&hash, sibling)
            } else {
                MpcTree::node(sibling, &hash)
            };
            position /= 2;
            width = width.div_ceil(2);
        }
        (width == 1).then_some(Commitment(hash))
    }
}

impl StrictEncode for MerkleProof {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        writer.write_u32(self.position);
        writer.write_u32(self.width);
        self.path.strict_encode(writer);
    }
}

impl StrictDecode for MerkleProof {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        let position = reader.read_u32()?;
        let width = reader.read_u32()?;
        let len = reader.read_len(MAX_PATH_LEN)?;
        let mut path = Vec::with_capacity(len);
        for _ in 0..len {
            path.push(reader.read_array()?);
        }
        Ok(Self {
            position,
            width,
            path,
        })
    }
}

/// Merkle tree aggregating one message per contract.
#[derive(Clone, Debug)]
pub struct MpcTree {
    levels: Vec<Vec<Hash>>,
    positions: BTreeMap<ContractId, u32>,
}

impl MpcTree {
    /// Leaf hash for a contract message.
    #[must_use]
    pub fn leaf(contract_id: ContractId, opid: OperationId) -> Hash {
        let mut hasher = TaggedHasher::new(TaggedHasher::MPC_LEAF_TAG);
        hasher.update(contract_id.as_bytes()).update(opid.as_bytes());
        hasher.finalize()
    }

    fn node(left: &Hash, right: &Hash) -> Hash {
        let mut hasher = TaggedHasher::new(TaggedHasher::MPC_NODE_TAG);
        hasher.update(left).update(right);
        hasher.finalize()
    }

    /// Builds a tree from `(contract, operation)` messages.
    ///
    /// # Errors
    ///
    /// Returns [`MpcError::Empty`] for no messages and
    /// [`MpcError::DuplicateContract`] if a contract repeats.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(
        messages: impl IntoIterator<Item = (ContractId, OperationId)>,
    ) -> Result<Self, MpcError> {
        let mut by_contract = BTreeMap::new();
        for (contract_id, opid) in messages {
            if by_contract.insert(contract_id, opid).is_some() {
                return Err(MpcError::DuplicateContract(contract_id));
            }
        }
        if by_contract.is_empty() {
            return Err(MpcError::Empty);
        }

        let mut leaves: Vec<(Hash, ContractId)> = by_contract
            .into_iter()
            .map(|(contract_id, opid)| (Self::leaf(contract_id, opid), contract_id))
            .collect();
        leaves.sort();

        let positions = leaves
            .iter()
            .enumerate()
            .map(|(pos, (_, contract_id))| (*contract_id, pos as u32))
            .collect();

        let mut levels = vec![leaves.into_iter().map(|(hash, _)| hash).collect::<Vec<_>>()];
        while levels.last().is_some_and(|level| level.len() > 1) {
            let level = &levels[levels.len() - 1];
            let next: Vec<Hash> = level
                .chunks(2)
                .map(|pair| Self::node(&pair[0], pair.get(1).unwrap_or(&pair[0])))
                .collect();
            levels.push(next);
        }

        Ok(Self { levels, positions })
    }

    /// The commitment to publish.
    #[must_use]
    pub fn root(&self) -> Commitment {
        Commitment(self.levels[self.levels.len() - 1][0])
    }

    /// Inclusion proof for `contract_id`, if it is part of the tree.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn proof(&self, contract_id: ContractId) -> Option<MerkleProof> {
        let position = *self.positions.get(&contract_id)?;
        let mut index = position as usize;
        let mut path = Vec::new();
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = index ^ 1;
            path.push(*level.get(sibling).unwrap_or(&level[index]));
            index /= 2;
        }
        Some(MerkleProof {
            position,
            width: self.levels[0].len() as u32,
            path,
        })
    }
}

mod hash_list {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::crypto::Hash;

    pub fn serialize<S: Serializer>(path: &[Hash], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(path.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Hash>, D::Error> {
        let items = Vec::<String>::deserialize(deserializer)?;
        items
            .iter()
            .map(|item| {
                let mut hash = [0u8; 32];
                hex::decode_to_slice(item, &mut hash).map_err(serde::de::Error::custom)?;
                Ok(hash)
            })
            .collect()
    }
}
