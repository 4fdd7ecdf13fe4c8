//! Resolver backed by a static chain snapshot.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{BoxFuture, ResolverError, SealStatus, WitnessResolver};
use crate::contract::{Commitment, SealDefinition, WitnessId, WitnessStatus};

/// A serde-loadable snapshot of seal closures and witness statuses.
///
/// Seals absent from the snapshot are reported open; witnesses absent from
/// it are reported unknown and publishing nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotResolver {
    #[serde(default)]
    seals: BTreeMap<SealDefinition, SealStatus>,
    #[serde(default)]
    witnesses: BTreeMap<WitnessId, WitnessStatus>,
    #[serde(default)]
    commitments: BTreeMap<WitnessId, Commitment>,
}

impl SnapshotResolver {
    /// Records that `witness_id` spent the seal and publishes `commitment`.
    pub fn close_seal(
        &mut self,
        seal: SealDefinition,
        witness_id: WitnessId,
        commitment: Commitment,
    ) -> &mut Self {
        self.commitments.insert(witness_id, commitment);
        self.seals.insert(
            seal,
            SealStatus::Closed {
                witness_id,
                commitment,
            },
        );
        self
    }

    /// Records the commitment `witness_id` publishes without closing any
    /// seal, as for extensions.
    pub fn publish(&mut self, witness_id: WitnessId, commitment: Commitment) -> &mut Self {
        self.commitments.insert(witness_id, commitment);
        self
    }

    pub fn set_status(&mut self, witness_id: WitnessId, status: WitnessStatus) -> &mut Self {
        self.witnesses.insert(witness_id, status);
        self
    }

    /// Witness statuses in the snapshot, for feeding `sync`.
    #[must_use]
    pub fn statuses(&self) -> Vec<(WitnessId, WitnessStatus)> {
        self.witnesses.iter().map(|(id, status)| (*id, *status)).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, ResolverError> {
        serde_json::from_str(json).map_err(|e| ResolverError::Backend(e.to_string()))
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ResolverError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ResolverError::Backend(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        // Maps keyed by strings always serialize.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl WitnessResolver for SnapshotResolver {
    fn resolve_seal<'a>(
        &'a self,
        seal: &'a SealDefinition,
    ) -> BoxFuture<'a, Result<SealStatus, ResolverError>> {
        Box::pin(async move { Ok(self.seals.get(seal).copied().unwrap_or(SealStatus::Open)) })
    }

    fn witness_status<'a>(
        &'a self,
        witness_id: &'a WitnessId,
    ) -> BoxFuture<'a, Result<Option<WitnessStatus>, ResolverError>> {
        Box::pin(async move { Ok(self.witnesses.get(witness_id).copied()) })
    }

    fn witness_commitment<'a>(
        &'a self,
        witness_id: &'a WitnessId,
    ) -> BoxFuture<'a, Result<Option<Commitment>, ResolverError>> {
        Box::pin(async move { Ok(self.commitments.get(witness_id).copied()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Txid;

    #[test]
    fn test_json_round_trip() {
        let mut snapshot = SnapshotResolver::default();
        snapshot
            .close_seal(
                SealDefinition::new(Txid::from_bytes([1; 32]), 2, 3),
                WitnessId::from_bytes([7; 32]),
                Commitment::from_bytes([8; 32]),
            )
            .set_status(WitnessId::from_bytes([7; 32]), WitnessStatus::Tentative);

        let back = SnapshotResolver::from_json(&snapshot.to_json()).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(SnapshotResolver::from_json(r#"{"blocks": []}"#).is_err());
    }
}
