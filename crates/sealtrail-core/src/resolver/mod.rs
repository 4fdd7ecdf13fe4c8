//! Witness resolver interface.
//!
//! The core never talks to Bitcoin directly. A [`WitnessResolver`] answers
//! its questions: has a seal's outpoint been spent (and by which
//! transaction, publishing which commitment), what commitment does a witness
//! transaction publish, and what is its chain status. Implementations
//! typically wrap an Electrum or Esplora indexer; [`SnapshotResolver`]
//! serves a static snapshot for offline verification and tests.
//!
//! Resolver calls are the only blocking boundary of validation.
//! [`resolve_witness`] gathers everything the validation engine needs up
//! front, bounding each call by a timeout. Calls that time out or fail are
//! recorded as unresolved, which the engine reports as the retryable
//! `WitnessUnresolved` kind.

mod snapshot;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub use snapshot::SnapshotResolver;

use crate::contract::{Commitment, SealDefinition, Witness, WitnessId, WitnessStatus};

/// Boxed future returned by resolver methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors reported by resolver backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResolverError {
    /// The call did not complete in time.
    #[error("resolver timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// The backend failed (network, indexer, parse).
    #[error("resolver backend error: {0}")]
    Backend(String),
}

/// On-chain state of a seal's outpoint.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum SealStatus {
    /// The outpoint is unspent.
    Open,
    /// The outpoint was spent by `witness_id`, which publishes `commitment`.
    #[serde(rename_all = "camelCase")]
    Closed {
        witness_id: WitnessId,
        commitment: Commitment,
    },
}

/// Answers seal-spentness and witness-status queries.
pub trait WitnessResolver: Send + Sync {
    /// Reports whether the seal's outpoint has been spent.
    fn resolve_seal<'a>(
        &'a self,
        seal: &'a SealDefinition,
    ) -> BoxFuture<'a, Result<SealStatus, ResolverError>>;

    /// Reports the chain status of a witness, or `None` if unknown.
    fn witness_status<'a>(
        &'a self,
        witness_id: &'a WitnessId,
    ) -> BoxFuture<'a, Result<Option<WitnessStatus>, ResolverError>>;

    /// Reports the commitment a witness transaction publishes, or `None`
    /// if the transaction is unknown or publishes none.
    fn witness_commitment<'a>(
        &'a self,
        witness_id: &'a WitnessId,
    ) -> BoxFuture<'a, Result<Option<Commitment>, ResolverError>>;
}

/// Chain observations for one witness, gathered before validation.
///
/// `None` entries mark questions the resolver could not answer.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ChainEvidence {
    /// Chain status of the witness transaction.
    pub status: Option<WitnessStatus>,
    /// Commitment the witness transaction publishes.
    pub commitment: Option<Commitment>,
    /// Spentness of each input seal.
    pub seals: BTreeMap<SealDefinition, Option<SealStatus>>,
}

/// Queries the resolver for a witness and the seals it claims to close.
///
/// Each call is bounded by `timeout`; failures are logged and recorded as
/// unresolved rather than returned.
pub async fn resolve_witness<'a, I>(
    resolver: &dyn WitnessResolver,
    witness: &Witness,
    inputs: I,
    timeout: Duration,
) -> ChainEvidence
where
    I: IntoIterator<Item = &'a SealDefinition>,
{
    let status = match bounded(timeout, resolver.witness_status(&witness.id)).await {
        Ok(status) => status,
        Err(err) => {
            warn!(witness_id = %witness.id, error = %err, "witness status unresolved");
            None
        },
    };

    let commitment = match bounded(timeout, resolver.witness_commitment(&witness.id)).await {
        Ok(commitment) => commitment,
        Err(err) => {
            warn!(witness_id = %witness.id, error = %err, "witness commitment unresolved");
            None
        },
    };

    let mut seals = BTreeMap::new();
    for seal in inputs {
        let resolved = match bounded(timeout, resolver.resolve_seal(seal)).await {
            Ok(resolved) => Some(resolved),
            Err(err) => {
                warn!(seal = %seal, error = %err, "seal status unresolved");
                None
            },
        };
        seals.insert(*seal, resolved);
    }

    ChainEvidence {
        status,
        commitment,
        seals,
    }
}

async fn bounded<T>(
    timeout: Duration,
    call: BoxFuture<'_, Result<T, ResolverError>>,
) -> Result<T, ResolverError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        // Bounded by configuration, well under u64.
        #[allow(clippy::cast_possible_truncation)]
        Err(_) => Err(ResolverError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
