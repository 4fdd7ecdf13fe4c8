//! Operation nodes and their lifecycle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::contract::{Operation, OperationId, Witness, WitnessStatus};

/// Lifecycle of an operation in a ledger.
///
/// ```text
/// Staged --include--> Anchored --sync(depth)--> Final
///                        |                        |
///                        +----sync(Invalid)-------+--> Retracted
/// ```
///
/// Staged operations are retracted together with the operation whose
/// output they spend. `Retracted` is terminal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OpState {
    /// Built locally, not yet bound to a witness.
    Staged,
    /// Bound to a witness that is not yet deep enough.
    Anchored,
    /// Witness buried under the confirmation threshold.
    Final,
    /// Dropped after its witness or an ancestor was invalidated.
    Retracted,
}

impl OpState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Staged => "staged",
            Self::Anchored => "anchored",
            Self::Final => "final",
            Self::Retracted => "retracted",
        }
    }

    /// Anchored or final: contributes to the projected state.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Anchored | Self::Final)
    }

    #[must_use]
    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Retracted)
    }
}

impl fmt::Display for OpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staged" => Ok(Self::Staged),
            "anchored" => Ok(Self::Anchored),
            "final" => Ok(Self::Final),
            "retracted" => Ok(Self::Retracted),
            other => Err(format!("unknown operation state '{other}'")),
        }
    }
}

/// An operation in the graph with its anchoring data.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct OpNode {
    /// Insertion sequence; increasing along every graph edge.
    pub seq: u64,
    /// The operation itself.
    pub operation: Operation,
    /// Current lifecycle state.
    pub state: OpState,
    /// Witness binding the operation to a chain transaction, once included.
    pub witness: Option<Witness>,
    /// Last chain status reported for the witness.
    pub status: Option<WitnessStatus>,
}

impl OpNode {
    #[must_use]
    pub fn id(&self) -> OperationId {
        self.operation.id()
    }
}
