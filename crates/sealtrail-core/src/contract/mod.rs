//! Contract data model: identifiers, seals, state and operations.
//!
//! Every type here has a canonical strict encoding (see [`crate::codec`]);
//! identifiers are tagged BLAKE3 hashes of those encodings.

mod ids;
mod operation;
mod seal;
mod state;
mod witness;

pub use ids::{Commitment, ContractId, IdParseError, OperationId, SchemaId, Txid, WitnessId};
pub use operation::{Extension, Genesis, Operation, OperationKind, SignedGenesis, Transition};
pub use seal::{Outpoint, SealDefinition, SealParseError};
pub use state::{
    Assignment, GlobalState, MAX_DATA_LEN, MAX_NAME_LEN, OwnedAssignments, StateValue, TypeName,
};
pub use witness::{Witness, WitnessStatus};
