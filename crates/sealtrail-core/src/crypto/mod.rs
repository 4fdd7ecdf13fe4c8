//! Cryptographic primitives for sealtrail.
//!
//! - **Tagged Blake3 hashing**: every identifier in the protocol (contract,
//!   schema, operation, commitment leaves and nodes) is a Blake3 hash derived
//!   under its own domain tag, so a value hashed for one purpose can never be
//!   confused with a value hashed for another.
//! - **Ed25519 signatures**: contract issuers sign the genesis commitment; a
//!   recipient verifies the signature through a [`SignatureValidator`] when a
//!   consignment introduces a new contract.
//!
//! # Example
//!
//! ```rust
//! use sealtrail_core::crypto::{Ed25519Validator, IssuerSigner, SignatureValidator, TaggedHasher};
//!
//! let signer = IssuerSigner::from_secret_bytes(&[7u8; 32]);
//! let digest = TaggedHasher::hash(TaggedHasher::OPERATION_TAG, b"content");
//! let signature = signer.sign(&digest);
//! assert!(Ed25519Validator.verify(&digest, &signer.issuer_id(), &signature));
//! ```

mod hash;
mod sign;

pub use hash::{HASH_SIZE, Hash, TaggedHasher};
pub use sign::{
    Ed25519Validator, ISSUER_ID_SIZE, IssuerId, IssuerSigner, SIGNATURE_SIZE, Signature,
    SignatureValidator,
};
