//! sealtrail-core - client-side validation of single-use-seal contracts
//!
//! Contract state lives off-chain. Each owned value is bound to a
//! *single-use seal*, a Bitcoin outpoint plus blinding factor, and moves when
//! a witness transaction closes the seal while committing to the operation
//! that reassigns it. This crate verifies such histories: it decodes them
//! with a strict canonical codec, checks every operation against its
//! contract's schema and the chain evidence behind its witness, and keeps a
//! per-contract operation graph whose projected state survives chain
//! reorganizations.
//!
//! # Modules
//!
//! - [`codec`]: deterministic binary encoding that identifiers hash
//! - [`crypto`]: domain-tagged hashing and issuer signatures
//! - [`contract`]: identifiers, seals, state values, operations, witnesses
//! - [`commitment`]: multi-protocol commitment trees and proofs
//! - [`schema`]: contract schemas, registry and standard schemas
//! - [`validation`]: the pure validation engine and rule registry
//! - [`resolver`]: witness resolver interface and offline snapshots
//! - [`ledger`]: per-contract operation graph with cascading retraction
//! - [`consignment`]: wire format, minimal export and atomic import
//! - [`state`]: read-only state projection
//! - [`store`]: durable storage backends
//! - [`stash`]: multi-contract facade with single-writer locking
//! - [`config`]: stash configuration

pub mod codec;
pub mod commitment;
pub mod config;
pub mod consignment;
pub mod contract;
pub mod crypto;
pub mod ledger;
pub mod resolver;
pub mod schema;
pub mod stash;
pub mod state;
pub mod store;
pub mod validation;
