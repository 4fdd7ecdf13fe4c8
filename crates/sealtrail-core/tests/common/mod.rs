//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use sealtrail_core::commitment::MpcTree;
use sealtrail_core::consignment::ImportContext;
use sealtrail_core::contract::{
    Genesis, Operation, SealDefinition, SignedGenesis, StateValue, Txid, Witness, WitnessId,
};
use sealtrail_core::crypto::{Ed25519Validator, IssuerSigner};
use sealtrail_core::ledger::{CallParams, Ledger};
use sealtrail_core::resolver::SnapshotResolver;
use sealtrail_core::schema::SchemaRegistry;
use sealtrail_core::schema::standard::{self, ASSET_OWNER, TOTAL_SUPPLY, TRANSFER};
use sealtrail_core::validation::Validator;

pub const MIN_CONFIRMATIONS: u32 = 6;

/// Distinct seal per index.
pub fn seal(n: u16) -> SealDefinition {
    let mut txid = [0xEE; 32];
    txid[..2].copy_from_slice(&n.to_be_bytes());
    SealDefinition::new(Txid::from_bytes(txid), u32::from(n % 4), u64::from(n))
}

pub fn signed_genesis(supply: u64) -> SignedGenesis {
    let schema = standard::fungible_asset();
    let signer = IssuerSigner::from_secret_bytes(&[0x5E; 32]);
    let genesis = Genesis {
        schema_id: schema.id(),
        issuer: signer.issuer_id(),
        timestamp: 1_700_000_000,
        testnet: true,
        globals: BTreeMap::from([
            (standard::TICKER, vec![StateValue::text("SCN")]),
            (standard::NAME, vec![StateValue::text("Scenario")]),
            (standard::PRECISION, vec![StateValue::Amount(0)]),
            (standard::MAX_SUPPLY, vec![StateValue::Amount(supply)]),
            (TOTAL_SUPPLY, vec![StateValue::Amount(supply)]),
        ]),
        assignments: BTreeMap::from([(
            ASSET_OWNER,
            BTreeMap::from([(seal(1), StateValue::Amount(supply))]),
        )]),
    };
    SignedGenesis::sign(genesis, &signer)
}

/// A contract with genesis allocating `supply` to S1.
pub fn issue(supply: u64) -> Ledger {
    Ledger::issue(
        signed_genesis(supply),
        Arc::new(standard::fungible_asset()),
        Validator::default(),
        MIN_CONFIRMATIONS,
    )
    .unwrap()
}

pub fn transfer(inputs: &[u16], outputs: &[(u16, u64)]) -> CallParams {
    let mut params = CallParams::transition(TRANSFER);
    for input in inputs {
        params = params.input(seal(*input));
    }
    for (output, amount) in outputs {
        params = params.assign(ASSET_OWNER, seal(*output), StateValue::Amount(*amount));
    }
    params
}

pub fn witness_for(operation: &Operation, id: u16) -> Witness {
    let contract_id = operation.contract_id();
    let tree = MpcTree::new([(contract_id, operation.id())]).unwrap();
    let mut bytes = [0x77; 32];
    bytes[..2].copy_from_slice(&id.to_be_bytes());
    Witness {
        id: WitnessId::from_bytes(bytes),
        opid: operation.id(),
        commitment: tree.root(),
        proof: tree.proof(contract_id).unwrap(),
    }
}

/// Stages and anchors a transfer, recording the seal closures on `chain`.
pub fn anchor(
    ledger: &mut Ledger,
    chain: &mut SnapshotResolver,
    params: CallParams,
    witness_id: u16,
) -> Operation {
    let operation = ledger.call(params).unwrap();
    let witness = witness_for(&operation, witness_id);
    for input in operation.inputs() {
        chain.close_seal(*input, witness.id, witness.commitment);
    }
    chain.publish(witness.id, witness.commitment);
    chain.set_status(
        witness.id,
        sealtrail_core::contract::WitnessStatus::Mined { depth: 100 },
    );
    ledger.include(&operation.id(), witness).unwrap();
    operation
}

pub fn registry() -> SchemaRegistry {
    let registry = SchemaRegistry::new();
    registry.register(standard::fungible_asset()).unwrap();
    registry
}

pub fn context<'a>(
    registry: &'a SchemaRegistry,
    validator: &'a Validator,
    resolver: &'a SnapshotResolver,
) -> ImportContext<'a> {
    ImportContext {
        registry,
        validator,
        resolver,
        signatures: &Ed25519Validator,
        timeout: Duration::from_secs(5),
        min_confirmations: MIN_CONFIRMATIONS,
        max_operations: 1024,
    }
}

/// Open allocations as seal -> amount.
pub fn open_amounts(ledger: &Ledger) -> BTreeMap<SealDefinition, u64> {
    ledger
        .projection()
        .allocations()
        .map(|(seal, entry)| (*seal, entry.value.amount().unwrap_or_default()))
        .collect()
}
