use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::codec::CodecError;
use crate::commitment::MpcTree;
use crate::contract::{
    Commitment, Genesis, Operation, SealDefinition, SignedGenesis, StateValue, Transition, Txid,
    Witness, WitnessId, WitnessStatus,
};
use crate::crypto::{Ed25519Validator, IssuerSigner, Signature};
use crate::ledger::{CallParams, Ledger, OpState};
use crate::resolver::SnapshotResolver;
use crate::schema::standard::{self, ASSET_OWNER, ISSUE, TOTAL_SUPPLY, TRANSFER};
use crate::schema::{SchemaError, SchemaRegistry};
use crate::validation::{ErrorKind, Validator};

const MIN_CONFIRMATIONS: u32 = 6;

fn seal(byte: u8) -> SealDefinition {
    SealDefinition::new(Txid::from_bytes([byte; 32]), 0, u64::from(byte))
}

fn witness_for(operation: &Operation, id: u8) -> Witness {
    let contract_id = operation.contract_id();
    let tree = MpcTree::new([(contract_id, operation.id())]).unwrap();
    Witness {
        id: WitnessId::from_bytes([id; 32]),
        opid: operation.id(),
        commitment: tree.root(),
        proof: tree.proof(contract_id).unwrap(),
    }
}

fn issued() -> Ledger {
    issued_with_cap(1000)
}

fn issued_with_cap(max_supply: u64) -> Ledger {
    let schema = Arc::new(standard::fungible_asset());
    let signer = IssuerSigner::from_secret_bytes(&[3; 32]);
    let genesis = Genesis {
        schema_id: schema.id(),
        issuer: signer.issuer_id(),
        timestamp: 1_700_000_000,
        testnet: true,
        globals: BTreeMap::from([
            (standard::TICKER, vec![StateValue::text("TST")]),
            (standard::NAME, vec![StateValue::text("Test")]),
            (standard::PRECISION, vec![StateValue::Amount(0)]),
            (standard::MAX_SUPPLY, vec![StateValue::Amount(max_supply)]),
            (TOTAL_SUPPLY, vec![StateValue::Amount(1000)]),
        ]),
        assignments: BTreeMap::from([(
            ASSET_OWNER,
            BTreeMap::from([(seal(1), StateValue::Amount(1000))]),
        )]),
    };
    Ledger::issue(
        SignedGenesis::sign(genesis, &signer),
        schema,
        Validator::default(),
        MIN_CONFIRMATIONS,
    )
    .unwrap()
}

/// Sender history: A splits S1 into S2/S3, B moves S3 to S4.
struct Sender {
    ledger: Ledger,
    a: Witness,
    b: Witness,
    chain: SnapshotResolver,
}

fn sender() -> Sender {
    let mut ledger = issued();
    let op_a = ledger
        .call(
            CallParams::transition(TRANSFER)
                .input(seal(1))
                .assign(ASSET_OWNER, seal(2), StateValue::Amount(600))
                .assign(ASSET_OWNER, seal(3), StateValue::Amount(400)),
        )
        .unwrap();
    let a = witness_for(&op_a, 0xA0);
    ledger.include(&op_a.id(), a.clone()).unwrap();

    let op_b = ledger
        .call(
            CallParams::transition(TRANSFER)
                .input(seal(3))
                .assign(ASSET_OWNER, seal(4), StateValue::Amount(400)),
        )
        .unwrap();
    let b = witness_for(&op_b, 0xB0);
    ledger.include(&op_b.id(), b.clone()).unwrap();

    let mut chain = SnapshotResolver::default();
    chain
        .close_seal(seal(1), a.id, a.commitment)
        .set_status(a.id, WitnessStatus::Mined { depth: 10 })
        .close_seal(seal(3), b.id, b.commitment)
        .set_status(b.id, WitnessStatus::Mined { depth: 2 });
    Sender { ledger, a, b, chain }
}

fn registry() -> SchemaRegistry {
    let registry = SchemaRegistry::new();
    registry.register(standard::fungible_asset()).unwrap();
    registry
}

fn context<'a>(
    registry: &'a SchemaRegistry,
    validator: &'a Validator,
    resolver: &'a SnapshotResolver,
) -> ImportContext<'a> {
    ImportContext {
        registry,
        validator,
        resolver,
        signatures: &Ed25519Validator,
        timeout: Duration::from_secs(1),
        min_confirmations: MIN_CONFIRMATIONS,
        max_operations: 16,
    }
}

fn terminals(seals: &[u8]) -> BTreeSet<SealDefinition> {
    seals.iter().copied().map(seal).collect()
}

#[test]
fn test_export_is_minimal() {
    let sender = sender();
    let consignment = export(&sender.ledger, &terminals(&[2])).unwrap();
    assert_eq!(consignment.genesis.as_ref(), Some(sender.ledger.genesis()));
    assert_eq!(consignment.operation_ids().collect::<Vec<_>>(), vec![sender.a.opid]);
    assert_eq!(consignment.witnesses, vec![sender.a.clone()]);
}

#[test]
fn test_export_orders_ancestors_first() {
    let sender = sender();
    let consignment = export(&sender.ledger, &terminals(&[4, 2])).unwrap();
    assert_eq!(
        consignment.operation_ids().collect::<Vec<_>>(),
        vec![sender.a.opid, sender.b.opid]
    );
}

#[test]
fn test_export_of_genesis_seal_has_no_operations() {
    let ledger = issued();
    let consignment = export(&ledger, &terminals(&[1])).unwrap();
    assert!(consignment.is_empty());
    assert!(consignment.genesis.is_some());
}

#[test]
fn test_export_errors() {
    let mut ledger = issued();
    assert_eq!(
        export(&ledger, &terminals(&[9])),
        Err(ExportError::UnknownSeal(seal(9)))
    );

    let staged = ledger
        .call(
            CallParams::transition(TRANSFER)
                .input(seal(1))
                .assign(ASSET_OWNER, seal(2), StateValue::Amount(1000)),
        )
        .unwrap();
    assert_eq!(
        export(&ledger, &terminals(&[2])),
        Err(ExportError::Unanchored(staged.id()))
    );
}

#[test]
fn test_wire_format() {
    let sender = sender();
    let consignment = export(&sender.ledger, &terminals(&[4])).unwrap();
    let bytes = consignment.to_bytes();

    assert_eq!(&bytes[..8], b"SEALCNSG");
    assert_eq!(Consignment::from_bytes(&bytes).unwrap(), consignment);
    let header = Consignment::peek_header(&bytes).unwrap();
    assert_eq!(header.contract_id, consignment.contract_id);
    assert_eq!(header.version, VERSION);
    assert_eq!(
        Consignment::peek_header(&bytes[..42]).unwrap().contract_id,
        consignment.contract_id
    );
}

#[test]
fn test_wire_format_rejects_garbage() {
    let sender = sender();
    let mut bytes = export(&sender.ledger, &terminals(&[2])).unwrap().to_bytes();

    let mut trailing = bytes.clone();
    trailing.push(0);
    assert!(matches!(
        Consignment::from_bytes(&trailing),
        Err(CodecError::TrailingBytes { count: 1 })
    ));

    bytes[8] = 9;
    assert!(matches!(
        Consignment::peek_header(&bytes),
        Err(CodecError::InvalidValue { .. })
    ));
    bytes[0] = b'X';
    assert!(matches!(
        Consignment::from_bytes(&bytes),
        Err(CodecError::InvalidValue { .. })
    ));
}

#[tokio::test]
async fn test_import_new_contract() {
    let sender = sender();
    let consignment = export(&sender.ledger, &terminals(&[2, 4])).unwrap();
    let registry = registry();
    let validator = Validator::default();

    let outcome = import(None, &consignment, &context(&registry, &validator, &sender.chain))
        .await
        .unwrap();
    assert_eq!(outcome.imported, vec![sender.a.opid, sender.b.opid]);
    assert!(outcome.skipped.is_empty());

    let ledger = outcome.ledger;
    assert_eq!(ledger.node(&sender.a.opid).unwrap().state, OpState::Final);
    assert_eq!(ledger.node(&sender.b.opid).unwrap().state, OpState::Anchored);
    for terminal in [seal(2), seal(4)] {
        assert_eq!(
            ledger.projection().seal(&terminal),
            sender.ledger.projection().seal(&terminal)
        );
    }
}

#[tokio::test]
async fn test_import_twice_is_noop() {
    let sender = sender();
    let consignment = export(&sender.ledger, &terminals(&[4])).unwrap();
    let registry = registry();
    let validator = Validator::default();
    let ctx = context(&registry, &validator, &sender.chain);

    let first = import(None, &consignment, &ctx).await.unwrap().ledger;
    let second = import(Some(&first), &consignment, &ctx).await.unwrap();
    assert!(second.imported.is_empty());
    assert_eq!(second.skipped, vec![sender.a.opid, sender.b.opid]);
    assert_eq!(second.ledger.projection(), first.projection());
    assert_eq!(second.ledger.len(), first.len());
}

#[tokio::test]
async fn test_import_extends_known_contract() {
    let sender = sender();
    let registry = registry();
    let validator = Validator::default();
    let ctx = context(&registry, &validator, &sender.chain);

    let first = export(&sender.ledger, &terminals(&[2])).unwrap();
    let receiver = import(None, &first, &ctx).await.unwrap().ledger;

    let mut second = export(&sender.ledger, &terminals(&[4])).unwrap();
    second.genesis = None;
    let outcome = import(Some(&receiver), &second, &ctx).await.unwrap();
    assert_eq!(outcome.skipped, vec![sender.a.opid]);
    assert_eq!(outcome.imported, vec![sender.b.opid]);
}

#[tokio::test]
async fn test_import_double_spend_is_rejected_atomically() {
    let sender = sender();
    let registry = registry();
    let validator = Validator::default();
    let ctx = context(&registry, &validator, &sender.chain);
    let receiver = import(None, &export(&sender.ledger, &terminals(&[2])).unwrap(), &ctx)
        .await
        .unwrap()
        .ledger;
    let before = receiver.clone();

    let competing = Operation::Transition(Transition {
        contract_id: receiver.contract_id(),
        kind: TRANSFER,
        inputs: BTreeSet::from([seal(1)]),
        globals: BTreeMap::new(),
        assignments: BTreeMap::from([(
            ASSET_OWNER,
            BTreeMap::from([(seal(9), StateValue::Amount(1000))]),
        )]),
        nonce: 0,
    });
    let consignment = Consignment {
        contract_id: receiver.contract_id(),
        genesis: Some(receiver.genesis().clone()),
        witnesses: vec![witness_for(&competing, 0xC0)],
        operations: vec![competing],
    };

    let err = import(Some(&receiver), &consignment, &ctx).await.unwrap_err();
    assert!(matches!(err, ImportError::Validation(ref e) if e.kind == ErrorKind::SealReuse));
    assert_eq!(receiver.projection(), before.projection());
    assert_eq!(receiver.len(), before.len());
}

#[tokio::test]
async fn test_import_partial_failure_merges_nothing() {
    let sender = sender();
    let consignment = export(&sender.ledger, &terminals(&[4])).unwrap();
    let registry = registry();
    let validator = Validator::default();

    // B's seal closure is missing, so only A could validate.
    let mut chain = SnapshotResolver::default();
    chain
        .close_seal(seal(1), sender.a.id, sender.a.commitment)
        .set_status(sender.a.id, WitnessStatus::Mined { depth: 10 })
        .publish(sender.b.id, sender.b.commitment)
        .set_status(sender.b.id, WitnessStatus::Mined { depth: 2 });

    let err = import(None, &consignment, &context(&registry, &validator, &chain))
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::Validation(ref e) if e.opid == sender.b.opid));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_import_unknown_witness_is_retryable() {
    let sender = sender();
    let consignment = export(&sender.ledger, &terminals(&[2])).unwrap();
    let registry = registry();
    let validator = Validator::default();
    let empty = SnapshotResolver::default();

    let err = import(None, &consignment, &context(&registry, &validator, &empty))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ImportError::Validation(ref e) if e.kind == ErrorKind::WitnessUnresolved)
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_import_commitment_mismatch() {
    let sender = sender();
    let consignment = export(&sender.ledger, &terminals(&[2])).unwrap();
    let registry = registry();
    let validator = Validator::default();

    let mut chain = sender.chain.clone();
    chain.close_seal(seal(1), sender.a.id, sender.b.commitment);
    let err = import(None, &consignment, &context(&registry, &validator, &chain))
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::Validation(ref e) if e.kind == ErrorKind::InvalidWitness));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_import_tentative_witness_is_retryable() {
    let sender = sender();
    let consignment = export(&sender.ledger, &terminals(&[4])).unwrap();
    let registry = registry();
    let validator = Validator::default();

    let mut chain = sender.chain.clone();
    chain.set_status(sender.b.id, WitnessStatus::Tentative);
    let err = import(None, &consignment, &context(&registry, &validator, &chain))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ImportError::Validation(ref e)
            if e.opid == sender.b.opid && e.kind == ErrorKind::WitnessUnresolved
    ));
    assert!(err.is_retryable());
}

/// Issuer history with one `issue` extension minting 500 units to S9.
fn minted() -> (Ledger, Witness) {
    let mut ledger = issued_with_cap(5000);
    let op = ledger
        .call(
            CallParams::extension(ISSUE)
                .global(TOTAL_SUPPLY, StateValue::Amount(500))
                .assign(ASSET_OWNER, seal(9), StateValue::Amount(500)),
        )
        .unwrap();
    let witness = witness_for(&op, 0xE0);
    ledger.include(&op.id(), witness.clone()).unwrap();
    (ledger, witness)
}

#[tokio::test]
async fn test_import_extension() {
    let (ledger, witness) = minted();
    let consignment = export(&ledger, &terminals(&[9])).unwrap();
    let registry = registry();
    let validator = Validator::default();

    let mut chain = SnapshotResolver::default();
    chain
        .publish(witness.id, witness.commitment)
        .set_status(witness.id, WitnessStatus::Mined { depth: 100 });
    let outcome = import(None, &consignment, &context(&registry, &validator, &chain))
        .await
        .unwrap();
    assert_eq!(outcome.imported, vec![witness.opid]);
    assert_eq!(outcome.ledger.node(&witness.opid).unwrap().state, OpState::Final);
    assert_eq!(
        outcome.ledger.projection().seal(&seal(9)),
        ledger.projection().seal(&seal(9))
    );
}

#[tokio::test]
async fn test_import_extension_needs_published_commitment() {
    let (ledger, witness) = minted();
    let consignment = export(&ledger, &terminals(&[9])).unwrap();
    let registry = registry();
    let validator = Validator::default();

    // Mined, but the chain never saw this commitment.
    let mut chain = SnapshotResolver::default();
    chain.set_status(witness.id, WitnessStatus::Mined { depth: 100 });
    let err = import(None, &consignment, &context(&registry, &validator, &chain))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ImportError::Validation(ref e) if e.kind == ErrorKind::WitnessUnresolved)
    );
    assert!(err.is_retryable());

    chain.publish(witness.id, Commitment::from_bytes([0x55; 32]));
    let err = import(None, &consignment, &context(&registry, &validator, &chain))
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::Validation(ref e) if e.kind == ErrorKind::InvalidWitness));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_import_genesis_checks() {
    let sender = sender();
    let registry = registry();
    let validator = Validator::default();
    let ctx = context(&registry, &validator, &sender.chain);
    let consignment = export(&sender.ledger, &terminals(&[2])).unwrap();

    let mut headless = consignment.clone();
    headless.genesis = None;
    assert_eq!(
        import(None, &headless, &ctx).await.unwrap_err(),
        ImportError::MissingGenesis(consignment.contract_id)
    );

    let mut forged = consignment.clone();
    if let Some(genesis) = forged.genesis.as_mut() {
        genesis.signature = Signature([0; 64]);
    }
    assert_eq!(
        import(None, &forged, &ctx).await.unwrap_err(),
        ImportError::InvalidSignature(consignment.contract_id)
    );

    let empty = SchemaRegistry::new();
    let err = import(None, &consignment, &context(&empty, &validator, &sender.chain))
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::Schema(SchemaError::NotFound(_))));

    let other = issued_other();
    let err = import(Some(&other), &consignment, &ctx).await.unwrap_err();
    assert!(matches!(err, ImportError::ContractMismatch { .. }));
}

fn issued_other() -> Ledger {
    let mut genesis = issued().genesis().genesis.clone();
    genesis.timestamp += 1;
    let signer = IssuerSigner::from_secret_bytes(&[3; 32]);
    Ledger::issue(
        SignedGenesis::sign(genesis, &signer),
        Arc::new(standard::fungible_asset()),
        Validator::default(),
        MIN_CONFIRMATIONS,
    )
    .unwrap()
}

#[tokio::test]
async fn test_import_structure_checks() {
    let sender = sender();
    let registry = registry();
    let validator = Validator::default();
    let ctx = context(&registry, &validator, &sender.chain);
    let consignment = export(&sender.ledger, &terminals(&[4])).unwrap();

    let mut reversed = consignment.clone();
    reversed.operations.reverse();
    assert!(matches!(
        import(None, &reversed, &ctx).await.unwrap_err(),
        ImportError::Unordered { opid, .. } if opid == sender.b.opid
    ));

    let mut unwitnessed = consignment.clone();
    unwitnessed.witnesses.pop();
    assert_eq!(
        import(None, &unwitnessed, &ctx).await.unwrap_err(),
        ImportError::MissingWitness(sender.b.opid)
    );

    let mut doubled = consignment.clone();
    doubled.witnesses.push(sender.b.clone());
    assert_eq!(
        import(None, &doubled, &ctx).await.unwrap_err(),
        ImportError::DuplicateWitness(sender.b.opid)
    );

    let mut orphaned = export(&sender.ledger, &terminals(&[2])).unwrap();
    orphaned.witnesses.push(sender.b.clone());
    assert_eq!(
        import(None, &orphaned, &ctx).await.unwrap_err(),
        ImportError::OrphanWitness(sender.b.id)
    );

    let mut repeated = consignment.clone();
    repeated.operations.insert(1, repeated.operations[0].clone());
    assert_eq!(
        import(None, &repeated, &ctx).await.unwrap_err(),
        ImportError::DuplicateOperation(sender.a.opid)
    );

    let tight = ImportContext {
        max_operations: 1,
        ..ctx
    };
    assert_eq!(
        import(None, &consignment, &tight).await.unwrap_err(),
        ImportError::TooLarge { count: 2, max: 1 }
    );
}
