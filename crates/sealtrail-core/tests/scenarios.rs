//! End-to-end scenarios over issue, call, include, sync, export and import.
//!
//! S1 is the genesis seal holding the whole supply; S2 and S3 are the two
//! outputs of the first transfer.

mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::{
    anchor, context, issue, open_amounts, registry, seal, transfer, witness_for,
};
use sealtrail_core::consignment::{self, Consignment, ImportError};
use sealtrail_core::contract::{StateValue, WitnessStatus};
use sealtrail_core::ledger::{LedgerError, OpNode, OpState};
use sealtrail_core::resolver::SnapshotResolver;
use sealtrail_core::schema::standard::{ASSET_OWNER, TOTAL_SUPPLY};
use sealtrail_core::state::{self, StateFilter};
use sealtrail_core::validation::{ErrorKind, SealUse, Validator};

fn snapshot(ledger: &sealtrail_core::ledger::Ledger) -> Vec<OpNode> {
    ledger.nodes().cloned().collect()
}

#[test]
fn issue_allocates_supply_to_genesis_seal() {
    let ledger = issue(1000);
    let view = state::project(&ledger, &StateFilter::All);

    let owned = &view.owned[&ASSET_OWNER];
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].seal, seal(1));
    assert_eq!(owned[0].value, StateValue::Amount(1000));
    assert_eq!(view.aggregated[&TOTAL_SUPPLY], 1000);
}

#[test]
fn transfer_splits_after_include() {
    let mut ledger = issue(1000);
    let mut chain = SnapshotResolver::default();
    anchor(&mut ledger, &mut chain, transfer(&[1], &[(2, 600), (3, 400)]), 1);

    assert_eq!(
        open_amounts(&ledger),
        BTreeMap::from([(seal(2), 600), (seal(3), 400)])
    );
    assert!(matches!(
        ledger.projection().seal(&seal(1)).unwrap().status,
        SealUse::Spent { .. }
    ));
}

#[test]
fn inflation_is_rejected_without_change() {
    let mut ledger = issue(1000);
    let before = snapshot(&ledger);

    let err = ledger.call(transfer(&[1], &[(2, 600), (3, 401)])).unwrap_err();
    assert!(
        matches!(err, LedgerError::Validation(ref e) if e.kind == ErrorKind::AmountConservation)
    );
    assert_eq!(snapshot(&ledger), before);
    assert_eq!(open_amounts(&ledger), BTreeMap::from([(seal(1), 1000)]));

    let mut chain = SnapshotResolver::default();
    anchor(&mut ledger, &mut chain, transfer(&[1], &[(2, 600), (3, 400)]), 1);
    let after_split = snapshot(&ledger);
    assert!(ledger.call(transfer(&[2, 3], &[(4, 1001)])).is_err());
    assert_eq!(snapshot(&ledger), after_split);
}

#[tokio::test]
async fn double_spend_import_is_rejected() {
    let mut sender = issue(1000);
    let mut chain = SnapshotResolver::default();
    anchor(&mut sender, &mut chain, transfer(&[1], &[(2, 600), (3, 400)]), 1);

    let registry = registry();
    let validator = Validator::default();
    let ctx = context(&registry, &validator, &chain);
    let consignment = consignment::export(&sender, &BTreeSet::from([seal(2)])).unwrap();
    let receiver = consignment::import(None, &consignment, &ctx).await.unwrap().ledger;
    assert!(
        receiver
            .nodes()
            .skip(1)
            .all(|node| node.state == OpState::Final)
    );
    let before = snapshot(&receiver);

    // A competing spend of S1, built on a fork of the sender's history.
    let mut fork = issue(1000);
    let competing = fork.call(transfer(&[1], &[(9, 1000)])).unwrap();
    let witness = witness_for(&competing, 2);
    fork.include(&competing.id(), witness.clone()).unwrap();
    let forged = Consignment {
        contract_id: receiver.contract_id(),
        genesis: Some(receiver.genesis().clone()),
        operations: vec![competing],
        witnesses: vec![witness],
    };

    let err = consignment::import(Some(&receiver), &forged, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::Validation(ref e) if e.kind == ErrorKind::SealReuse));
    assert_eq!(snapshot(&receiver), before);
}

#[test]
fn export_is_minimal() {
    let mut ledger = issue(1000);
    let mut chain = SnapshotResolver::default();
    let split = anchor(&mut ledger, &mut chain, transfer(&[1], &[(2, 600), (3, 400)]), 1);
    anchor(&mut ledger, &mut chain, transfer(&[3], &[(5, 400)]), 2);

    let consignment = consignment::export(&ledger, &BTreeSet::from([seal(2)])).unwrap();
    assert_eq!(consignment.genesis.as_ref(), Some(ledger.genesis()));
    assert_eq!(consignment.operations, vec![split]);
    assert_eq!(consignment.witnesses.len(), 1);
}

#[test]
fn reorg_restores_genesis_allocation() {
    let mut ledger = issue(1000);
    let mut chain = SnapshotResolver::default();
    let split = anchor(&mut ledger, &mut chain, transfer(&[1], &[(2, 600), (3, 400)]), 1);
    let witness_id = ledger.node(&split.id()).unwrap().witness.as_ref().unwrap().id;

    let report = ledger.sync(&[(witness_id, WitnessStatus::Invalid)]);
    assert_eq!(report.retracted, vec![split.id()]);

    let view = state::project(&ledger, &StateFilter::All);
    assert_eq!(view.owned[&ASSET_OWNER].len(), 1);
    assert_eq!(view.owned[&ASSET_OWNER][0].seal, seal(1));
    assert_eq!(view.balance(&ASSET_OWNER), 1000);
    assert!(ledger.projection().seal(&seal(2)).is_none());
    assert!(ledger.projection().seal(&seal(3)).is_none());
}

#[test]
fn reorg_cascades_to_descendants() {
    let mut ledger = issue(1000);
    let mut chain = SnapshotResolver::default();
    let split = anchor(&mut ledger, &mut chain, transfer(&[1], &[(2, 600), (3, 400)]), 1);
    let child = anchor(&mut ledger, &mut chain, transfer(&[2], &[(4, 600)]), 2);
    let grandchild = ledger.call(transfer(&[4], &[(6, 600)])).unwrap();
    let witness_id = ledger.node(&split.id()).unwrap().witness.as_ref().unwrap().id;

    let report = ledger.sync(&[(witness_id, WitnessStatus::Invalid)]);
    assert_eq!(report.retracted, vec![grandchild.id(), child.id(), split.id()]);
    for opid in [split.id(), child.id(), grandchild.id()] {
        assert_eq!(ledger.node(&opid).unwrap().state, OpState::Retracted);
    }
    assert_eq!(open_amounts(&ledger), open_amounts(&issue(1000)));
}
