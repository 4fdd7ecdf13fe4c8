use std::collections::{BTreeMap, BTreeSet};

use super::standard::{self, ASSET_OWNER, TOTAL_SUPPLY, TRANSFER};
use super::*;
use crate::codec;
use crate::contract::{
    ContractId, Extension, Genesis, GlobalState, Operation, SealDefinition, StateValue, Transition,
    Txid,
};
use crate::crypto::IssuerId;

fn seal(byte: u8) -> SealDefinition {
    SealDefinition::new(Txid::from_bytes([byte; 32]), 0, 0)
}

fn genesis(schema: &Schema, amount: u64) -> Operation {
    Operation::Genesis(Genesis {
        schema_id: schema.id(),
        issuer: IssuerId([9; 32]),
        timestamp: 0,
        testnet: true,
        globals: BTreeMap::from([
            (standard::TICKER, vec![StateValue::text("TST")]),
            (standard::NAME, vec![StateValue::text("Test asset")]),
            (standard::PRECISION, vec![StateValue::Amount(8)]),
            (standard::MAX_SUPPLY, vec![StateValue::Amount(10_000)]),
            (TOTAL_SUPPLY, vec![StateValue::Amount(amount)]),
        ]),
        assignments: BTreeMap::from([(
            ASSET_OWNER,
            BTreeMap::from([(seal(1), StateValue::Amount(amount))]),
        )]),
    })
}

fn transfer(outputs: &[(u8, u64)]) -> Operation {
    Operation::Transition(Transition {
        contract_id: ContractId::default(),
        kind: TRANSFER,
        inputs: BTreeSet::from([seal(1)]),
        globals: GlobalState::new(),
        assignments: BTreeMap::from([(
            ASSET_OWNER,
            outputs
                .iter()
                .map(|(byte, amount)| (seal(*byte), StateValue::Amount(*amount)))
                .collect(),
        )]),
        nonce: 0,
    })
}

fn one_input() -> InputTypes {
    InputTypes::from([(ASSET_OWNER, 1)])
}

#[test]
fn test_standard_schemas_are_consistent() {
    standard::fungible_asset().check_definition().unwrap();
    standard::collectible().check_definition().unwrap();
}

#[test]
fn test_schema_id_is_content_derived() {
    assert_eq!(standard::fungible_asset().id(), standard::fungible_asset().id());
    assert_ne!(standard::fungible_asset().id(), standard::collectible().id());

    let schema = standard::fungible_asset();
    let decoded: Schema = codec::from_slice(&codec::to_vec(&schema)).unwrap();
    assert_eq!(decoded.id(), schema.id());
}

#[test]
fn test_register_is_idempotent() {
    let registry = SchemaRegistry::new();
    let a = registry.register(standard::fungible_asset()).unwrap();
    let b = registry.register(standard::fungible_asset()).unwrap();
    assert_eq!(a, b);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_registry_capacity() {
    let registry = SchemaRegistry::with_capacity(1);
    registry.register(standard::fungible_asset()).unwrap();
    assert_eq!(
        registry.register(standard::collectible()),
        Err(SchemaError::RegistryFull { max: 1 })
    );
}

#[test]
fn test_unknown_schema_fails_closed() {
    let registry = SchemaRegistry::new();
    let id = standard::fungible_asset().id();
    assert_eq!(registry.get(&id).unwrap_err(), SchemaError::NotFound(id));
}

#[test]
fn test_invalid_definition_rejected() {
    let mut schema = standard::fungible_asset();
    schema.transitions.get_mut(&TRANSFER).unwrap().rules = vec![ValidationRule::Conservation {
        state: TypeName::from_static("missing"),
    }];
    assert!(matches!(
        SchemaRegistry::new().register(schema),
        Err(SchemaError::Invalid { .. })
    ));

    let mut schema = standard::fungible_asset();
    schema.genesis.outputs.insert(ASSET_OWNER, Arity::new(3, 1));
    assert!(schema.check_definition().is_err());
}

#[test]
fn test_genesis_shape_ok() {
    let schema = standard::fungible_asset();
    schema.check_shape(&genesis(&schema, 1000), &InputTypes::new()).unwrap();
}

#[test]
fn test_missing_required_global() {
    let schema = standard::fungible_asset();
    let Operation::Genesis(mut g) = genesis(&schema, 1000) else {
        unreachable!()
    };
    g.globals.remove("ticker");
    let err = schema
        .check_shape(&Operation::Genesis(g), &InputTypes::new())
        .unwrap_err();
    assert!(matches!(err, ShapeError::Arity { section: "global", count: 0, .. }));
}

#[test]
fn test_global_domain_mismatch() {
    let schema = standard::fungible_asset();
    let Operation::Genesis(mut g) = genesis(&schema, 1000) else {
        unreachable!()
    };
    g.globals.insert(standard::PRECISION, vec![StateValue::text("eight")]);
    let err = schema
        .check_shape(&Operation::Genesis(g), &InputTypes::new())
        .unwrap_err();
    assert_eq!(
        err,
        ShapeError::Domain {
            name: standard::PRECISION
        }
    );
}

#[test]
fn test_transfer_shape() {
    let schema = standard::fungible_asset();
    schema
        .check_shape(&transfer(&[(2, 600), (3, 400)]), &one_input())
        .unwrap();

    // Transfers must spend at least one allocation.
    let err = schema
        .check_shape(&transfer(&[(2, 600)]), &InputTypes::new())
        .unwrap_err();
    assert!(matches!(err, ShapeError::Arity { section: "input", .. }));
}

#[test]
fn test_unknown_transition_kind() {
    let schema = standard::fungible_asset();
    let Operation::Transition(mut t) = transfer(&[(2, 1000)]) else {
        unreachable!()
    };
    t.kind = TypeName::from_static("burn");
    let err = schema
        .check_shape(&Operation::Transition(t), &one_input())
        .unwrap_err();
    assert!(matches!(err, ShapeError::UnknownOperation { .. }));
}

#[test]
fn test_undeclared_output_type() {
    let schema = standard::fungible_asset();
    let Operation::Transition(mut t) = transfer(&[(2, 1000)]) else {
        unreachable!()
    };
    t.assignments.insert(
        TypeName::from_static("votes"),
        BTreeMap::from([(seal(5), StateValue::Void)]),
    );
    let err = schema
        .check_shape(&Operation::Transition(t), &one_input())
        .unwrap_err();
    assert!(matches!(err, ShapeError::UnexpectedOwned { section: "output", .. }));
}

#[test]
fn test_owned_domain_mismatch() {
    let schema = standard::fungible_asset();
    let Operation::Transition(mut t) = transfer(&[(2, 1000)]) else {
        unreachable!()
    };
    t.assignments.insert(
        ASSET_OWNER,
        BTreeMap::from([(seal(2), StateValue::Token { index: 0, amount: 1 })]),
    );
    let err = schema
        .check_shape(&Operation::Transition(t), &one_input())
        .unwrap_err();
    assert!(matches!(err, ShapeError::Domain { .. }));
}

#[test]
fn test_extension_shape_via_registry() {
    let registry = SchemaRegistry::new();
    let id = registry.register(standard::fungible_asset()).unwrap();
    let issue = Operation::Extension(Extension {
        contract_id: ContractId::default(),
        kind: standard::ISSUE,
        globals: BTreeMap::from([(TOTAL_SUPPLY, vec![StateValue::Amount(5)])]),
        assignments: BTreeMap::from([(
            ASSET_OWNER,
            BTreeMap::from([(seal(7), StateValue::Amount(5))]),
        )]),
        nonce: 0,
    });
    registry
        .validate_operation_shape(&id, &issue, &InputTypes::new())
        .unwrap();
}

#[test]
fn test_schema_json_round_trip() {
    let schema = standard::collectible();
    let json = serde_json::to_string(&schema).unwrap();
    let back: Schema = serde_json::from_str(&json).unwrap();
    assert_eq!(back, schema);
}
