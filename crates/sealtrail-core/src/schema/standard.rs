//! Ready-made schemas for common contract shapes.

use std::collections::BTreeMap;

use super::{
    Arity, GlobalDomain, GlobalType, OperationSchema, OwnedDomain, OwnedType, Schema,
    ValidationRule,
};
use crate::contract::TypeName;

/// Owned type holding fungible balances in [`fungible_asset`].
pub const ASSET_OWNER: TypeName = TypeName::from_static("assetOwner");
/// Summed issuance series in [`fungible_asset`].
pub const TOTAL_SUPPLY: TypeName = TypeName::from_static("total_supply");
/// Issuance cap in [`fungible_asset`].
pub const MAX_SUPPLY: TypeName = TypeName::from_static("max_supply");
/// Transition moving balances.
pub const TRANSFER: TypeName = TypeName::from_static("transfer");
/// Extension minting new balances under the cap.
pub const ISSUE: TypeName = TypeName::from_static("issue");
/// Owned type holding tokens in [`collectible`].
pub const TOKEN_OWNER: TypeName = TypeName::from_static("tokenOwner");
/// Asset ticker declared by genesis.
pub const TICKER: TypeName = TypeName::from_static("ticker");
/// Human-readable contract name.
pub const NAME: TypeName = TypeName::from_static("name");
/// Decimal places of [`fungible_asset`] amounts.
pub const PRECISION: TypeName = TypeName::from_static("precision");
/// Free-form description of a [`collectible`].
pub const DETAILS: TypeName = TypeName::from_static("details");

/// A capped fungible asset.
///
/// Genesis declares `ticker`, `name`, `precision` and `max_supply` once and
/// reports its allocation in `total_supply`. `transfer` conserves
/// `assetOwner` amounts; `issue` mints further amounts up to the cap.
#[must_use]
pub fn fungible_asset() -> Schema {
    let issuance = ValidationRule::CappedIssuance {
        state: ASSET_OWNER,
        cap: MAX_SUPPLY,
        supply: TOTAL_SUPPLY,
    };

    Schema {
        name: "FungibleAsset".into(),
        global_types: BTreeMap::from([
            (TICKER, GlobalType::once(GlobalDomain::Data)),
            (NAME, GlobalType::once(GlobalDomain::Data)),
            (PRECISION, GlobalType::once(GlobalDomain::Amount)),
            (MAX_SUPPLY, GlobalType::once(GlobalDomain::Amount)),
            (TOTAL_SUPPLY, GlobalType::summed()),
        ]),
        owned_types: BTreeMap::from([(
            ASSET_OWNER,
            OwnedType {
                domain: OwnedDomain::Fungible,
            },
        )]),
        genesis: OperationSchema {
            inputs: BTreeMap::new(),
            outputs: BTreeMap::from([(ASSET_OWNER, Arity::any())]),
            globals: BTreeMap::from([
                (TICKER, Arity::once()),
                (NAME, Arity::once()),
                (PRECISION, Arity::once()),
                (MAX_SUPPLY, Arity::once()),
                (TOTAL_SUPPLY, Arity::once()),
            ]),
            rules: vec![issuance.clone()],
        },
        transitions: BTreeMap::from([(
            TRANSFER,
            OperationSchema {
                inputs: BTreeMap::from([(ASSET_OWNER, Arity::some())]),
                outputs: BTreeMap::from([(ASSET_OWNER, Arity::any())]),
                globals: BTreeMap::new(),
                rules: vec![ValidationRule::Conservation {
                    state: ASSET_OWNER,
                }],
            },
        )]),
        extensions: BTreeMap::from([(
            ISSUE,
            OperationSchema {
                inputs: BTreeMap::new(),
                outputs: BTreeMap::from([(ASSET_OWNER, Arity::some())]),
                globals: BTreeMap::from([(TOTAL_SUPPLY, Arity::once())]),
                rules: vec![issuance],
            },
        )]),
    }
}

/// A collection of unique tokens, each carried with unit amount.
///
/// `transfer` must reproduce exactly the token indices it consumes.
#[must_use]
pub fn collectible() -> Schema {
    let fixed = ValidationRule::FixedField {
        state: TOKEN_OWNER,
    };

    Schema {
        name: "Collectible".into(),
        global_types: BTreeMap::from([
            (NAME, GlobalType::once(GlobalDomain::Data)),
            (DETAILS, GlobalType::once(GlobalDomain::Data)),
        ]),
        owned_types: BTreeMap::from([(
            TOKEN_OWNER,
            OwnedType {
                domain: OwnedDomain::Structured,
            },
        )]),
        genesis: OperationSchema {
            inputs: BTreeMap::new(),
            outputs: BTreeMap::from([(TOKEN_OWNER, Arity::some())]),
            globals: BTreeMap::from([
                (NAME, Arity::once()),
                (DETAILS, Arity::optional()),
            ]),
            rules: vec![fixed.clone()],
        },
        transitions: BTreeMap::from([(
            TRANSFER,
            OperationSchema {
                inputs: BTreeMap::from([(TOKEN_OWNER, Arity::some())]),
                outputs: BTreeMap::from([(TOKEN_OWNER, Arity::some())]),
                globals: BTreeMap::new(),
                rules: vec![fixed],
            },
        )]),
        extensions: BTreeMap::new(),
    }
}
