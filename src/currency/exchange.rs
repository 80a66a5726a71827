//! Currency exchange resolver.
//!
//! Compares the currency an offer requires against what the counterparty
//! offers. With the matching policy flag set, a shortfall in one currency
//! may be covered by surplus of the other at the market key price. The
//! offered total is adjusted in place so later checks see the converted
//! amounts.

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::types::{truncate2, CurrencyTotal};

/// Which conversions are allowed. Both are off unless configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct ExchangePolicy {
    /// Cover a metal shortfall with offered keys.
    #[serde(default, rename = "keys->metal")]
    pub keys_to_metal: bool,
    /// Cover a key shortfall with offered metal.
    #[serde(default, rename = "metal->keys")]
    pub metal_to_keys: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeOutcome {
    pub metal_ok: bool,
    pub keys_ok: bool,
}

/// Resolve `offered` against `required`, converting where policy allows.
///
/// Keys are only considered once metal is satisfied. A key conversion
/// spends metal, so metal sufficiency is checked again afterwards.
pub fn resolve(
    required: &CurrencyTotal,
    offered: &mut CurrencyTotal,
    key_price: Decimal,
    policy: ExchangePolicy,
) -> ExchangeOutcome {
    let mut metal_ok = offered.metal >= required.metal;

    if !metal_ok && policy.keys_to_metal && offered.keys > Decimal::ZERO && key_price > Decimal::ZERO {
        let reachable = truncate2(offered.metal + offered.keys * key_price);
        if reachable >= required.metal {
            let needed = required.metal - offered.metal;
            let keys_spent = needed / key_price;
            offered.metal = required.metal;
            offered.keys = truncate2(offered.keys - keys_spent).max(Decimal::ZERO);
            metal_ok = true;
            debug!(needed = %needed, keys_spent = %keys_spent, "Covered metal shortfall with keys");
        }
    }

    if !metal_ok {
        return ExchangeOutcome {
            metal_ok,
            keys_ok: offered.keys >= required.keys,
        };
    }

    let mut keys_ok = offered.keys >= required.keys;

    if !keys_ok && policy.metal_to_keys && offered.metal > Decimal::ZERO && key_price > Decimal::ZERO {
        let reachable = truncate2(offered.keys + offered.metal / key_price);
        if reachable >= required.keys {
            let needed = required.keys - offered.keys;
            let metal_spent = needed * key_price;
            offered.keys = required.keys;
            offered.metal = truncate2(offered.metal - metal_spent).max(Decimal::ZERO);
            keys_ok = true;
            metal_ok = offered.metal >= required.metal;
            debug!(needed = %needed, metal_spent = %metal_spent, metal_ok, "Covered key shortfall with metal");
        }
    }

    ExchangeOutcome { metal_ok, keys_ok }
}
