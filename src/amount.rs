// LNP/BP BOLT-3 library building deterministic Lightning network
// commitment transactions
// Written in 2020 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the MIT License
// along with this software.
// If not, see <https://opensource.org/licenses/MIT>.

//! Fixed-point channel amounts.
//!
//! Channel balances and HTLC values are accounted in millisatoshis, while
//! on-chain outputs can carry only whole satoshis. Both representations are
//! plain unsigned integers wrapped into dedicated newtypes, so units can
//! never be mixed implicitly. Overflowing arithmetic on channel amounts is a
//! protocol-level contract violation: both parties have already agreed on
//! balances fitting the funding amount, so we panic instead of wrapping.

use core::ops::{Add, Sub};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

pub const MSAT_IN_SAT: u64 = 1000;

/// Millisatoshi amount: the off-chain accounting unit of a channel
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
#[derive(
    Wrapper,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Display,
    Default,
    From,
)]
#[display("{0} msat")]
pub struct MilliSatoshi(u64);

/// Satoshi amount: the unit of on-chain transaction outputs
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
#[derive(
    Wrapper,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Display,
    Default,
    From,
)]
#[display("{0} sat")]
pub struct Satoshi(u64);

impl MilliSatoshi {
    pub const ZERO: MilliSatoshi = MilliSatoshi(0);

    /// Truncates toward zero; the sub-satoshi remainder is not representable
    /// on-chain and implicitly goes to fees
    #[inline]
    pub fn to_sat_floor(self) -> Satoshi {
        Satoshi(self.0 / MSAT_IN_SAT)
    }

    #[inline]
    pub fn checked_add(self, rhs: MilliSatoshi) -> Option<MilliSatoshi> {
        self.0.checked_add(rhs.0).map(MilliSatoshi)
    }

    #[inline]
    pub fn saturating_sub(self, rhs: MilliSatoshi) -> MilliSatoshi {
        MilliSatoshi(self.0.saturating_sub(rhs.0))
    }

    /// `self >= limit`, evaluated without leaving the millisatoshi domain
    #[inline]
    pub fn clears(self, limit: Satoshi) -> bool {
        self.to_sat_floor() >= limit
    }
}

impl Satoshi {
    pub const ZERO: Satoshi = Satoshi(0);

    #[inline]
    pub fn to_msat(self) -> MilliSatoshi {
        MilliSatoshi(
            self.0
                .checked_mul(MSAT_IN_SAT)
                .expect("satoshi amount overflows millisatoshi domain"),
        )
    }

    #[inline]
    pub fn checked_add(self, rhs: Satoshi) -> Option<Satoshi> {
        self.0.checked_add(rhs.0).map(Satoshi)
    }
}

impl Add for MilliSatoshi {
    type Output = MilliSatoshi;

    fn add(self, rhs: MilliSatoshi) -> MilliSatoshi {
        self.checked_add(rhs)
            .expect("millisatoshi amount addition overflow")
    }
}

impl Add for Satoshi {
    type Output = Satoshi;

    fn add(self, rhs: Satoshi) -> Satoshi {
        self.checked_add(rhs)
            .expect("satoshi amount addition overflow")
    }
}

impl Sub for Satoshi {
    type Output = Satoshi;

    fn sub(self, rhs: Satoshi) -> Satoshi {
        Satoshi(
            self.0
                .checked_sub(rhs.0)
                .expect("satoshi amount subtraction underflow"),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn msat_truncates_toward_zero() {
        assert_eq!(MilliSatoshi::from(999).to_sat_floor(), Satoshi::from(0));
        assert_eq!(MilliSatoshi::from(1000).to_sat_floor(), Satoshi::from(1));
        assert_eq!(MilliSatoshi::from(1999).to_sat_floor(), Satoshi::from(1));
    }

    #[test]
    fn msat_clears_sat_limit() {
        let dust = Satoshi::from(546);
        assert!(MilliSatoshi::from(546_000).clears(dust));
        assert!(MilliSatoshi::from(546_999).clears(dust));
        assert!(!MilliSatoshi::from(545_999).clears(dust));
    }

    #[test]
    fn saturating_sub_floors_at_zero() {
        let a = MilliSatoshi::from(5_000);
        let b = MilliSatoshi::from(7_000);
        assert_eq!(a.saturating_sub(b), MilliSatoshi::ZERO);
        assert_eq!(b.saturating_sub(a), MilliSatoshi::from(2_000));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn amounts_serialize_transparently() {
        let amount = MilliSatoshi::from(42_000);
        assert_eq!(serde_json::to_string(&amount).unwrap(), "42000");
        assert_eq!(
            serde_json::from_str::<Satoshi>("546").unwrap(),
            Satoshi::from(546)
        );
    }

    #[test]
    #[should_panic(expected = "millisatoshi amount addition overflow")]
    fn msat_addition_overflow_panics() {
        let _ = MilliSatoshi::from(u64::MAX) + MilliSatoshi::from(1);
    }

    #[test]
    #[should_panic(expected = "satoshi amount overflows millisatoshi domain")]
    fn sat_to_msat_overflow_panics() {
        let _ = Satoshi::from(u64::MAX / 10).to_msat();
    }
}
