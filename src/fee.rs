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

//! Commitment fee arithmetic and the HTLC trimming classifier.
//!
//! All weights are the protocol constants from BOLT #3; feerates are
//! expressed in satoshis per 1000 weight units. Trimming and fee sizing must
//! agree bit-for-bit between the two channel parties, so everything here is
//! pure integer arithmetic over the shared constants and the single
//! [`htlc_is_trimmed`] predicate.

use crate::amount::{MilliSatoshi, Satoshi};
use crate::channel::{Htlc, Side};

/// Weight of a commitment transaction with no HTLC outputs
pub const COMMITMENT_TX_BASE_WEIGHT: u64 = 724;
/// Weight added to a commitment transaction by each untrimmed HTLC output
pub const COMMITMENT_TX_WEIGHT_PER_HTLC: u64 = 172;
/// Weight of the HTLC-timeout transaction claiming an offered HTLC
pub const HTLC_TIMEOUT_TX_WEIGHT: u64 = 663;
/// Weight of the HTLC-success transaction claiming a received HTLC
pub const HTLC_SUCCESS_TX_WEIGHT: u64 = 703;

#[inline]
fn weight_fee(feerate_per_kw: u32, weight: u64) -> Satoshi {
    Satoshi::from(
        (feerate_per_kw as u64)
            .checked_mul(weight)
            .expect("fee computation overflow")
            / 1000,
    )
}

/// Fee of the second-stage transaction claiming an offered HTLC after its
/// expiry
#[inline]
pub fn htlc_timeout_fee(feerate_per_kw: u32) -> Satoshi {
    weight_fee(feerate_per_kw, HTLC_TIMEOUT_TX_WEIGHT)
}

/// Fee of the second-stage transaction claiming a received HTLC with a known
/// preimage
#[inline]
pub fn htlc_success_fee(feerate_per_kw: u32) -> Satoshi {
    weight_fee(feerate_per_kw, HTLC_SUCCESS_TX_WEIGHT)
}

/// Base fee of a commitment transaction carrying `untrimmed` HTLC outputs.
///
/// Monotonic non-decreasing in both arguments.
#[inline]
pub fn commit_tx_base_fee(feerate_per_kw: u32, untrimmed: usize) -> Satoshi {
    let weight = COMMITMENT_TX_BASE_WEIGHT
        + COMMITMENT_TX_WEIGHT_PER_HTLC * untrimmed as u64;
    weight_fee(feerate_per_kw, weight)
}

/// Whether the HTLC is excluded from `side`'s commitment transaction as
/// economically unspendable.
///
/// An HTLC is trimmed when its value does not cover the dust limit plus the
/// fee of the second-stage transaction its owner would have to publish:
/// HTLC-timeout for HTLCs offered by `side`, HTLC-success for received ones.
/// The two parties may disagree here, since each prices its own version of
/// the commitment transaction.
pub fn htlc_is_trimmed(
    htlc: &Htlc,
    feerate_per_kw: u32,
    dust_limit: Satoshi,
    side: Side,
) -> bool {
    let claim_fee = if htlc.offered_by(side) {
        htlc_timeout_fee(feerate_per_kw)
    } else {
        htlc_success_fee(feerate_per_kw)
    };
    htlc.amount.to_sat_floor() < dust_limit + claim_fee
}

/// Number of HTLCs which keep a dedicated output on `side`'s commitment
/// transaction at the given feerate; sizes the base fee calculation
pub fn count_untrimmed(
    htlcs: &[Htlc],
    feerate_per_kw: u32,
    dust_limit: Satoshi,
    side: Side,
) -> usize {
    htlcs
        .iter()
        .filter(|htlc| !htlc_is_trimmed(htlc, feerate_per_kw, dust_limit, side))
        .count()
}

/// Subtracts the base fee from the channel opener's balance, flooring at
/// zero.
///
/// `self_pay` is the balance of `side` (the party whose transaction is being
/// built), `other_pay` the counterparty's one; the opener always pays the
/// commitment fee regardless of which side builds.
pub fn subtract_fee(
    opener: Side,
    side: Side,
    fee: Satoshi,
    self_pay: &mut MilliSatoshi,
    other_pay: &mut MilliSatoshi,
) {
    let payer = if opener == side { self_pay } else { other_pay };
    *payer = payer.saturating_sub(fee.to_msat());
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::channel::HashLock;

    fn htlc(amount_msat: u64, owner: Side) -> Htlc {
        Htlc {
            id: 0,
            amount: MilliSatoshi::from(amount_msat),
            payment_hash: HashLock::from_preimage(&[0u8; 32]),
            cltv_expiry: 500,
            owner,
        }
    }

    #[test]
    fn base_fee_matches_bolt3_vectors() {
        // weight 724, feerate 15000 per kw
        assert_eq!(commit_tx_base_fee(15_000, 0), Satoshi::from(10_860));
        // weight 724 + 5 * 172 = 1584
        assert_eq!(commit_tx_base_fee(647, 5), Satoshi::from(1_024));
        assert_eq!(commit_tx_base_fee(0, 5), Satoshi::from(0));
    }

    #[test]
    fn base_fee_is_monotonic() {
        let mut prev = Satoshi::ZERO;
        for feerate in (0..50_000u32).step_by(997) {
            let fee = commit_tx_base_fee(feerate, 3);
            assert!(fee >= prev);
            assert!(commit_tx_base_fee(feerate, 4) >= fee);
            prev = fee;
        }
    }

    #[test]
    fn trim_boundary_received_htlc() {
        // 1000 sat received HTLC, dust 546: success fee at feerate 647 is
        // 454 sat, so 546 + 454 = 1000 is still kept; one unit above trims
        let h = htlc(1_000_000, Side::Remote);
        let dust = Satoshi::from(546);
        assert!(!htlc_is_trimmed(&h, 647, dust, Side::Local));
        assert!(htlc_is_trimmed(&h, 648, dust, Side::Local));
    }

    #[test]
    fn trim_depends_on_viewing_side() {
        // Offered HTLCs are priced with the cheaper timeout transaction, so
        // near the boundary the owner keeps what the counterparty trims
        let h = htlc(1_000_000, Side::Local);
        let dust = Satoshi::from(546);
        assert!(!htlc_is_trimmed(&h, 684, dust, Side::Local));
        assert!(htlc_is_trimmed(&h, 684, dust, Side::Remote));
    }

    #[test]
    fn trimming_is_monotonic_in_feerate() {
        let htlcs = vec![
            htlc(900_000, Side::Local),
            htlc(1_000_000, Side::Remote),
            htlc(2_500_000, Side::Local),
            htlc(4_000_000, Side::Remote),
        ];
        let dust = Satoshi::from(546);
        let mut prev = htlcs.len();
        for feerate in (0..10_000u32).step_by(13) {
            let n = count_untrimmed(&htlcs, feerate, dust, Side::Local);
            assert!(n <= prev);
            prev = n;
        }
    }

    #[test]
    fn fee_comes_out_of_opener_balance() {
        let fee = Satoshi::from(10_860);

        let mut self_pay = MilliSatoshi::from(6_000_000_000);
        let mut other_pay = MilliSatoshi::from(3_000_000_000);
        subtract_fee(Side::Local, Side::Local, fee, &mut self_pay, &mut other_pay);
        assert_eq!(self_pay, MilliSatoshi::from(5_989_140_000));
        assert_eq!(other_pay, MilliSatoshi::from(3_000_000_000));

        // same opener seen from the remote side's build
        let mut self_pay = MilliSatoshi::from(3_000_000_000);
        let mut other_pay = MilliSatoshi::from(6_000_000_000);
        subtract_fee(Side::Local, Side::Remote, fee, &mut self_pay, &mut other_pay);
        assert_eq!(self_pay, MilliSatoshi::from(3_000_000_000));
        assert_eq!(other_pay, MilliSatoshi::from(5_989_140_000));
    }

    #[test]
    fn fee_subtraction_floors_at_zero() {
        let mut self_pay = MilliSatoshi::from(5_000);
        let mut other_pay = MilliSatoshi::from(3_000_000_000);
        subtract_fee(
            Side::Local,
            Side::Local,
            Satoshi::from(10_860),
            &mut self_pay,
            &mut other_pay,
        );
        assert_eq!(self_pay, MilliSatoshi::ZERO);
        assert_eq!(other_pay, MilliSatoshi::from(3_000_000_000));
    }
}
