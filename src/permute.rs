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

//! Canonical BIP69+CLTV output ordering.
//!
//! Both channel parties must sort the outputs of their commitment
//! transactions into exactly the same order, otherwise the transactions they
//! sign are not byte-identical. The comparator is therefore part of the wire
//! compatibility contract: amount first, then script bytes lexicographically,
//! then, for HTLC outputs sharing amount and script (same payment hash and
//! value used twice), CLTV expiry, and finally the HTLC id, which is unique
//! per channel and makes the order total.

use core::cmp::Ordering;

use bitcoin::TxOut;

use crate::scripts::WitnessScript;

/// Logical entity backing one output slot of a commitment transaction.
///
/// `ToLocal`/`ToRemote` tags exist so the finalizer can locate the two
/// balance outputs again after the permutation; they are cleared from the
/// returned slot map before the build result is handed to the caller.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
#[display(Debug)]
pub enum Backing {
    Htlc { id: u64, cltv_expiry: u32 },
    ToLocal,
    ToRemote,
}

/// One output of the transaction under construction together with the
/// per-slot metadata which must survive the permutation in sync with it
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct OutputSlot {
    pub txout: TxOut,
    pub backing: Backing,
    /// Witness script of P2WSH outputs, recorded for the signer; `None` for
    /// the P2WPKH `to_remote` output
    pub witness_script: Option<WitnessScript>,
}

fn canonical_cmp(a: &OutputSlot, b: &OutputSlot) -> Ordering {
    a.txout
        .value
        .cmp(&b.txout.value)
        .then_with(|| {
            a.txout
                .script_pubkey
                .as_bytes()
                .cmp(b.txout.script_pubkey.as_bytes())
        })
        .then_with(|| match (a.backing, b.backing) {
            (
                Backing::Htlc { cltv_expiry: ca, id: ia },
                Backing::Htlc { cltv_expiry: cb, id: ib },
            ) => ca.cmp(&cb).then(ia.cmp(&ib)),
            // amount + script already distinguish non-HTLC outputs
            _ => Ordering::Equal,
        })
}

/// Reorders the output slots into the canonical order, carrying the backing
/// entities and witness scripts along with their outputs.
///
/// The sort is stable and the comparator is a total order over any slot set
/// a commitment transaction can produce, so the permutation is deterministic
/// and idempotent.
pub fn permute_outputs(slots: &mut [OutputSlot]) {
    slots.sort_by(canonical_cmp);
}

#[cfg(test)]
mod test {
    use super::*;
    use bitcoin::blockdata::script::Builder;
    use bitcoin::Script;

    fn slot(value: u64, script: Script, backing: Backing) -> OutputSlot {
        OutputSlot {
            txout: TxOut {
                value,
                script_pubkey: script,
            },
            backing,
            witness_script: None,
        }
    }

    fn script(bytes: &[u8]) -> Script {
        Builder::new().push_slice(bytes).into_script()
    }

    fn htlc(id: u64, cltv_expiry: u32) -> Backing {
        Backing::Htlc { id, cltv_expiry }
    }

    #[test]
    fn orders_by_amount_first() {
        let mut slots = vec![
            slot(3_000, script(b"aa"), Backing::ToLocal),
            slot(1_000, script(b"zz"), htlc(0, 500)),
            slot(2_000, script(b"mm"), Backing::ToRemote),
        ];
        permute_outputs(&mut slots);
        let values: Vec<_> =
            slots.iter().map(|s| s.txout.value).collect();
        assert_eq!(values, vec![1_000, 2_000, 3_000]);
    }

    #[test]
    fn script_breaks_amount_ties() {
        let mut slots = vec![
            slot(1_000, script(b"bb"), htlc(1, 500)),
            slot(1_000, script(b"ab"), htlc(2, 500)),
            slot(1_000, script(b"aa"), Backing::ToRemote),
        ];
        permute_outputs(&mut slots);
        assert_eq!(slots[0].backing, Backing::ToRemote);
        assert_eq!(slots[1].backing, htlc(2, 500));
        assert_eq!(slots[2].backing, htlc(1, 500));
    }

    #[test]
    fn cltv_breaks_script_ties_between_htlcs() {
        // same amount, same script (duplicate payment hash), distinct expiry
        let spk = script(b"duplicate");
        let mut slots = vec![
            slot(1_000, spk.clone(), htlc(7, 505)),
            slot(1_000, spk.clone(), htlc(3, 502)),
            slot(1_000, spk, htlc(5, 504)),
        ];
        permute_outputs(&mut slots);
        assert_eq!(slots[0].backing, htlc(3, 502));
        assert_eq!(slots[1].backing, htlc(5, 504));
        assert_eq!(slots[2].backing, htlc(7, 505));
    }

    #[test]
    fn htlc_id_makes_the_order_total() {
        let spk = script(b"duplicate");
        let mut slots = vec![
            slot(1_000, spk.clone(), htlc(9, 500)),
            slot(1_000, spk.clone(), htlc(4, 500)),
            slot(1_000, spk, htlc(6, 500)),
        ];
        permute_outputs(&mut slots);
        assert_eq!(slots[0].backing, htlc(4, 500));
        assert_eq!(slots[1].backing, htlc(6, 500));
        assert_eq!(slots[2].backing, htlc(9, 500));
    }

    #[test]
    fn permutation_is_idempotent() {
        let mut slots = vec![
            slot(2_000, script(b"x"), htlc(0, 501)),
            slot(1_000, script(b"y"), htlc(1, 500)),
            slot(1_000, script(b"y"), htlc(2, 499)),
            slot(5_000, script(b"w"), Backing::ToLocal),
            slot(4_000, script(b"v"), Backing::ToRemote),
        ];
        permute_outputs(&mut slots);
        let once = slots.clone();
        permute_outputs(&mut slots);
        assert_eq!(once, slots);
    }
}
