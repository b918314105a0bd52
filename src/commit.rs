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

//! Commitment transaction builder.
//!
//! Single entry point of the library: [`CommitmentTx::build`] turns the
//! channel balances and the in-flight HTLC set into the commitment
//! transaction both parties must be able to reproduce byte-identically. The
//! pipeline follows the BOLT #3 construction order: trim, compute and
//! subtract the base fee, emit HTLC and balance outputs, sort them into the
//! canonical order and attach the funding input with the obscured commitment
//! number encoded into locktime and sequence.
//!
//! All inputs are assumed pre-validated by the channel state machine;
//! violations are programming errors and abort the build instead of being
//! reported as recoverable results, since a malformed commitment transaction
//! must never reach the signer.

use amplify::Wrapper;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use bitcoin::{OutPoint, Transaction, TxIn, TxOut};

use crate::amount::{MilliSatoshi, Satoshi};
use crate::channel::{Htlc, Keyset, Side};
use crate::fee::{commit_tx_base_fee, count_untrimmed, htlc_is_trimmed, subtract_fee};
use crate::permute::{permute_outputs, Backing, OutputSlot};
use crate::scripts::{PubkeyScript, ScriptGenerators, WitnessScript};

/// Commitment transactions are version 2 by BOLT #3
pub const COMMITMENT_TX_VERSION: i32 = 2;

/// Locktime field of a commitment transaction: upper 8 bits are 0x20, lower
/// 24 bits are the lower 24 bits of the obscured commitment number
#[inline]
pub fn commitment_locktime(obscured_commitment_number: u64) -> u32 {
    0x20000000 | (obscured_commitment_number & 0xFFFFFF) as u32
}

/// Sequence field of the funding input: upper 8 bits are 0x80, lower 24 bits
/// are the upper 24 bits of the obscured commitment number
#[inline]
pub fn commitment_sequence(obscured_commitment_number: u64) -> u32 {
    0x80000000 | ((obscured_commitment_number >> 24) & 0xFFFFFF) as u32
}

/// Recovers the 48-bit obscured commitment number steganographically encoded
/// into the locktime and funding input sequence of a commitment transaction
#[inline]
pub fn recover_commitment_number(locktime: u32, sequence: u32) -> u64 {
    ((sequence as u64 & 0xFFFFFF) << 24) | (locktime as u64 & 0xFFFFFF)
}

/// Observer of intermediate build values; replaces ad-hoc verbose tracing.
///
/// All methods default to no-ops, so tracing is never required for
/// correctness and costs nothing unless a tracer is supplied.
pub trait BuildTracer {
    fn base_fee(&mut self, _fee: Satoshi) {}
    fn htlc_output(
        &mut self,
        _htlc: &Htlc,
        _amount: Satoshi,
        _witness_script: &WitnessScript,
    ) {
    }
    fn to_local_output(
        &mut self,
        _amount: Satoshi,
        _witness_script: &WitnessScript,
    ) {
    }
    fn to_remote_output(&mut self, _amount: Satoshi) {}
}

/// The default silent tracer
pub struct NoTrace;

impl BuildTracer for NoTrace {}

/// Inputs of a single commitment transaction build.
///
/// `side` selects whose version of the transaction is produced: the same
/// logical channel state yields different (but mutually signable)
/// transactions for the two parties.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CommitmentTx {
    pub funding_outpoint: OutPoint,
    pub funding: Satoshi,
    /// The channel opener, who pays the commitment fee on both versions
    pub opener: Side,
    pub to_self_delay: u16,
    pub keyset: Keyset,
    pub feerate_per_kw: u32,
    pub dust_limit: Satoshi,
    /// Balance of `side` before fees
    pub self_pay: MilliSatoshi,
    /// Balance of the counterparty before fees
    pub other_pay: MilliSatoshi,
    pub htlcs: Vec<Htlc>,
    pub obscured_commitment_number: u64,
    pub side: Side,
}

/// Result of a commitment transaction build, handed to the signer.
///
/// `htlc_map`, `witness_scripts` and the transaction outputs are parallel
/// arrays: entry `n` describes `tx.output[n]`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BuiltCommitment {
    pub tx: Transaction,
    /// Id of the HTLC backing each output slot; `None` for balance outputs
    pub htlc_map: Vec<Option<u64>>,
    /// Witness script per P2WSH output slot; `None` for `to_remote`
    pub witness_scripts: Vec<Option<WitnessScript>>,
    pub to_local_index: Option<usize>,
    pub to_remote_index: Option<usize>,
}

impl CommitmentTx {
    /// Number of HTLCs keeping a dedicated output at the current feerate;
    /// usable for fee estimation before a full build
    #[inline]
    pub fn num_untrimmed(&self) -> usize {
        count_untrimmed(
            &self.htlcs,
            self.feerate_per_kw,
            self.dust_limit,
            self.side,
        )
    }

    /// Base fee this transaction pays at the current feerate
    #[inline]
    pub fn base_fee(&self) -> Satoshi {
        commit_tx_base_fee(self.feerate_per_kw, self.num_untrimmed())
    }

    /// Builds the commitment transaction silently
    #[inline]
    pub fn build(&self) -> BuiltCommitment {
        self.build_traced(&mut NoTrace)
    }

    /// Builds the commitment transaction, reporting intermediate values to
    /// the given tracer
    pub fn build_traced(
        &self,
        tracer: &mut impl BuildTracer,
    ) -> BuiltCommitment {
        let total_pay = self.self_pay + self.other_pay;
        assert!(
            total_pay <= self.funding.to_msat(),
            "channel balances exceed the funding amount"
        );

        let untrimmed = self.num_untrimmed();
        let base_fee = commit_tx_base_fee(self.feerate_per_kw, untrimmed);
        tracer.base_fee(base_fee);

        let mut self_pay = self.self_pay;
        let mut other_pay = self.other_pay;
        subtract_fee(
            self.opener,
            self.side,
            base_fee,
            &mut self_pay,
            &mut other_pay,
        );

        // Worst case: every untrimmed HTLC plus both balance outputs
        let mut slots: Vec<OutputSlot> = Vec::with_capacity(untrimmed + 2);

        for htlc in self.htlcs.iter().filter(|h| h.offered_by(self.side)) {
            if htlc_is_trimmed(
                htlc,
                self.feerate_per_kw,
                self.dust_limit,
                self.side,
            ) {
                continue;
            }
            let amount = htlc.amount.to_sat_floor();
            let witness_script = WitnessScript::ln_offered_htlc(
                amount,
                &self.keyset,
                htlc.payment_hash.ripemd160(),
            );
            tracer.htlc_output(htlc, amount, &witness_script);
            slots.push(OutputSlot {
                txout: TxOut {
                    value: amount.into_inner(),
                    script_pubkey: witness_script.to_p2wsh().into(),
                },
                backing: Backing::Htlc {
                    id: htlc.id,
                    cltv_expiry: htlc.cltv_expiry,
                },
                witness_script: Some(witness_script),
            });
        }

        for htlc in self.htlcs.iter().filter(|h| !h.offered_by(self.side)) {
            if htlc_is_trimmed(
                htlc,
                self.feerate_per_kw,
                self.dust_limit,
                self.side,
            ) {
                continue;
            }
            let amount = htlc.amount.to_sat_floor();
            let witness_script = WitnessScript::ln_received_htlc(
                amount,
                &self.keyset,
                htlc.cltv_expiry,
                htlc.payment_hash.ripemd160(),
            );
            tracer.htlc_output(htlc, amount, &witness_script);
            slots.push(OutputSlot {
                txout: TxOut {
                    value: amount.into_inner(),
                    script_pubkey: witness_script.to_p2wsh().into(),
                },
                backing: Backing::Htlc {
                    id: htlc.id,
                    cltv_expiry: htlc.cltv_expiry,
                },
                witness_script: Some(witness_script),
            });
        }

        if self_pay.clears(self.dust_limit) {
            let amount = self_pay.to_sat_floor();
            let witness_script = WitnessScript::ln_to_local(
                amount,
                &self.keyset,
                self.to_self_delay,
            );
            tracer.to_local_output(amount, &witness_script);
            slots.push(OutputSlot {
                txout: TxOut {
                    value: amount.into_inner(),
                    script_pubkey: witness_script.to_p2wsh().into(),
                },
                backing: Backing::ToLocal,
                witness_script: Some(witness_script),
            });
        }

        if other_pay.clears(self.dust_limit) {
            let amount = other_pay.to_sat_floor();
            tracer.to_remote_output(amount);
            slots.push(OutputSlot {
                txout: TxOut {
                    value: amount.into_inner(),
                    script_pubkey: PubkeyScript::p2wpkh(
                        self.keyset.other_payment_key,
                    )
                    .into(),
                },
                backing: Backing::ToRemote,
                witness_script: None,
            });
        }

        // Channel reserve >= dust limit is enforced upstream, so a correctly
        // operating channel always keeps at least one output
        assert!(
            !slots.is_empty(),
            "commitment transaction with no outputs"
        );

        permute_outputs(&mut slots);

        let mut output = Vec::with_capacity(slots.len());
        let mut htlc_map = Vec::with_capacity(slots.len());
        let mut witness_scripts = Vec::with_capacity(slots.len());
        let mut to_local_index = None;
        let mut to_remote_index = None;
        for (vout, slot) in slots.into_iter().enumerate() {
            // Balance slots report their final position and are cleared to
            // "no backing HTLC" in the map seen by the caller
            match slot.backing {
                Backing::Htlc { id, .. } => htlc_map.push(Some(id)),
                Backing::ToLocal => {
                    to_local_index = Some(vout);
                    htlc_map.push(None);
                }
                Backing::ToRemote => {
                    to_remote_index = Some(vout);
                    htlc_map.push(None);
                }
            }
            witness_scripts.push(slot.witness_script);
            output.push(slot.txout);
        }

        let tx = Transaction {
            version: COMMITMENT_TX_VERSION,
            lock_time: commitment_locktime(self.obscured_commitment_number),
            input: vec![TxIn {
                previous_output: self.funding_outpoint,
                script_sig: none!(),
                sequence: commitment_sequence(
                    self.obscured_commitment_number,
                ),
                witness: empty!(),
            }],
            output,
        };

        // If these disagree the assembler and the permutation lost track of
        // slot allocation; not a recoverable condition
        assert_eq!(
            tx.output.len(),
            htlc_map.len(),
            "slot map desynchronized from transaction outputs"
        );
        assert_eq!(
            tx.output.len(),
            witness_scripts.len(),
            "witness scripts desynchronized from transaction outputs"
        );
        #[cfg(debug_assertions)]
        self.assert_conserved(&tx, base_fee);

        BuiltCommitment {
            tx,
            htlc_map,
            witness_scripts,
            to_local_index,
            to_remote_index,
        }
    }

    /// Value may leak to fees via trimming and millisatoshi truncation, but
    /// outputs plus the base fee must never exceed the funding amount unless
    /// the fee was floored against the opener's balance
    #[cfg(debug_assertions)]
    fn assert_conserved(&self, tx: &Transaction, base_fee: Satoshi) {
        let opener_pay = if self.opener == self.side {
            self.self_pay
        } else {
            self.other_pay
        };
        if base_fee.to_msat() > opener_pay {
            return;
        }
        let mut total = base_fee;
        for txout in &tx.output {
            total = total + Satoshi::from(txout.value);
        }
        assert!(
            total <= self.funding,
            "commitment outputs and fee exceed the funding amount"
        );
    }
}
