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

//! BOLT-3 output script templates.
//!
//! The same script can be viewed at different abstraction levels: the raw
//! spending conditions ([`LockScript`]), the script committed into a witness
//! program ([`WitnessScript`]) and the final `scriptPubkey` placed into a
//! transaction output ([`PubkeyScript`]). [`ScriptGenerators`] is implemented
//! for each level plus for [`TxOut`], so callers pick the representation they
//! need and the construction logic exists only once.

use amplify::Wrapper;
use bitcoin::blockdata::{opcodes::all::*, script::Builder};
use bitcoin::hashes::{hash160, ripemd160, sha256, Hash};
use bitcoin::secp256k1::PublicKey;
use bitcoin::{Script, TxOut};

use crate::amount::Satoshi;
use crate::channel::Keyset;

/// Script listing the raw spending conditions of an output
#[derive(Wrapper, Clone, PartialEq, Eq, Hash, Debug, Default, From)]
pub struct LockScript(Script);

/// Script whose hash is committed into a v0 P2WSH witness program
#[derive(Wrapper, Clone, PartialEq, Eq, Hash, Debug, Default, From)]
pub struct WitnessScript(Script);

/// Final `scriptPubkey` of a transaction output
#[derive(Wrapper, Clone, PartialEq, Eq, Hash, Debug, Default, From)]
pub struct PubkeyScript(Script);

impl From<LockScript> for WitnessScript {
    #[inline]
    fn from(script: LockScript) -> Self {
        WitnessScript::from_inner(script.into_inner())
    }
}

impl WitnessScript {
    /// Wraps the script into a v0 P2WSH witness program
    pub fn to_p2wsh(&self) -> PubkeyScript {
        let script_hash = sha256::Hash::hash(self.as_inner().as_bytes());
        PubkeyScript::from_inner(
            Builder::new()
                .push_int(0)
                .push_slice(&script_hash[..])
                .into_script(),
        )
    }
}

impl PubkeyScript {
    /// Constructs a v0 P2WPKH `scriptPubkey` paying to the given key
    pub fn p2wpkh(pubkey: PublicKey) -> PubkeyScript {
        let pubkey_hash = hash160::Hash::hash(&pubkey.serialize());
        PubkeyScript::from_inner(
            Builder::new()
                .push_int(0)
                .push_slice(&pubkey_hash[..])
                .into_script(),
        )
    }
}

/// Conversion of secp256k1 keys into the compressed bitcoin key form used by
/// script push operations
pub trait IntoPk {
    fn into_pk(self) -> bitcoin::PublicKey;
}

impl IntoPk for PublicKey {
    #[inline]
    fn into_pk(self) -> bitcoin::PublicKey {
        bitcoin::PublicKey {
            compressed: true,
            key: self,
        }
    }
}

pub trait ScriptGenerators {
    fn ln_offered_htlc(
        amount: Satoshi,
        keyset: &Keyset,
        payment_hash: ripemd160::Hash,
    ) -> Self;

    fn ln_received_htlc(
        amount: Satoshi,
        keyset: &Keyset,
        cltv_expiry: u32,
        payment_hash: ripemd160::Hash,
    ) -> Self;

    fn ln_to_local(
        amount: Satoshi,
        keyset: &Keyset,
        to_self_delay: u16,
    ) -> Self;
}

impl ScriptGenerators for LockScript {
    fn ln_offered_htlc(
        _: Satoshi,
        keyset: &Keyset,
        payment_hash: ripemd160::Hash,
    ) -> Self {
        let revocation_hash =
            hash160::Hash::hash(&keyset.self_revocation_key.serialize());
        Builder::new()
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_slice(&revocation_hash[..])
            .push_opcode(OP_EQUAL)
            .push_opcode(OP_IF)
            .push_opcode(OP_CHECKSIG)
            .push_opcode(OP_ELSE)
            .push_key(&keyset.other_htlc_key.into_pk())
            .push_opcode(OP_SWAP)
            .push_opcode(OP_SIZE)
            .push_int(32)
            .push_opcode(OP_EQUAL)
            .push_opcode(OP_NOTIF)
            .push_opcode(OP_DROP)
            .push_int(2)
            .push_opcode(OP_SWAP)
            .push_key(&keyset.self_htlc_key.into_pk())
            .push_int(2)
            .push_opcode(OP_CHECKMULTISIG)
            .push_opcode(OP_ELSE)
            .push_opcode(OP_HASH160)
            .push_slice(&payment_hash[..])
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_CHECKSIG)
            .push_opcode(OP_ENDIF)
            .push_opcode(OP_ENDIF)
            .into_script()
            .into()
    }

    fn ln_received_htlc(
        _: Satoshi,
        keyset: &Keyset,
        cltv_expiry: u32,
        payment_hash: ripemd160::Hash,
    ) -> Self {
        let revocation_hash =
            hash160::Hash::hash(&keyset.self_revocation_key.serialize());
        Builder::new()
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_slice(&revocation_hash[..])
            .push_opcode(OP_EQUAL)
            .push_opcode(OP_IF)
            .push_opcode(OP_CHECKSIG)
            .push_opcode(OP_ELSE)
            .push_key(&keyset.other_htlc_key.into_pk())
            .push_opcode(OP_SWAP)
            .push_opcode(OP_SIZE)
            .push_int(32)
            .push_opcode(OP_EQUAL)
            .push_opcode(OP_IF)
            .push_opcode(OP_HASH160)
            .push_slice(&payment_hash[..])
            .push_opcode(OP_EQUALVERIFY)
            .push_int(2)
            .push_opcode(OP_SWAP)
            .push_key(&keyset.self_htlc_key.into_pk())
            .push_int(2)
            .push_opcode(OP_CHECKMULTISIG)
            .push_opcode(OP_ELSE)
            .push_opcode(OP_DROP)
            .push_int(cltv_expiry as i64)
            .push_opcode(OP_CLTV)
            .push_opcode(OP_DROP)
            .push_opcode(OP_CHECKSIG)
            .push_opcode(OP_ENDIF)
            .push_opcode(OP_ENDIF)
            .into_script()
            .into()
    }

    fn ln_to_local(
        _: Satoshi,
        keyset: &Keyset,
        to_self_delay: u16,
    ) -> Self {
        Builder::new()
            .push_opcode(OP_IF)
            .push_key(&keyset.self_revocation_key.into_pk())
            .push_opcode(OP_ELSE)
            .push_int(to_self_delay as i64)
            .push_opcode(OP_CSV)
            .push_opcode(OP_DROP)
            .push_key(&keyset.self_delayed_payment_key.into_pk())
            .push_opcode(OP_ENDIF)
            .push_opcode(OP_CHECKSIG)
            .into_script()
            .into()
    }
}

impl ScriptGenerators for WitnessScript {
    #[inline]
    fn ln_offered_htlc(
        amount: Satoshi,
        keyset: &Keyset,
        payment_hash: ripemd160::Hash,
    ) -> Self {
        LockScript::ln_offered_htlc(amount, keyset, payment_hash).into()
    }

    #[inline]
    fn ln_received_htlc(
        amount: Satoshi,
        keyset: &Keyset,
        cltv_expiry: u32,
        payment_hash: ripemd160::Hash,
    ) -> Self {
        LockScript::ln_received_htlc(amount, keyset, cltv_expiry, payment_hash)
            .into()
    }

    #[inline]
    fn ln_to_local(
        amount: Satoshi,
        keyset: &Keyset,
        to_self_delay: u16,
    ) -> Self {
        LockScript::ln_to_local(amount, keyset, to_self_delay).into()
    }
}

impl ScriptGenerators for PubkeyScript {
    #[inline]
    fn ln_offered_htlc(
        amount: Satoshi,
        keyset: &Keyset,
        payment_hash: ripemd160::Hash,
    ) -> Self {
        WitnessScript::ln_offered_htlc(amount, keyset, payment_hash)
            .to_p2wsh()
    }

    #[inline]
    fn ln_received_htlc(
        amount: Satoshi,
        keyset: &Keyset,
        cltv_expiry: u32,
        payment_hash: ripemd160::Hash,
    ) -> Self {
        WitnessScript::ln_received_htlc(
            amount,
            keyset,
            cltv_expiry,
            payment_hash,
        )
        .to_p2wsh()
    }

    #[inline]
    fn ln_to_local(
        amount: Satoshi,
        keyset: &Keyset,
        to_self_delay: u16,
    ) -> Self {
        WitnessScript::ln_to_local(amount, keyset, to_self_delay).to_p2wsh()
    }
}

impl ScriptGenerators for TxOut {
    #[inline]
    fn ln_offered_htlc(
        amount: Satoshi,
        keyset: &Keyset,
        payment_hash: ripemd160::Hash,
    ) -> Self {
        TxOut {
            value: amount.into_inner(),
            script_pubkey: PubkeyScript::ln_offered_htlc(
                amount,
                keyset,
                payment_hash,
            )
            .into(),
        }
    }

    #[inline]
    fn ln_received_htlc(
        amount: Satoshi,
        keyset: &Keyset,
        cltv_expiry: u32,
        payment_hash: ripemd160::Hash,
    ) -> Self {
        TxOut {
            value: amount.into_inner(),
            script_pubkey: PubkeyScript::ln_received_htlc(
                amount,
                keyset,
                cltv_expiry,
                payment_hash,
            )
            .into(),
        }
    }

    #[inline]
    fn ln_to_local(
        amount: Satoshi,
        keyset: &Keyset,
        to_self_delay: u16,
    ) -> Self {
        TxOut {
            value: amount.into_inner(),
            script_pubkey: PubkeyScript::ln_to_local(
                amount,
                keyset,
                to_self_delay,
            )
            .into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::gen_keyset;

    #[test]
    fn script_wrappers_unwrap_to_script() {
        let keyset = gen_keyset();
        let lock =
            LockScript::ln_to_local(Satoshi::from(10_000), &keyset, 144);
        let wscript = WitnessScript::from(lock.clone());
        assert_eq!(Script::from(lock), Script::from(wscript.clone()));
        assert!(Script::from(wscript.to_p2wsh()).is_v0_p2wsh());
    }

    #[test]
    fn p2wsh_wrapping() {
        let keyset = gen_keyset();
        let wscript = WitnessScript::ln_to_local(
            Satoshi::from(10_000),
            &keyset,
            144,
        );
        let spk = wscript.to_p2wsh();
        let bytes = spk.as_inner().as_bytes();
        // OP_0 <32-byte script hash>
        assert_eq!(bytes.len(), 34);
        assert_eq!(bytes[0], 0x00);
        assert_eq!(bytes[1], 0x20);
        assert_eq!(
            &bytes[2..],
            &sha256::Hash::hash(wscript.as_inner().as_bytes())[..]
        );
    }

    #[test]
    fn p2wpkh_wrapping() {
        let keyset = gen_keyset();
        let spk = PubkeyScript::p2wpkh(keyset.other_payment_key);
        let bytes = spk.as_inner().as_bytes();
        // OP_0 <20-byte pubkey hash>
        assert_eq!(bytes.len(), 22);
        assert_eq!(bytes[0], 0x00);
        assert_eq!(bytes[1], 0x14);
    }

    #[test]
    fn received_htlc_commits_to_expiry() {
        let keyset = gen_keyset();
        let hash = ripemd160::Hash::hash(&[0u8; 32]);
        let amount = Satoshi::from(1_000);
        let a =
            LockScript::ln_received_htlc(amount, &keyset, 500_000, hash);
        let b =
            LockScript::ln_received_htlc(amount, &keyset, 500_001, hash);
        assert_ne!(a, b);
        // while the offered template does not depend on expiry at all
        let c = LockScript::ln_offered_htlc(amount, &keyset, hash);
        let d = LockScript::ln_offered_htlc(amount, &keyset, hash);
        assert_eq!(c, d);
    }
}
