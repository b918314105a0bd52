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

//! Channel-level data model consumed by the commitment transaction builder:
//! channel sides, in-flight HTLCs and the per-commitment key set.

use bitcoin::hashes::{ripemd160, sha256, Hash};
use bitcoin::secp256k1::PublicKey;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::amount::MilliSatoshi;

/// One of the two channel parties.
///
/// The same value doubles as "who owns this HTLC" and "from whose on-chain
/// cost perspective the commitment transaction is computed": each party pays
/// fees for its own version of the commitment transaction, so the two sides
/// may legitimately disagree on which HTLCs are worth a dedicated output.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display,
)]
#[display(Debug)]
pub enum Side {
    Local,
    Remote,
}

impl Side {
    #[inline]
    pub fn other(self) -> Side {
        match self {
            Side::Local => Side::Remote,
            Side::Remote => Side::Local,
        }
    }
}

/// SHA256-based lock used as HTLC payment hash
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
    From,
)]
#[display(LowerHex)]
#[wrapper(FromStr, LowerHex)]
pub struct HashLock(sha256::Hash);

impl HashLock {
    /// Constructs payment hash commitment from a known preimage
    #[inline]
    pub fn from_preimage(preimage: &[u8]) -> HashLock {
        HashLock(sha256::Hash::hash(preimage))
    }

    /// RIPEMD160 reduction of the payment hash, as committed to by HTLC
    /// output witness scripts
    #[inline]
    pub fn ripemd160(&self) -> ripemd160::Hash {
        ripemd160::Hash::hash(&self.0[..])
    }
}

/// In-flight conditional payment.
///
/// Immutable for the duration of a single commitment transaction build; the
/// set of HTLCs is owned by the channel state machine and referenced here
/// read-only.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Htlc {
    pub id: u64,
    pub amount: MilliSatoshi,
    pub payment_hash: HashLock,
    /// Absolute block height after which the HTLC can be refunded
    pub cltv_expiry: u32,
    pub owner: Side,
}

impl Htlc {
    /// Whether this HTLC appears as an offered output on `side`'s version of
    /// the commitment transaction
    #[inline]
    pub fn offered_by(&self, side: Side) -> bool {
        self.owner == side
    }
}

/// Per-commitment public keys consumed by output script generators.
///
/// "Self" is the party whose commitment transaction is being built. The
/// bundle is opaque to the build pipeline: it is only passed through to the
/// script templates.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Keyset {
    pub self_revocation_key: PublicKey,
    pub self_htlc_key: PublicKey,
    pub other_htlc_key: PublicKey,
    pub self_delayed_payment_key: PublicKey,
    pub self_payment_key: PublicKey,
    pub other_payment_key: PublicKey,
}
