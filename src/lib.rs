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

#![recursion_limit = "256"]
// Coding conventions
#![deny(
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case,
    unused_mut,
    unused_imports,
    dead_code,
    //missing_docs
)]
// TODO: when we will be ready for the release #![deny(missing_docs)]

#[macro_use]
extern crate amplify;
#[macro_use]
extern crate amplify_derive;

pub mod amount;
pub mod channel;
pub mod commit;
pub mod fee;
pub mod permute;
pub mod scripts;

pub use amount::{MilliSatoshi, Satoshi};
pub use channel::{HashLock, Htlc, Keyset, Side};
pub use commit::{
    commitment_locktime, commitment_sequence, recover_commitment_number,
    BuildTracer, BuiltCommitment, CommitmentTx, NoTrace,
};
pub use fee::{
    commit_tx_base_fee, count_untrimmed, htlc_is_trimmed, htlc_success_fee,
    htlc_timeout_fee, subtract_fee,
};
pub use permute::permute_outputs;
pub use scripts::{
    LockScript, PubkeyScript, ScriptGenerators, WitnessScript,
};
