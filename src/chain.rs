//! Per-chain parameters for the transaction engine.
//!
//! A single descriptor carries everything the script builders, sighash
//! engine and signer need to know about a chain: address prefixes, bech32
//! human-readable parts, the hash function used for ids and digests, an
//! optional fork id for replay-protected sighashing, and feature flags.
//! Supporting a new chain of the same family is a matter of writing a new
//! constructor, not a new type.

use crate::util::{sha256, sha256d, Hash256};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

/// Hash function a chain uses for transaction ids and signature digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hasher {
    /// Double SHA256, the Bitcoin family default
    Sha256d,
    /// Single SHA256, used by Groestlcoin for ids and digests
    Sha256,
    /// Blake2b with a 32-byte digest
    Blake2b256,
}

impl Hasher {
    /// Hashes the data with the selected function.
    #[must_use]
    pub fn hash(&self, data: &[u8]) -> Hash256 {
        match self {
            Hasher::Sha256d => sha256d(data),
            Hasher::Sha256 => sha256(data),
            Hasher::Blake2b256 => {
                let digest = Blake2b::<U32>::digest(data);
                let mut bytes = [0; 32];
                bytes.copy_from_slice(&digest);
                Hash256(bytes)
            }
        }
    }
}

/// Capability descriptor for a UTXO chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainParams {
    /// Chain name, for diagnostics
    pub name: &'static str,
    /// Base58 version byte for pay-to-pubkey-hash addresses
    pub p2pkh_prefix: u8,
    /// Base58 version byte for pay-to-script-hash addresses
    pub p2sh_prefix: u8,
    /// Additional accepted P2SH version byte, for chains mid-migration
    pub alternate_p2sh_prefix: Option<u8>,
    /// Bech32 human-readable part for segwit addresses
    pub hrp: Option<&'static str>,
    /// Additional accepted human-readable part
    pub alternate_hrp: Option<&'static str>,
    /// Hash function for transaction ids and signature digests
    pub hasher: Hasher,
    /// Fork id mixed into the sighash type word, when the chain signs
    /// with the fork bit set
    pub fork_id: Option<u32>,
    /// Whether the chain accepts witness programs and extended serialization
    pub supports_segwit: bool,
    /// Whether locking scripts must carry the check-block-at-height suffix
    pub replay_protection: bool,
}

impl ChainParams {
    /// Bitcoin mainnet.
    #[must_use]
    pub fn bitcoin() -> ChainParams {
        ChainParams {
            name: "bitcoin",
            p2pkh_prefix: 0x00,
            p2sh_prefix: 0x05,
            alternate_p2sh_prefix: None,
            hrp: Some("bc"),
            alternate_hrp: None,
            hasher: Hasher::Sha256d,
            fork_id: None,
            supports_segwit: true,
            replay_protection: false,
        }
    }

    /// Bitcoin testnet. Accepts the regtest human-readable part as well.
    #[must_use]
    pub fn bitcoin_testnet() -> ChainParams {
        ChainParams {
            name: "bitcoin_testnet",
            p2pkh_prefix: 0x6f,
            p2sh_prefix: 0xc4,
            alternate_p2sh_prefix: None,
            hrp: Some("tb"),
            alternate_hrp: Some("bcrt"),
            hasher: Hasher::Sha256d,
            fork_id: None,
            supports_segwit: true,
            replay_protection: false,
        }
    }

    /// Litecoin. The legacy Bitcoin P2SH version byte is still accepted
    /// alongside Litecoin's own.
    #[must_use]
    pub fn litecoin() -> ChainParams {
        ChainParams {
            name: "litecoin",
            p2pkh_prefix: 0x30,
            p2sh_prefix: 0x32,
            alternate_p2sh_prefix: Some(0x05),
            hrp: Some("ltc"),
            alternate_hrp: None,
            hasher: Hasher::Sha256d,
            fork_id: None,
            supports_segwit: true,
            replay_protection: false,
        }
    }

    /// Bitcoin Cash. Signs with the fork bit; no witness programs.
    #[must_use]
    pub fn bitcoin_cash() -> ChainParams {
        ChainParams {
            name: "bitcoin_cash",
            p2pkh_prefix: 0x00,
            p2sh_prefix: 0x05,
            alternate_p2sh_prefix: None,
            hrp: None,
            alternate_hrp: None,
            hasher: Hasher::Sha256d,
            fork_id: Some(0),
            supports_segwit: false,
            replay_protection: false,
        }
    }

    /// Groestlcoin. Ids and digests use a single SHA256.
    #[must_use]
    pub fn groestlcoin() -> ChainParams {
        ChainParams {
            name: "groestlcoin",
            p2pkh_prefix: 0x24,
            p2sh_prefix: 0x05,
            alternate_p2sh_prefix: None,
            hrp: Some("grs"),
            alternate_hrp: None,
            hasher: Hasher::Sha256,
            fork_id: None,
            supports_segwit: true,
            replay_protection: false,
        }
    }

    /// A Decred-style chain hashing with Blake2b-256.
    #[must_use]
    pub fn decred_like() -> ChainParams {
        ChainParams {
            name: "decred_like",
            p2pkh_prefix: 0x1e,
            p2sh_prefix: 0x1a,
            alternate_p2sh_prefix: None,
            hrp: None,
            alternate_hrp: None,
            hasher: Hasher::Blake2b256,
            fork_id: None,
            supports_segwit: false,
            replay_protection: false,
        }
    }

    /// Horizen (Zen). Every locking script must end with the
    /// check-block-at-height replay suffix.
    #[must_use]
    pub fn zen() -> ChainParams {
        ChainParams {
            name: "zen",
            p2pkh_prefix: 0x20,
            p2sh_prefix: 0x26,
            alternate_p2sh_prefix: None,
            hrp: None,
            alternate_hrp: None,
            hasher: Hasher::Sha256d,
            fork_id: None,
            supports_segwit: false,
            replay_protection: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hashers() {
        let data = b"abc";
        assert_eq!(
            hex::encode(Hasher::Sha256.hash(data).0),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            hex::encode(Hasher::Sha256d.hash(data).0),
            "4f8b42c22dd3729b519ba6f68d2da7cc5b2d606d05daed5ad5128cc03e6c6358"
        );
        assert_eq!(
            hex::encode(Hasher::Blake2b256.hash(data).0),
            "bddd813c634239723171ef3fee98579b94964e3bb1cb3e427262c8c068d52319"
        );
    }

    #[test]
    fn flags() {
        assert!(ChainParams::bitcoin().supports_segwit);
        assert!(!ChainParams::bitcoin_cash().supports_segwit);
        assert_eq!(ChainParams::bitcoin_cash().fork_id, Some(0));
        assert!(ChainParams::zen().replay_protection);
        assert_eq!(ChainParams::groestlcoin().hasher, Hasher::Sha256);
        assert_eq!(ChainParams::litecoin().alternate_p2sh_prefix, Some(0x05));
    }
}
