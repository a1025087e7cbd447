//! Address handling: base58check and bech32 segwit decoding, and the
//! address-to-locking-script cascade.
//!
//! Payloads are 20-byte Hash160 values for base58check addresses. Witness
//! addresses carry their program directly and are validated by the bech32
//! crate's segwit rules.

use crate::chain::ChainParams;
use crate::script::{
    build_pay_to_public_key_hash, build_pay_to_public_key_hash_replay, build_pay_to_script_hash,
    build_pay_to_script_hash_replay, build_pay_to_witness_pubkey_hash,
    build_pay_to_witness_script_hash, build_witness_program, Script,
};
use crate::util::{sha256d, Error, Hash160, Result};
use base58::{FromBase58, ToBase58};
use bech32::{segwit, Hrp};

/// Encodes a base58check address from version byte and 20-byte payload.
///
/// # Errors
/// Returns `Error::BadArgument` if payload is not exactly 20 bytes.
#[inline]
pub fn encode_address(version: u8, payload: &[u8]) -> Result<String> {
    if payload.len() != 20 {
        return Err(Error::BadArgument("Payload must be 20 bytes".to_string()));
    }
    let mut v = [0u8; 25];
    v[0] = version;
    v[1..21].copy_from_slice(payload);
    let checksum = sha256d(&v[..21]);
    v[21..25].copy_from_slice(&checksum.0[..4]);
    Ok(v.to_base58())
}

/// Decodes a base58check address into version and payload.
///
/// Verifies 25-byte length and checksum; extracts version (byte 0) and
/// payload (bytes 1-20).
///
/// # Errors
/// Returns `Error::FromBase58Error` on decode failure, `Error::BadData` on
/// invalid length/checksum.
#[inline]
pub fn decode_address(input: &str) -> Result<(u8, Vec<u8>)> {
    let bytes = input.from_base58().map_err(Error::FromBase58Error)?;
    if bytes.len() != 25 {
        return Err(Error::BadData("Invalid address length".to_string()));
    }
    let checksum = sha256d(&bytes[..21]);
    if checksum.0[..4] != bytes[21..] {
        return Err(Error::BadData("Invalid checksum".to_string()));
    }
    let version = bytes[0];
    let payload = bytes[1..21].to_vec();
    Ok((version, payload))
}

/// Encodes a P2PKH address from a 20-byte pubkey hash.
///
/// # Errors
/// Propagates encoding errors.
#[inline]
pub fn encode_p2pkh_address(chain: &ChainParams, pubkey_hash: &Hash160) -> Result<String> {
    encode_address(chain.p2pkh_prefix, &pubkey_hash.0)
}

/// Encodes a P2SH address from a 20-byte script hash.
///
/// # Errors
/// Propagates encoding errors.
#[inline]
pub fn encode_p2sh_address(chain: &ChainParams, script_hash: &Hash160) -> Result<String> {
    encode_address(chain.p2sh_prefix, &script_hash.0)
}

fn hrp_matches(hrp: Hrp, expected: Option<&'static str>) -> bool {
    match expected {
        Some(expected) => Hrp::parse(expected).map(|e| e == hrp).unwrap_or(false),
        None => false,
    }
}

fn hash160_from_payload(payload: &[u8]) -> Hash160 {
    let mut hash = Hash160([0; 20]);
    hash.0.copy_from_slice(payload);
    hash
}

/// Builds the locking script for an address on the given chain.
///
/// Tries base58check first (P2PKH and P2SH version bytes, including the
/// chain's alternate P2SH prefix), then bech32 segwit with the chain's
/// human-readable parts. Returns the empty script when the address does not
/// parse as any form the chain accepts.
#[must_use]
pub fn lock_script_for_address(address: &str, chain: &ChainParams) -> Script {
    if let Ok((version, payload)) = decode_address(address) {
        let hash = hash160_from_payload(&payload);
        if version == chain.p2pkh_prefix {
            return build_pay_to_public_key_hash(&hash);
        }
        if version == chain.p2sh_prefix || Some(version) == chain.alternate_p2sh_prefix {
            return build_pay_to_script_hash(&hash);
        }
        return Script::new();
    }
    if chain.supports_segwit {
        if let Ok((hrp, version, program)) = segwit::decode(address) {
            if !hrp_matches(hrp, chain.hrp) && !hrp_matches(hrp, chain.alternate_hrp) {
                return Script::new();
            }
            return match (version.to_u8(), program.len()) {
                (0, 20) => build_pay_to_witness_pubkey_hash(&hash160_from_payload(&program)),
                (0, 32) => build_pay_to_witness_script_hash(&program).unwrap_or_default(),
                (0, _) => Script::new(),
                (v, _) => build_witness_program(v, &program).unwrap_or_default(),
            };
        }
    }
    Script::new()
}

/// Builds the replay-protected locking script for an address.
///
/// Only base58check shapes can carry the check-block-at-height suffix;
/// witness addresses and unrecognized strings produce the empty script.
///
/// # Errors
/// The block hash must be 32 bytes and the height non-negative.
pub fn lock_script_for_address_replay(
    address: &str,
    chain: &ChainParams,
    block_hash: &[u8],
    block_height: i64,
) -> Result<Script> {
    if let Ok((version, payload)) = decode_address(address) {
        let hash = hash160_from_payload(&payload);
        if version == chain.p2pkh_prefix {
            return build_pay_to_public_key_hash_replay(&hash, block_hash, block_height);
        }
        if version == chain.p2sh_prefix || Some(version) == chain.alternate_p2sh_prefix {
            return build_pay_to_script_hash_replay(&hash, block_hash, block_height);
        }
    }
    Ok(Script::new())
}
