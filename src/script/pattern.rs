//! Matchers and builders for the standard locking script shapes.
//!
//! Matchers return `None` rather than partial results: a script either has
//! the complete shape, byte for byte, or it does not match. Builders check
//! their length preconditions and never emit a malformed script.

use crate::script::op_codes::{
    OP_0, OP_1, OP_16, OP_CHECKBLOCKATHEIGHT, OP_CHECKMULTISIG, OP_CHECKSIG, OP_DUP, OP_EQUAL,
    OP_EQUALVERIFY, OP_HASH160, OP_PUSH, OP_RETURN,
};
use crate::script::{decode_num, encode_num, Script};
use crate::util::{Error, Hash160, Result};

/// Longest payload an OP_RETURN output may carry.
pub const MAX_OP_RETURN_DATA: usize = 80;

fn is_valid_public_key(data: &[u8]) -> bool {
    match data.len() {
        33 => data[0] == 0x02 || data[0] == 0x03,
        65 => data[0] == 0x04,
        _ => false,
    }
}

/// Decodes the value of a single pushed number instruction.
fn push_num(op: u8, data: &[u8]) -> Option<i64> {
    match op {
        OP_0 => Some(0),
        OP_1..=OP_16 => Some((op - OP_1 + 1) as i64),
        _ if !data.is_empty() => decode_num(data).ok(),
        _ => None,
    }
}

impl Script {
    /// Returns true if the script has the pay-to-script-hash shape.
    #[must_use]
    pub fn is_pay_to_script_hash(&self) -> bool {
        let s = &self.0;
        s.len() == 23 && s[0] == OP_HASH160 && s[1] == OP_PUSH + 20 && s[22] == OP_EQUAL
    }

    /// Returns true if the script has the pay-to-witness-script-hash shape.
    #[must_use]
    pub fn is_pay_to_witness_script_hash(&self) -> bool {
        let s = &self.0;
        s.len() == 34 && s[0] == OP_0 && s[1] == OP_PUSH + 32
    }

    /// Returns true if the script is a witness program: a version opcode
    /// followed by a single 2 to 40 byte push.
    #[must_use]
    pub fn is_witness_program(&self) -> bool {
        let s = &self.0;
        if s.len() < 4 || s.len() > 42 {
            return false;
        }
        if s[0] != OP_0 && !(OP_1..=OP_16).contains(&s[0]) {
            return false;
        }
        s[1] as usize == s.len() - 2 && (2..=40).contains(&(s.len() - 2))
    }
}

/// Matches a pay-to-pubkey script, returning the public key.
#[must_use]
pub fn match_pay_to_pubkey(script: &Script) -> Option<Vec<u8>> {
    let s = &script.0;
    if s.len() < 2 || s[s.len() - 1] != OP_CHECKSIG {
        return None;
    }
    let key = &s[1..s.len() - 1];
    if s[0] as usize == key.len() && is_valid_public_key(key) {
        Some(key.to_vec())
    } else {
        None
    }
}

/// Matches a pay-to-pubkey-hash script, returning the pubkey hash.
#[must_use]
pub fn match_pay_to_pubkey_hash(script: &Script) -> Option<Hash160> {
    let s = &script.0;
    if s.len() == 25
        && s[0] == OP_DUP
        && s[1] == OP_HASH160
        && s[2] == OP_PUSH + 20
        && s[23] == OP_EQUALVERIFY
        && s[24] == OP_CHECKSIG
    {
        let mut hash = Hash160([0; 20]);
        hash.0.copy_from_slice(&s[3..23]);
        Some(hash)
    } else {
        None
    }
}

/// Matches a pay-to-script-hash script, returning the script hash.
#[must_use]
pub fn match_pay_to_script_hash(script: &Script) -> Option<Hash160> {
    if script.is_pay_to_script_hash() {
        let mut hash = Hash160([0; 20]);
        hash.0.copy_from_slice(&script.0[2..22]);
        Some(hash)
    } else {
        None
    }
}

/// Matches a pay-to-witness-pubkey-hash script, returning the 20-byte program.
#[must_use]
pub fn match_pay_to_witness_pubkey_hash(script: &Script) -> Option<Hash160> {
    let s = &script.0;
    if s.len() == 22 && s[0] == OP_0 && s[1] == OP_PUSH + 20 {
        let mut hash = Hash160([0; 20]);
        hash.0.copy_from_slice(&s[2..22]);
        Some(hash)
    } else {
        None
    }
}

/// Matches a pay-to-witness-script-hash script, returning the 32-byte program.
#[must_use]
pub fn match_pay_to_witness_script_hash(script: &Script) -> Option<Vec<u8>> {
    if script.is_pay_to_witness_script_hash() {
        Some(script.0[2..34].to_vec())
    } else {
        None
    }
}

/// Checks the replay suffix starting at `index`: a 32-byte block hash push,
/// a number push for the height, then OP_CHECKBLOCKATHEIGHT ending the script.
fn match_replay_suffix(script: &Script, index: usize) -> bool {
    let Ok((i, _, block_hash)) = script.get_op(index) else {
        return false;
    };
    if block_hash.len() != 32 {
        return false;
    }
    let Ok((i, op, data)) = script.get_op(i) else {
        return false;
    };
    match push_num(op, data) {
        Some(height) if height >= 0 => (),
        _ => return false,
    }
    let Ok((i, op, _)) = script.get_op(i) else {
        return false;
    };
    op == OP_CHECKBLOCKATHEIGHT && i == script.0.len()
}

/// Matches a replay-protected pay-to-pubkey-hash script.
#[must_use]
pub fn match_pay_to_pubkey_hash_replay(script: &Script) -> Option<Hash160> {
    let s = &script.0;
    if s.len() > 25
        && s[0] == OP_DUP
        && s[1] == OP_HASH160
        && s[2] == OP_PUSH + 20
        && s[23] == OP_EQUALVERIFY
        && s[24] == OP_CHECKSIG
        && match_replay_suffix(script, 25)
    {
        let mut hash = Hash160([0; 20]);
        hash.0.copy_from_slice(&s[3..23]);
        Some(hash)
    } else {
        None
    }
}

/// Matches a replay-protected pay-to-script-hash script.
#[must_use]
pub fn match_pay_to_script_hash_replay(script: &Script) -> Option<Hash160> {
    let s = &script.0;
    if s.len() > 23
        && s[0] == OP_HASH160
        && s[1] == OP_PUSH + 20
        && s[22] == OP_EQUAL
        && match_replay_suffix(script, 23)
    {
        let mut hash = Hash160([0; 20]);
        hash.0.copy_from_slice(&s[2..22]);
        Some(hash)
    } else {
        None
    }
}

/// Matches an m-of-n bare multisig script.
///
/// Returns the public keys in script order and the required signature count.
/// The required count must be a small-int opcode, every key must be a valid
/// public key, and the declared key count must equal the keys present and be
/// at least the required count.
#[must_use]
pub fn match_multisig(script: &Script) -> Option<(Vec<Vec<u8>>, usize)> {
    let (mut i, op, _) = script.get_op(0).ok()?;
    if !(OP_1..=OP_16).contains(&op) {
        return None;
    }
    let required = (op - OP_1 + 1) as usize;
    let mut keys: Vec<Vec<u8>> = Vec::new();
    loop {
        let (next, op, data) = script.get_op(i).ok()?;
        if !data.is_empty() && is_valid_public_key(data) {
            keys.push(data.to_vec());
            i = next;
            continue;
        }
        // Declared key count then OP_CHECKMULTISIG closes the script
        if !(OP_1..=OP_16).contains(&op) {
            return None;
        }
        let declared = (op - OP_1 + 1) as usize;
        if declared != keys.len() || declared < required {
            return None;
        }
        let (end, op, _) = script.get_op(next).ok()?;
        if op != OP_CHECKMULTISIG || end != script.0.len() {
            return None;
        }
        return Some((keys, required));
    }
}

/// Builds a pay-to-pubkey script.
///
/// # Errors
/// The key must be a 33-byte compressed or 65-byte uncompressed public key.
pub fn build_pay_to_public_key(public_key: &[u8]) -> Result<Script> {
    if !is_valid_public_key(public_key) {
        return Err(Error::BadArgument(format!(
            "Invalid public key length {}",
            public_key.len()
        )));
    }
    let mut script = Script::new();
    script.append_data(public_key)?;
    script.append(OP_CHECKSIG);
    Ok(script)
}

/// Builds a pay-to-pubkey-hash script.
#[must_use]
pub fn build_pay_to_public_key_hash(hash: &Hash160) -> Script {
    let mut script = Script::new();
    script.append(OP_DUP);
    script.append(OP_HASH160);
    script.append(OP_PUSH + 20);
    script.append_slice(&hash.0);
    script.append(OP_EQUALVERIFY);
    script.append(OP_CHECKSIG);
    script
}

/// Builds a pay-to-script-hash script.
#[must_use]
pub fn build_pay_to_script_hash(hash: &Hash160) -> Script {
    let mut script = Script::new();
    script.append(OP_HASH160);
    script.append(OP_PUSH + 20);
    script.append_slice(&hash.0);
    script.append(OP_EQUAL);
    script
}

/// Builds a version 0 pay-to-witness-pubkey-hash script.
#[must_use]
pub fn build_pay_to_witness_pubkey_hash(hash: &Hash160) -> Script {
    let mut script = Script::new();
    script.append(OP_0);
    script.append(OP_PUSH + 20);
    script.append_slice(&hash.0);
    script
}

/// Builds a version 0 pay-to-witness-script-hash script.
///
/// # Errors
/// The script hash must be 32 bytes.
pub fn build_pay_to_witness_script_hash(script_hash: &[u8]) -> Result<Script> {
    if script_hash.len() != 32 {
        return Err(Error::BadArgument(format!(
            "Witness script hash length {}",
            script_hash.len()
        )));
    }
    let mut script = Script::new();
    script.append(OP_0);
    script.append(OP_PUSH + 32);
    script.append_slice(script_hash);
    Ok(script)
}

/// Builds a witness program script for the given version.
///
/// # Errors
/// The version must be 0 to 16 and the program 2 to 40 bytes.
pub fn build_witness_program(version: u8, program: &[u8]) -> Result<Script> {
    if version > 16 {
        return Err(Error::BadArgument(format!("Witness version {}", version)));
    }
    if program.len() < 2 || program.len() > 40 {
        return Err(Error::BadArgument(format!(
            "Witness program length {}",
            program.len()
        )));
    }
    let mut script = Script::new();
    script.append(if version == 0 { OP_0 } else { OP_1 + version - 1 });
    script.append(OP_PUSH + program.len() as u8);
    script.append_slice(program);
    Ok(script)
}

/// Builds an OP_RETURN data carrier script.
///
/// # Errors
/// The payload may not exceed [`MAX_OP_RETURN_DATA`] bytes.
pub fn build_op_return(data: &[u8]) -> Result<Script> {
    if data.len() > MAX_OP_RETURN_DATA {
        return Err(Error::BadArgument(format!(
            "OP_RETURN payload too long: {} bytes",
            data.len()
        )));
    }
    let mut script = Script::new();
    script.append(OP_RETURN);
    script.append_data(data)?;
    Ok(script)
}

fn append_replay_suffix(script: &mut Script, block_hash: &[u8], block_height: i64) -> Result<()> {
    if block_hash.len() != 32 {
        return Err(Error::BadArgument(format!(
            "Replay block hash length {}",
            block_hash.len()
        )));
    }
    if block_height < 0 {
        return Err(Error::BadArgument(format!(
            "Replay block height {}",
            block_height
        )));
    }
    script.append_data(block_hash)?;
    // The height is always a length-prefixed minimal byte string, never a
    // small-int opcode, even for heights 16 and below
    script.append_data(&encode_num(block_height))?;
    script.append(OP_CHECKBLOCKATHEIGHT);
    Ok(())
}

/// Builds a replay-protected pay-to-pubkey-hash script.
///
/// # Errors
/// The block hash must be 32 bytes and the height non-negative.
pub fn build_pay_to_public_key_hash_replay(
    hash: &Hash160,
    block_hash: &[u8],
    block_height: i64,
) -> Result<Script> {
    let mut script = build_pay_to_public_key_hash(hash);
    append_replay_suffix(&mut script, block_hash, block_height)?;
    Ok(script)
}

/// Builds a replay-protected pay-to-script-hash script.
///
/// # Errors
/// The block hash must be 32 bytes and the height non-negative.
pub fn build_pay_to_script_hash_replay(
    hash: &Hash160,
    block_hash: &[u8],
    block_height: i64,
) -> Result<Script> {
    let mut script = build_pay_to_script_hash(hash);
    append_replay_suffix(&mut script, block_hash, block_height)?;
    Ok(script)
}
