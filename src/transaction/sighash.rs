//! Signature hash computation for transaction signing.
//!
//! Supports the legacy modified-copy algorithm and the BIP-143 fixed-layout
//! algorithm, parameterized by the chain's hash function and fork id. Cache
//! intermediates for multi-input efficiency (avoids O(n^2) hashing).
use crate::chain::ChainParams;
use crate::script::{next_op, op_codes::OP_CODESEPARATOR, Script};
use crate::transaction::{Tx, TxOut};
use crate::util::{var_int, Error, Hash256, Result, Serializable};
use byteorder::{LittleEndian, WriteBytesExt};

/// Signs all outputs.
pub const SIGHASH_ALL: u32 = 0x01;
/// Signs no outputs (anyone spend).
pub const SIGHASH_NONE: u32 = 0x02;
/// Signs only the matching output.
pub const SIGHASH_SINGLE: u32 = 0x03;
/// Fork flag: hash with the BIP-143 layout and mix the fork id into the
/// trailing type word.
pub const SIGHASH_FORKID: u32 = 0x40;
/// Anyone can add inputs.
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// Mask for the base sighash type.
const BASE_TYPE_MASK: u32 = 0x1f;

/// Which hashing algorithm an input signs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureVersion {
    /// Legacy modified-copy serialization.
    Base,
    /// BIP-143 fixed-layout preimage, used by witness v0 inputs.
    WitnessV0,
}

/// Cache for sighash intermediates (prevouts/sequences/outputs).
///
/// Reuse across inputs of the same transaction (O(1) after the first).
#[derive(Default, Debug)]
pub struct SigHashCache {
    hash_prevouts: Option<Hash256>,
    hash_sequence: Option<Hash256>,
    hash_outputs: Option<Hash256>,
}

impl SigHashCache {
    /// Creates a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Computes the sighash digest for signing one input.
///
/// The fork bit forces the BIP-143 layout regardless of signature version;
/// otherwise the version selects the algorithm. The digest is produced with
/// the chain's hash function.
///
/// # Errors
/// Input index out of range.
pub fn sighash(
    tx: &Tx,
    n_input: usize,
    script_code: &[u8],
    amount: u64,
    sighash_type: u32,
    sig_version: SignatureVersion,
    chain: &ChainParams,
    cache: &mut SigHashCache,
) -> Result<Hash256> {
    if sighash_type & SIGHASH_FORKID != 0 || sig_version == SignatureVersion::WitnessV0 {
        witness_v0_sighash(tx, n_input, script_code, amount, sighash_type, chain, cache)
    } else {
        legacy_sighash(tx, n_input, script_code, sighash_type, chain)
    }
}

/// BIP-143 sighash.
///
/// Serializes: version | hash_prevouts | hash_sequence | outpoint | script |
/// amount | sequence | hash_outputs | locktime | (fork_id << 8) | type.
fn witness_v0_sighash(
    tx: &Tx,
    n_input: usize,
    script_code: &[u8],
    amount: u64,
    sighash_type: u32,
    chain: &ChainParams,
    cache: &mut SigHashCache,
) -> Result<Hash256> {
    if n_input >= tx.inputs.len() {
        return Err(Error::BadArgument("Input index out of range".to_string()));
    }
    let hasher = chain.hasher;
    let mut s = Vec::with_capacity(200);
    let base_type = sighash_type & BASE_TYPE_MASK;
    let anyone_can_pay = sighash_type & SIGHASH_ANYONECANPAY != 0;
    // 1. nVersion
    s.write_u32::<LittleEndian>(tx.version)?;
    // 2. hashPrevouts
    if !anyone_can_pay {
        let hash_prevouts = match cache.hash_prevouts {
            Some(h) => h,
            None => {
                let mut prevouts = Vec::with_capacity(36 * tx.inputs.len());
                for input in &tx.inputs {
                    input.prev_output.write(&mut prevouts)?;
                }
                let h = hasher.hash(&prevouts);
                cache.hash_prevouts = Some(h);
                h
            }
        };
        s.extend_from_slice(&hash_prevouts.0);
    } else {
        s.extend_from_slice(&[0u8; 32]);
    }
    // 3. hashSequence
    if !anyone_can_pay && base_type != SIGHASH_SINGLE && base_type != SIGHASH_NONE {
        let hash_sequence = match cache.hash_sequence {
            Some(h) => h,
            None => {
                let mut sequences = Vec::with_capacity(4 * tx.inputs.len());
                for input in &tx.inputs {
                    sequences.write_u32::<LittleEndian>(input.sequence)?;
                }
                let h = hasher.hash(&sequences);
                cache.hash_sequence = Some(h);
                h
            }
        };
        s.extend_from_slice(&hash_sequence.0);
    } else {
        s.extend_from_slice(&[0u8; 32]);
    }
    // 4. outpoint
    tx.inputs[n_input].prev_output.write(&mut s)?;
    // 5. scriptCode len + code
    var_int::write(script_code.len() as u64, &mut s)?;
    s.extend_from_slice(script_code);
    // 6. amount
    s.write_u64::<LittleEndian>(amount)?;
    // 7. nSequence
    s.write_u32::<LittleEndian>(tx.inputs[n_input].sequence)?;
    // 8. hashOutputs
    if base_type != SIGHASH_SINGLE && base_type != SIGHASH_NONE {
        let hash_outputs = match cache.hash_outputs {
            Some(h) => h,
            None => {
                let mut outputs =
                    Vec::with_capacity(tx.outputs.iter().map(TxOut::size).sum::<usize>());
                for out in &tx.outputs {
                    out.write(&mut outputs)?;
                }
                let h = hasher.hash(&outputs);
                cache.hash_outputs = Some(h);
                h
            }
        };
        s.extend_from_slice(&hash_outputs.0);
    } else if base_type == SIGHASH_SINGLE && n_input < tx.outputs.len() {
        let mut single_out = Vec::with_capacity(tx.outputs[n_input].size());
        tx.outputs[n_input].write(&mut single_out)?;
        s.extend_from_slice(&hasher.hash(&single_out).0);
    } else {
        s.extend_from_slice(&[0u8; 32]);
    }
    // 9. nLockTime
    s.write_u32::<LittleEndian>(tx.lock_time)?;
    // 10. sighash type word with the chain's fork id above the low byte
    let fork_id = chain.fork_id.unwrap_or(0);
    s.write_u32::<LittleEndian>((fork_id << 8) | sighash_type)?;
    Ok(hasher.hash(&s))
}

/// Legacy sighash.
///
/// Serializes a modified tx copy: version | inputs (sub_script or empty,
/// seq=0 for NONE/SINGLE) | outputs (truncated/blanked) | locktime | type.
fn legacy_sighash(
    tx: &Tx,
    n_input: usize,
    script_code: &[u8],
    sighash_type: u32,
    chain: &ChainParams,
) -> Result<Hash256> {
    if n_input >= tx.inputs.len() {
        return Err(Error::BadArgument("Input index out of range".to_string()));
    }
    let mut s = Vec::with_capacity(tx.size());
    let base_type = sighash_type & BASE_TYPE_MASK;
    let anyone_can_pay = sighash_type & SIGHASH_ANYONECANPAY != 0;
    // Sub-script (remove OP_CODESEPARATOR)
    let mut sub_script = Vec::with_capacity(script_code.len());
    let mut i = 0;
    while i < script_code.len() {
        let next = next_op(i, script_code);
        if script_code[i] != OP_CODESEPARATOR {
            sub_script.extend_from_slice(&script_code[i..next]);
        }
        i = next;
    }
    // Version
    s.write_u32::<LittleEndian>(tx.version)?;
    // Inputs
    let n_inputs = if anyone_can_pay { 1 } else { tx.inputs.len() };
    var_int::write(n_inputs as u64, &mut s)?;
    for i in 0..tx.inputs.len() {
        let input_idx = if anyone_can_pay { n_input } else { i };
        let mut tx_in = tx.inputs[input_idx].clone();
        tx_in.witness = vec![];
        if input_idx == n_input {
            tx_in.unlock_script = Script(sub_script.clone());
        } else {
            tx_in.unlock_script = Script(vec![]);
            if base_type == SIGHASH_NONE || base_type == SIGHASH_SINGLE {
                tx_in.sequence = 0;
            }
        }
        tx_in.write(&mut s)?;
        if anyone_can_pay {
            break;
        }
    }
    // Outputs
    let n_outputs = if base_type == SIGHASH_NONE {
        0
    } else if base_type == SIGHASH_SINGLE {
        n_input + 1
    } else {
        tx.outputs.len()
    };
    var_int::write(n_outputs as u64, &mut s)?;
    for i in 0..n_outputs {
        if i < tx.outputs.len() && !(base_type == SIGHASH_SINGLE && i != n_input) {
            tx.outputs[i].write(&mut s)?;
        } else {
            // Blanked slot: maximum amount placeholder and empty script
            let blank = TxOut {
                amount: u64::MAX,
                lock_script: Script(vec![]),
            };
            blank.write(&mut s)?;
        }
    }
    // Locktime
    s.write_u32::<LittleEndian>(tx.lock_time)?;
    // Sighash type
    s.write_u32::<LittleEndian>(sighash_type)?;
    Ok(chain.hasher.hash(&s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::decode_address;
    use crate::script::build_pay_to_public_key_hash;
    use crate::transaction::{OutPoint, TxIn, SEQUENCE_FINAL};
    use crate::util::Hash160;
    use hex_literal::hex;
    use pretty_assertions::assert_eq;

    #[test]
    fn forkid_sighash_test() -> Result<()> {
        let lock_script = hex::decode("76a91402b74813b047606b4b3fbdfb1a6e8e053fdb8dab88ac")?;
        let (_version, payload) = decode_address("mfmKD4cP6Na7T8D87XRSiR7shA1HNGSaec")?;
        let hash160: [u8; 20] = payload
            .try_into()
            .map_err(|_| Error::BadData("Invalid hash160 length".to_string()))?;
        let out_script = build_pay_to_public_key_hash(&Hash160(hash160));
        let tx = Tx {
            version: 2,
            inputs: vec![TxIn {
                prev_output: OutPoint {
                    hash: Hash256::decode(
                        "f671dc000ad12795e86b59b27e0c367d9b026bbd4141c227b9285867a53bb6f7",
                    )?,
                    index: 0,
                },
                unlock_script: Script(vec![]),
                sequence: 0,
                witness: vec![],
            }],
            outputs: vec![
                TxOut {
                    amount: 100,
                    lock_script: out_script.clone(),
                },
                TxOut {
                    amount: 259899900,
                    lock_script: out_script,
                },
            ],
            lock_time: 0,
        };
        let chain = ChainParams::bitcoin_cash();
        let mut cache = SigHashCache::new();
        let sighash_type = SIGHASH_ALL | SIGHASH_FORKID;
        let digest = sighash(
            &tx,
            0,
            &lock_script,
            260000000,
            sighash_type,
            SignatureVersion::Base,
            &chain,
            &mut cache,
        )?;
        let expected = "1e2121837829018daf3aeadab76f1a542c49a3600ded7bd74323ee74ce0d840c";
        assert_eq!(hex::encode(digest.0), expected);
        assert!(cache.hash_prevouts.is_some());
        assert!(cache.hash_sequence.is_some());
        assert!(cache.hash_outputs.is_some());
        Ok(())
    }

    #[test]
    fn legacy_sighash_test() -> Result<()> {
        let lock_script = hex::decode("76a914d951eb562f1ff26b6cbe89f04eda365ea6bd95ce88ac")?;
        let tx = Tx {
            version: 1,
            inputs: vec![TxIn {
                prev_output: OutPoint {
                    hash: Hash256::decode(
                        "bf6c1139ea01ca054b8d00aa0a088daaeab4f3b8e111626c6be7d603a9dd8dff",
                    )?,
                    index: 0,
                },
                unlock_script: Script(vec![]),
                sequence: SEQUENCE_FINAL,
                witness: vec![],
            }],
            outputs: vec![TxOut {
                amount: 49990000,
                lock_script: Script(hex::decode(
                    "76a9147865b0b301119fc3eadc7f3406ff1339908e46d488ac",
                )?),
            }],
            lock_time: 0,
        };
        let mut cache = SigHashCache::new();
        let digest = sighash(
            &tx,
            0,
            &lock_script,
            0,
            SIGHASH_ALL,
            SignatureVersion::Base,
            &ChainParams::bitcoin(),
            &mut cache,
        )?;
        let expected = "ad16084eccf26464a84c5ee2f8b96b4daff9a3154ac3c1b320346aed042abe57";
        assert_eq!(hex::encode(digest.0), expected);
        Ok(())
    }

    // The native P2WPKH example from the BIP-143 specification, signing
    // the second input.
    #[test]
    fn bip143_reference_vector() -> Result<()> {
        let tx = Tx {
            version: 1,
            inputs: vec![
                TxIn {
                    prev_output: OutPoint {
                        hash: Hash256(hex!(
                            "fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f"
                        )),
                        index: 0,
                    },
                    unlock_script: Script(vec![]),
                    sequence: 0xffffffee,
                    witness: vec![],
                },
                TxIn {
                    prev_output: OutPoint {
                        hash: Hash256(hex!(
                            "ef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a"
                        )),
                        index: 1,
                    },
                    unlock_script: Script(vec![]),
                    sequence: SEQUENCE_FINAL,
                    witness: vec![],
                },
            ],
            outputs: vec![
                TxOut {
                    amount: 112340000,
                    lock_script: Script(hex::decode(
                        "76a9148280b37df378db99f66f85c95a783a76ac7a6d5988ac",
                    )?),
                },
                TxOut {
                    amount: 223450000,
                    lock_script: Script(hex::decode(
                        "76a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa815988ac",
                    )?),
                },
            ],
            lock_time: 17,
        };
        let script_code = hex::decode("76a9141d0f172a0ecb48aee1be1f2687d2963ae33f71a188ac")?;
        let mut cache = SigHashCache::new();
        let digest = sighash(
            &tx,
            1,
            &script_code,
            600000000,
            SIGHASH_ALL,
            SignatureVersion::WitnessV0,
            &ChainParams::bitcoin(),
            &mut cache,
        )?;
        let expected = "c37af31116d1b27caf68aae9e3ac82f1477929014d5b917657d0eb49478cb670";
        assert_eq!(hex::encode(digest.0), expected);
        Ok(())
    }

    fn two_in_two_out() -> Tx {
        Tx {
            version: 1,
            inputs: vec![
                TxIn {
                    prev_output: OutPoint {
                        hash: Hash256([1; 32]),
                        index: 0,
                    },
                    unlock_script: Script(vec![]),
                    sequence: SEQUENCE_FINAL,
                    witness: vec![],
                },
                TxIn {
                    prev_output: OutPoint {
                        hash: Hash256([2; 32]),
                        index: 1,
                    },
                    unlock_script: Script(vec![]),
                    sequence: SEQUENCE_FINAL,
                    witness: vec![],
                },
            ],
            outputs: vec![
                TxOut {
                    amount: 1000,
                    lock_script: Script(vec![0x51]),
                },
                TxOut {
                    amount: 2000,
                    lock_script: Script(vec![0x52]),
                },
            ],
            lock_time: 0,
        }
    }

    #[test]
    fn anyone_can_pay_covers_only_signed_input() -> Result<()> {
        let chain = ChainParams::bitcoin();
        let script_code = [0x51];
        let tx = two_in_two_out();
        let mut single_input = tx.clone();
        single_input.inputs.truncate(1);
        let t = SIGHASH_ALL | SIGHASH_ANYONECANPAY;
        let mut c1 = SigHashCache::new();
        let mut c2 = SigHashCache::new();
        let d1 = sighash(&tx, 0, &script_code, 0, t, SignatureVersion::Base, &chain, &mut c1)?;
        let d2 = sighash(
            &single_input,
            0,
            &script_code,
            0,
            t,
            SignatureVersion::Base,
            &chain,
            &mut c2,
        )?;
        assert_eq!(d1, d2);
        Ok(())
    }

    #[test]
    fn single_blanks_other_outputs() -> Result<()> {
        let chain = ChainParams::bitcoin();
        let script_code = [0x51];
        let tx = two_in_two_out();
        let mut modified = tx.clone();
        modified.outputs[0].amount = 999_999;
        let mut c1 = SigHashCache::new();
        let mut c2 = SigHashCache::new();
        // Signing input 1 with SINGLE: output 0 is blanked, so the digest
        // must not move when it changes
        let d1 = sighash(&tx, 1, &script_code, 0, SIGHASH_SINGLE, SignatureVersion::Base, &chain, &mut c1)?;
        let d2 = sighash(&modified, 1, &script_code, 0, SIGHASH_SINGLE, SignatureVersion::Base, &chain, &mut c2)?;
        assert_eq!(d1, d2);
        // But its own output is covered
        let mut modified = tx.clone();
        modified.outputs[1].amount = 999_999;
        let mut c3 = SigHashCache::new();
        let d3 = sighash(&modified, 1, &script_code, 0, SIGHASH_SINGLE, SignatureVersion::Base, &chain, &mut c3)?;
        assert_ne!(d1, d3);
        Ok(())
    }

    #[test]
    fn none_covers_no_outputs() -> Result<()> {
        let chain = ChainParams::bitcoin();
        let script_code = [0x51];
        let tx = two_in_two_out();
        let mut modified = tx.clone();
        modified.outputs.clear();
        let mut c1 = SigHashCache::new();
        let mut c2 = SigHashCache::new();
        let d1 = sighash(&tx, 0, &script_code, 0, SIGHASH_NONE, SignatureVersion::Base, &chain, &mut c1)?;
        let d2 = sighash(&modified, 0, &script_code, 0, SIGHASH_NONE, SignatureVersion::Base, &chain, &mut c2)?;
        assert_eq!(d1, d2);
        Ok(())
    }

    #[test]
    fn codeseparator_is_stripped() -> Result<()> {
        let chain = ChainParams::bitcoin();
        let tx = two_in_two_out();
        let clean = [0x51, 0x52];
        let with_separator = [0x51, OP_CODESEPARATOR, 0x52];
        let mut c1 = SigHashCache::new();
        let mut c2 = SigHashCache::new();
        let d1 = sighash(&tx, 0, &clean, 0, SIGHASH_ALL, SignatureVersion::Base, &chain, &mut c1)?;
        let d2 = sighash(&tx, 0, &with_separator, 0, SIGHASH_ALL, SignatureVersion::Base, &chain, &mut c2)?;
        assert_eq!(d1, d2);
        Ok(())
    }

    #[test]
    fn input_index_out_of_range() {
        let tx = two_in_two_out();
        let chain = ChainParams::bitcoin();
        let mut cache = SigHashCache::new();
        assert!(sighash(&tx, 2, &[], 0, SIGHASH_ALL, SignatureVersion::Base, &chain, &mut cache).is_err());
        assert!(
            sighash(&tx, 2, &[], 0, SIGHASH_ALL, SignatureVersion::WitnessV0, &chain, &mut cache)
                .is_err()
        );
    }
}
