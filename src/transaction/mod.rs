//! Transaction wire types, signature hashing and ECDSA helpers.
//!
//! `Tx` serializes in the legacy framing by default; `write_extended` emits
//! the marker/flag framing with witness stacks. The txid is always the
//! chain hash of the legacy serialization.

pub mod sighash;

mod out_point;
mod tx_in;
mod tx_out;

pub use self::out_point::OutPoint;
pub use self::tx_in::{TxIn, SEQUENCE_FINAL};
pub use self::tx_out::TxOut;

use crate::chain::Hasher;
use crate::util::{var_int, Error, Hash256, Result, Serializable};
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use std::fmt;
use std::io;
use std::io::{Read, Write};
use zeroize::Zeroizing;

/// Safety cap on the number of inputs when deserializing.
const MAX_INPUTS: u64 = 1_000_000;
/// Safety cap on the number of outputs when deserializing.
const MAX_OUTPUTS: u64 = 1_000_000;

/// Transaction.
#[derive(Default, PartialEq, Eq, Hash, Clone)]
pub struct Tx {
    /// Transaction version.
    pub version: u32,
    /// Transaction inputs.
    pub inputs: Vec<TxIn>,
    /// Transaction outputs.
    pub outputs: Vec<TxOut>,
    /// The block number or timestamp at which this transaction is unlocked.
    pub lock_time: u32,
}

impl Tx {
    /// Calculates the transaction id: the chain hash of the legacy
    /// serialization, witness data excluded.
    #[must_use]
    pub fn txid(&self, hasher: Hasher) -> Hash256 {
        let mut b = Vec::with_capacity(self.size());
        // Writing to a Vec cannot fail
        self.write(&mut b).unwrap();
        hasher.hash(&b)
    }

    /// Returns true if any input carries a witness stack.
    #[must_use]
    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    /// Returns the size of the legacy serialization in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        8 + var_int::size(self.inputs.len() as u64)
            + self.inputs.iter().map(TxIn::size).sum::<usize>()
            + var_int::size(self.outputs.len() as u64)
            + self.outputs.iter().map(TxOut::size).sum::<usize>()
    }

    /// Writes the extended serialization: marker and flag bytes after the
    /// version, then witness stacks after the outputs.
    ///
    /// # Errors
    /// IO errors.
    pub fn write_extended(&self, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&[0x00, 0x01])?;
        var_int::write(self.inputs.len() as u64, writer)?;
        for tx_in in &self.inputs {
            tx_in.write(writer)?;
        }
        var_int::write(self.outputs.len() as u64, writer)?;
        for tx_out in &self.outputs {
            tx_out.write(writer)?;
        }
        for tx_in in &self.inputs {
            tx_in.write_witness(writer)?;
        }
        writer.write_all(&self.lock_time.to_le_bytes())?;
        Ok(())
    }
}

impl Serializable<Tx> for Tx {
    fn read(reader: &mut dyn Read) -> Result<Tx> {
        let mut version = [0u8; 4];
        reader.read_exact(&mut version).map_err(Error::IOError)?;
        let version = u32::from_le_bytes(version);
        let mut n_inputs = var_int::read(reader)?;
        // A zero input count marks the extended framing; the flag byte follows
        let mut extended = false;
        if n_inputs == 0 {
            let mut flag = [0u8; 1];
            reader.read_exact(&mut flag).map_err(Error::IOError)?;
            if flag[0] != 0x01 {
                return Err(Error::BadData(format!("Unknown tx flag: {}", flag[0])));
            }
            extended = true;
            n_inputs = var_int::read(reader)?;
        }
        if n_inputs > MAX_INPUTS {
            return Err(Error::BadData(format!("Too many inputs: {}", n_inputs)));
        }
        let mut inputs = Vec::with_capacity(n_inputs as usize);
        for _ in 0..n_inputs {
            inputs.push(TxIn::read(reader)?);
        }
        let n_outputs = var_int::read(reader)?;
        if n_outputs > MAX_OUTPUTS {
            return Err(Error::BadData(format!("Too many outputs: {}", n_outputs)));
        }
        let mut outputs = Vec::with_capacity(n_outputs as usize);
        for _ in 0..n_outputs {
            outputs.push(TxOut::read(reader)?);
        }
        if extended {
            for input in &mut inputs {
                input.read_witness(reader)?;
            }
        }
        let mut lock_time = [0u8; 4];
        reader.read_exact(&mut lock_time).map_err(Error::IOError)?;
        let lock_time = u32::from_le_bytes(lock_time);
        Ok(Tx {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_all(&self.version.to_le_bytes())?;
        var_int::write(self.inputs.len() as u64, writer)?;
        for tx_in in &self.inputs {
            tx_in.write(writer)?;
        }
        var_int::write(self.outputs.len() as u64, writer)?;
        for tx_out in &self.outputs {
            tx_out.write(writer)?;
        }
        writer.write_all(&self.lock_time.to_le_bytes())?;
        Ok(())
    }
}

impl fmt::Debug for Tx {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inputs_str = format!("[<{} inputs>]", self.inputs.len());
        let outputs_str = format!("[<{} outputs>]", self.outputs.len());
        f.debug_struct("Tx")
            .field("version", &self.version)
            .field(
                "inputs",
                if self.inputs.len() <= 3 { &self.inputs } else { &inputs_str },
            )
            .field(
                "outputs",
                if self.outputs.len() <= 3 { &self.outputs } else { &outputs_str },
            )
            .field("lock_time", &self.lock_time)
            .finish()
    }
}

/// Generates a DER-encoded ECDSA signature for the digest, with the
/// sighash-type byte appended.
///
/// Normalizes S (low). The intermediate key copy is wiped on every exit path.
///
/// # Errors
/// `Error::InvalidPrivateKey` if the key is not 32 bytes or out of range.
pub fn generate_signature(
    private_key: &[u8],
    sighash: &Hash256,
    sighash_type: u32,
) -> Result<Vec<u8>> {
    let key_bytes: Zeroizing<[u8; 32]> = Zeroizing::new(
        private_key
            .try_into()
            .map_err(|_| Error::InvalidPrivateKey("Key must be 32 bytes".to_string()))?,
    );
    let secp = Secp256k1::signing_only();
    let secret_key = SecretKey::from_byte_array(*key_bytes)
        .map_err(|_| Error::InvalidPrivateKey("Key out of range".to_string()))?;
    let message = Message::from_digest(sighash.0);
    let mut signature = secp.sign_ecdsa(message, &secret_key);
    signature.normalize_s();
    let mut der = signature.serialize_der().to_vec();
    der.push((sighash_type & 0xff) as u8);
    Ok(der)
}

/// Verifies a DER-encoded ECDSA signature against a digest and public key.
///
/// The signature must not include a trailing sighash-type byte.
///
/// # Errors
/// `Error::InvalidSignature` when parsing or verification fails.
pub fn verify_signature(sighash: &Hash256, der_sig: &[u8], public_key: &[u8]) -> Result<()> {
    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(sighash.0);
    let signature = Signature::from_der(der_sig)
        .map_err(|_| Error::InvalidSignature("Malformed DER signature".to_string()))?;
    let public_key = PublicKey::from_slice(public_key)
        .map_err(|_| Error::InvalidSignature("Malformed public key".to_string()))?;
    secp.verify_ecdsa(message, &signature, &public_key)
        .map_err(|_| Error::InvalidSignature("Signature does not verify".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn write_read() {
        let mut v = Vec::new();
        let t = Tx {
            version: 1,
            inputs: vec![
                TxIn {
                    prev_output: OutPoint {
                        hash: Hash256([9; 32]),
                        index: 9,
                    },
                    unlock_script: Script(vec![1, 3, 5, 7, 9]),
                    sequence: 100,
                    witness: vec![],
                },
                TxIn {
                    prev_output: OutPoint {
                        hash: Hash256([0; 32]),
                        index: 8,
                    },
                    unlock_script: Script(vec![3; 333]),
                    sequence: 22,
                    witness: vec![],
                },
            ],
            outputs: vec![
                TxOut {
                    amount: 99,
                    lock_script: Script(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 100, 99, 98, 97, 96]),
                },
                TxOut {
                    amount: 199,
                    lock_script: Script(vec![56, 78, 90, 90, 78, 56]),
                },
            ],
            lock_time: 1000,
        };
        t.write(&mut v).unwrap();
        assert_eq!(v.len(), t.size());
        assert_eq!(Tx::read(&mut Cursor::new(&v)).unwrap(), t);
    }

    #[test]
    fn extended_write_read() {
        let mut t = Tx {
            version: 2,
            inputs: vec![TxIn {
                prev_output: OutPoint {
                    hash: Hash256([7; 32]),
                    index: 1,
                },
                unlock_script: Script(vec![]),
                sequence: SEQUENCE_FINAL,
                witness: vec![vec![0x30, 0x01], vec![0x02; 33]],
            }],
            outputs: vec![TxOut {
                amount: 5000,
                lock_script: Script(vec![0x51]),
            }],
            lock_time: 0,
        };
        let mut v = Vec::new();
        t.write_extended(&mut v).unwrap();
        assert_eq!(&v[4..6], &[0x00, 0x01]);
        let restored = Tx::read(&mut Cursor::new(&v)).unwrap();
        assert_eq!(restored, t);
        assert!(restored.has_witness());
        // The txid ignores the witness data
        let witness_txid = t.txid(Hasher::Sha256d);
        t.inputs[0].witness.clear();
        assert_eq!(t.txid(Hasher::Sha256d), witness_txid);
    }

    #[test]
    fn hostile_witness_count_rejected() {
        // Extended framing with a u64::MAX witness item count
        let mut v = Vec::new();
        v.extend_from_slice(&1u32.to_le_bytes());
        v.extend_from_slice(&[0x00, 0x01]);
        v.push(1);
        v.extend_from_slice(&[0; 36]);
        v.push(0);
        v.extend_from_slice(&[0xff; 4]);
        v.push(1);
        v.extend_from_slice(&1000u64.to_le_bytes());
        v.push(0);
        v.push(0xff);
        v.extend_from_slice(&u64::MAX.to_le_bytes());
        assert!(Tx::read(&mut Cursor::new(&v)).is_err());
    }

    #[test]
    fn genesis_coinbase_txid() {
        let tx = Tx {
            version: 1,
            inputs: vec![TxIn {
                prev_output: OutPoint {
                    hash: Hash256([0; 32]),
                    index: 0xffffffff,
                },
                unlock_script: Script(vec![4, 255, 255, 0, 29, 1, 11]),
                sequence: SEQUENCE_FINAL,
                witness: vec![],
            }],
            outputs: vec![TxOut {
                amount: 5000000000,
                lock_script: Script(vec![
                    65, 4, 114, 17, 168, 36, 245, 91, 80, 82, 40, 228, 195, 213, 25, 76, 31, 207,
                    170, 21, 164, 86, 171, 223, 55, 249, 185, 217, 122, 64, 64, 175, 192, 115,
                    222, 230, 200, 144, 100, 152, 79, 3, 56, 82, 55, 217, 33, 103, 193, 62, 35,
                    100, 70, 180, 23, 171, 121, 160, 252, 174, 65, 42, 227, 49, 107, 119, 172,
                ]),
            }],
            lock_time: 0,
        };
        let h = "9b0fc92260312ce44e74ef369f5c66bbb85848f2eddd5a7a1cde251e54ccfdd5";
        assert_eq!(tx.txid(Hasher::Sha256d), Hash256::decode(h).unwrap());
    }

    #[test]
    fn sign_and_verify() {
        let private_key = [0x11; 32];
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_byte_array(private_key).unwrap();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key).serialize();
        let digest = Hash256([0x42; 32]);
        let sig = generate_signature(&private_key, &digest, 0x01).unwrap();
        assert_eq!(*sig.last().unwrap(), 0x01);
        // Deterministic nonces: signing twice gives identical bytes
        assert_eq!(sig, generate_signature(&private_key, &digest, 0x01).unwrap());
        verify_signature(&digest, &sig[..sig.len() - 1], &public_key).unwrap();
        assert!(
            verify_signature(&Hash256([0x43; 32]), &sig[..sig.len() - 1], &public_key).is_err()
        );
        assert!(generate_signature(&[1; 31], &digest, 0x01).is_err());
    }
}
