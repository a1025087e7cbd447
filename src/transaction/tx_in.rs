//! Transaction input.
use crate::script::Script;
use crate::transaction::out_point::OutPoint;
use crate::util::{var_int, Error, Result, Serializable};
use std::io;
use std::io::{Read, Write};

/// Maximum unlock script length (520 bytes, consensus rule).
const MAX_UNLOCK_SCRIPT_LEN: usize = 520;
/// Safety cap on witness stack items when deserializing.
const MAX_WITNESS_ITEMS: u64 = 1_000;
/// Safety cap on a single witness item length when deserializing.
const MAX_WITNESS_ITEM_LEN: usize = 10_000;

/// Default sequence marking an input as final.
pub const SEQUENCE_FINAL: u32 = 0xffffffff;

/// Transaction input.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone)]
pub struct TxIn {
    /// The previous output transaction reference.
    pub prev_output: OutPoint,
    /// Computational Script for confirming transaction authorization.
    pub unlock_script: Script,
    /// Transaction version as defined by the sender for replacement or negotiation.
    pub sequence: u32,
    /// Witness stack items, present only in the extended serialization.
    pub witness: Vec<Vec<u8>>,
}

impl TxIn {
    /// Returns the size of the transaction input in bytes, without witness.
    #[must_use]
    #[inline]
    pub fn size(&self) -> usize {
        OutPoint::SIZE
            + var_int::size(self.unlock_script.0.len() as u64)
            + self.unlock_script.0.len()
            + 4
    }

    /// Writes the witness stack: item count, then each item length-prefixed.
    pub(crate) fn write_witness(&self, writer: &mut dyn Write) -> io::Result<()> {
        var_int::write(self.witness.len() as u64, writer)?;
        for item in &self.witness {
            var_int::write(item.len() as u64, writer)?;
            writer.write_all(item)?;
        }
        Ok(())
    }

    /// Reads the witness stack.
    pub(crate) fn read_witness(&mut self, reader: &mut dyn Read) -> Result<()> {
        let n_items = var_int::read(reader)?;
        if n_items > MAX_WITNESS_ITEMS {
            return Err(Error::BadData(format!(
                "Too many witness items: {}",
                n_items
            )));
        }
        let mut witness = Vec::with_capacity(n_items as usize);
        for _ in 0..n_items {
            let len = var_int::read(reader)? as usize;
            if len > MAX_WITNESS_ITEM_LEN {
                return Err(Error::BadData(format!("Witness item too long: {}", len)));
            }
            let mut item = vec![0; len];
            reader.read_exact(&mut item).map_err(Error::IOError)?;
            witness.push(item);
        }
        self.witness = witness;
        Ok(())
    }
}

impl Serializable<TxIn> for TxIn {
    fn read(reader: &mut dyn Read) -> Result<TxIn> {
        let prev_output = OutPoint::read(reader)?;
        let script_len = var_int::read(reader)? as usize;
        if script_len > MAX_UNLOCK_SCRIPT_LEN {
            return Err(Error::BadData(format!(
                "Unlock script too long: {}",
                script_len
            )));
        }
        let mut unlock_script = vec![0; script_len];
        reader.read_exact(&mut unlock_script).map_err(Error::IOError)?;
        let mut sequence = [0u8; 4];
        reader.read_exact(&mut sequence).map_err(Error::IOError)?;
        let sequence = u32::from_le_bytes(sequence);
        Ok(TxIn {
            prev_output,
            unlock_script: Script(unlock_script),
            sequence,
            witness: vec![],
        })
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        self.prev_output.write(writer)?;
        var_int::write(self.unlock_script.0.len() as u64, writer)?;
        writer.write_all(&self.unlock_script.0)?;
        writer.write_all(&self.sequence.to_le_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Hash256;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn write_read() {
        let mut v = Vec::new();
        let t = TxIn {
            prev_output: OutPoint {
                hash: Hash256([6; 32]),
                index: 8,
            },
            unlock_script: Script(vec![255; 254]),
            sequence: 100,
            witness: vec![],
        };
        t.write(&mut v).unwrap();
        assert_eq!(v.len(), t.size());
        assert_eq!(TxIn::read(&mut Cursor::new(&v)).unwrap(), t);
    }

    #[test]
    fn witness_write_read() {
        let mut t = TxIn {
            witness: vec![vec![1, 2, 3], vec![], vec![9; 72]],
            ..Default::default()
        };
        let mut v = Vec::new();
        t.write_witness(&mut v).unwrap();
        let mut restored = TxIn::default();
        restored.read_witness(&mut Cursor::new(&v)).unwrap();
        assert_eq!(restored.witness, t.witness);
        t.witness.clear();
        let mut v = Vec::new();
        t.write_witness(&mut v).unwrap();
        assert_eq!(v, vec![0]);
    }

    #[test]
    fn hostile_witness_rejected() {
        // Item count far beyond the cap must error, not allocate
        let mut v = vec![0xff];
        v.extend_from_slice(&u64::MAX.to_le_bytes());
        let mut t = TxIn::default();
        assert!(t.read_witness(&mut Cursor::new(&v)).is_err());

        // Single item with a huge declared length
        let mut v = vec![1, 0xfe];
        v.extend_from_slice(&0xffff_ffffu32.to_le_bytes());
        assert!(t.read_witness(&mut Cursor::new(&v)).is_err());
    }

    #[test]
    fn too_long_unlock_script() {
        let mut bytes = vec![0; 36];
        bytes.extend_from_slice(&[0xfd, 0x09, 0x02]); // script length 521
        bytes.extend_from_slice(&[0; 600]);
        assert!(TxIn::read(&mut Cursor::new(&bytes)).is_err());
    }
}
