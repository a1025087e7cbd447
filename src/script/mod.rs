//! Script building, parsing and pattern matching.

use crate::util::{var_int, Error, Result, Serializable};
use std::fmt;
use std::io;
use std::io::{Read, Write};

pub mod op_codes;
mod pattern;

pub use self::pattern::{
    build_op_return, build_pay_to_public_key, build_pay_to_public_key_hash,
    build_pay_to_public_key_hash_replay, build_pay_to_script_hash,
    build_pay_to_script_hash_replay, build_pay_to_witness_pubkey_hash,
    build_pay_to_witness_script_hash, build_witness_program, match_multisig, match_pay_to_pubkey,
    match_pay_to_pubkey_hash, match_pay_to_pubkey_hash_replay, match_pay_to_script_hash,
    match_pay_to_script_hash_replay, match_pay_to_witness_pubkey_hash,
    match_pay_to_witness_script_hash,
};

use self::op_codes::{
    OP_0, OP_1, OP_16, OP_1NEGATE, OP_PUSH, OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4,
};

/// Transaction script
#[derive(Default, Clone, PartialEq, Eq, Hash)]
pub struct Script(pub Vec<u8>);

impl Script {
    /// Creates a new empty script.
    #[must_use]
    pub fn new() -> Script {
        Script(vec![])
    }

    /// Appends a single opcode to the script.
    pub fn append(&mut self, op: u8) {
        self.0.push(op);
    }

    /// Appends raw bytes to the script without a push opcode.
    pub fn append_slice(&mut self, slice: &[u8]) {
        self.0.extend_from_slice(slice);
    }

    /// Appends the bytes as a data push, choosing the smallest encoding.
    ///
    /// # Errors
    /// The data may not be longer than u32::MAX bytes.
    pub fn append_data(&mut self, data: &[u8]) -> Result<()> {
        match data.len() {
            len if len < OP_PUSHDATA1 as usize => {
                self.0.push(OP_PUSH + len as u8);
            }
            len if len <= 0xff => {
                self.0.push(OP_PUSHDATA1);
                self.0.push(len as u8);
            }
            len if len <= 0xffff => {
                self.0.push(OP_PUSHDATA2);
                self.0.extend_from_slice(&(len as u16).to_le_bytes());
            }
            len if len <= 0xffff_ffff => {
                self.0.push(OP_PUSHDATA4);
                self.0.extend_from_slice(&(len as u32).to_le_bytes());
            }
            len => {
                return Err(Error::BadArgument(format!("Push too long: {} bytes", len)));
            }
        }
        self.0.extend_from_slice(data);
        Ok(())
    }

    /// Appends a number, using small-int opcodes where one exists.
    pub fn append_num(&mut self, n: i64) {
        match n {
            -1 => self.0.push(OP_1NEGATE),
            0 => self.0.push(OP_0),
            1..=16 => self.0.push(OP_1 + (n - 1) as u8),
            _ => {
                // Numbers outside the small-int range always fit a direct push
                let bytes = encode_num(n);
                self.0.push(OP_PUSH + bytes.len() as u8);
                self.0.extend_from_slice(&bytes);
            }
        }
    }

    /// Decodes the instruction starting at `index`.
    ///
    /// Returns the index of the next instruction, the opcode, and the pushed
    /// data, which is empty for non-push opcodes.
    ///
    /// # Errors
    /// The index must point within the script and any push length must lie
    /// entirely within it.
    pub fn get_op(&self, index: usize) -> Result<(usize, u8, &[u8])> {
        let s = &self.0;
        if index >= s.len() {
            return Err(Error::BadData("Script index out of bounds".to_string()));
        }
        let op = s[index];
        let mut i = index + 1;
        let len = match op {
            len @ 1..=75 => len as usize,
            OP_PUSHDATA1 => {
                if i + 1 > s.len() {
                    return Err(Error::BadData("Script truncated".to_string()));
                }
                let len = s[i] as usize;
                i += 1;
                len
            }
            OP_PUSHDATA2 => {
                if i + 2 > s.len() {
                    return Err(Error::BadData("Script truncated".to_string()));
                }
                let len = u16::from_le_bytes([s[i], s[i + 1]]) as usize;
                i += 2;
                len
            }
            OP_PUSHDATA4 => {
                if i + 4 > s.len() {
                    return Err(Error::BadData("Script truncated".to_string()));
                }
                let len = u32::from_le_bytes([s[i], s[i + 1], s[i + 2], s[i + 3]]) as usize;
                i += 4;
                len
            }
            _ => 0,
        };
        if i + len > s.len() {
            return Err(Error::BadData("Script truncated".to_string()));
        }
        Ok((i + len, op, &s[i..i + len]))
    }
}

/// Returns the index of the instruction after the one at `index`.
///
/// Returns the script length when the instruction is truncated, so scans
/// always terminate.
#[must_use]
pub fn next_op(index: usize, script: &[u8]) -> usize {
    if index >= script.len() {
        return script.len();
    }
    let op = script[index];
    let mut i = index + 1;
    let len = match op {
        len @ 1..=75 => len as usize,
        OP_PUSHDATA1 => {
            if i + 1 > script.len() {
                return script.len();
            }
            let len = script[i] as usize;
            i += 1;
            len
        }
        OP_PUSHDATA2 => {
            if i + 2 > script.len() {
                return script.len();
            }
            let len = u16::from_le_bytes([script[i], script[i + 1]]) as usize;
            i += 2;
            len
        }
        OP_PUSHDATA4 => {
            if i + 4 > script.len() {
                return script.len();
            }
            let len =
                u32::from_le_bytes([script[i], script[i + 1], script[i + 2], script[i + 3]])
                    as usize;
            i += 4;
            len
        }
        _ => 0,
    };
    if i + len > script.len() {
        return script.len();
    }
    i + len
}

/// Encodes a number in the minimal script form.
///
/// Little-endian magnitude with the sign in the high bit of the last byte,
/// padded with one zero byte when the magnitude already uses that bit.
/// Zero encodes as the empty array.
#[must_use]
pub fn encode_num(val: i64) -> Vec<u8> {
    if val == 0 {
        return vec![];
    }
    let negative = val < 0;
    let mut magnitude = val.unsigned_abs();
    let mut bytes = Vec::new();
    while magnitude > 0 {
        bytes.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }
    let last = bytes.len() - 1;
    if bytes[last] & 0x80 != 0 {
        bytes.push(if negative { 0x80 } else { 0 });
    } else if negative {
        bytes[last] |= 0x80;
    }
    bytes
}

/// Decodes a minimally encoded script number.
///
/// # Errors
/// The encoding may not be longer than 8 bytes.
pub fn decode_num(s: &[u8]) -> Result<i64> {
    if s.is_empty() {
        return Ok(0);
    }
    if s.len() > 8 {
        return Err(Error::BadData(format!("Number too long: {} bytes", s.len())));
    }
    let last = s.len() - 1;
    let mut magnitude = (s[last] & 0x7f) as u64;
    for i in (0..last).rev() {
        magnitude = (magnitude << 8) | s[i] as u64;
    }
    if s[last] & 0x80 != 0 {
        Ok(-(magnitude as i64))
    } else {
        Ok(magnitude as i64)
    }
}

impl Serializable<Script> for Script {
    fn read(reader: &mut dyn Read) -> Result<Script> {
        let len = var_int::read(reader)?;
        let mut script = Script(vec![0; len as usize]);
        reader.read_exact(&mut script.0).map_err(Error::IOError)?;
        Ok(script)
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        var_int::write(self.0.len() as u64, writer)?;
        writer.write_all(&self.0)
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Script({})", hex::encode(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::op_codes::OP_9;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn append_data_encodings() {
        let mut s = Script::new();
        s.append_data(&[0xaa; 75]).unwrap();
        assert_eq!(s.0[0], 75);
        let mut s = Script::new();
        s.append_data(&[0xaa; 76]).unwrap();
        assert_eq!(&s.0[..2], &[OP_PUSHDATA1, 76]);
        let mut s = Script::new();
        s.append_data(&[0xaa; 256]).unwrap();
        assert_eq!(&s.0[..3], &[OP_PUSHDATA2, 0, 1]);
        let mut s = Script::new();
        s.append_data(&[0xaa; 65536]).unwrap();
        assert_eq!(&s.0[..5], &[OP_PUSHDATA4, 0, 0, 1, 0]);
    }

    #[test]
    fn append_num_small_ints() {
        let mut s = Script::new();
        s.append_num(-1);
        s.append_num(0);
        s.append_num(1);
        s.append_num(9);
        s.append_num(16);
        assert_eq!(s.0, vec![OP_1NEGATE, OP_0, OP_1, OP_9, OP_16]);
        let mut s = Script::new();
        s.append_num(17);
        assert_eq!(s.0, vec![1, 17]);
        let mut s = Script::new();
        s.append_num(500_000);
        assert_eq!(s.0, vec![3, 0x20, 0xa1, 0x07]);
    }

    #[test]
    fn get_op_walks_all_encodings() {
        let mut s = Script::new();
        s.append(op_codes::OP_DUP);
        s.append_data(&[1, 2, 3]).unwrap();
        s.append_data(&[0xbb; 80]).unwrap();
        let (i, op, data) = s.get_op(0).unwrap();
        assert_eq!((i, op, data.len()), (1, op_codes::OP_DUP, 0));
        let (i, op, data) = s.get_op(i).unwrap();
        assert_eq!((op, data), (3u8, &[1u8, 2, 3][..]));
        let (i, op, data) = s.get_op(i).unwrap();
        assert_eq!((op, data.len()), (OP_PUSHDATA1, 80));
        assert_eq!(i, s.0.len());
    }

    #[test]
    fn get_op_truncated() {
        assert!(Script(vec![5, 1, 2]).get_op(0).is_err());
        assert!(Script(vec![OP_PUSHDATA1]).get_op(0).is_err());
        assert!(Script(vec![OP_PUSHDATA2, 10, 0, 1]).get_op(0).is_err());
        assert!(Script::new().get_op(0).is_err());
    }

    #[test]
    fn next_op_saturates() {
        let s = vec![5, 1, 2];
        assert_eq!(next_op(0, &s), 3);
        assert_eq!(next_op(3, &s), 3);
    }

    #[test]
    fn num_round_trips() {
        for n in [-1i64, 0, 1, 3, 9, 16, 500, -500, 1111, 32767, -32767] {
            assert_eq!(decode_num(&encode_num(n)).unwrap(), n, "n={}", n);
        }
        assert_eq!(encode_num(0), Vec::<u8>::new());
        assert_eq!(encode_num(1), vec![1]);
        assert_eq!(encode_num(-1), vec![0x81]);
        assert_eq!(encode_num(128), vec![0x80, 0x00]);
        assert_eq!(encode_num(-128), vec![0x80, 0x80]);
        assert!(decode_num(&[0; 9]).is_err());
    }

    #[test]
    fn write_read() {
        let mut s = Script::new();
        s.append_data(&[7; 40]).unwrap();
        let mut v = Vec::new();
        s.write(&mut v).unwrap();
        assert_eq!(Script::read(&mut Cursor::new(&v)).unwrap(), s);
    }
}
