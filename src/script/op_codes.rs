//! Script opcodes used by the pattern matchers and builders.
//!
//! Constants grouped by category. Only the opcodes the standard locking and
//! unlocking shapes use are listed; this crate does not execute scripts.

// Pushdata and Constants
/// Pushes empty array (0/false) onto the stack.
pub const OP_0: u8 = 0;
/// Alias of OP_0 as the implicit base for direct pushes.
pub const OP_PUSH: u8 = 0;

/// Next byte is push length (up to 255 bytes).
pub const OP_PUSHDATA1: u8 = 76;
/// Next two bytes are push length (up to 65535 bytes).
pub const OP_PUSHDATA2: u8 = 77;
/// Next four bytes are push length (up to 4GB).
pub const OP_PUSHDATA4: u8 = 78;

/// Pushes -1 onto the stack.
pub const OP_1NEGATE: u8 = 79;

/// Pushes 1 (true) onto the stack.
pub const OP_1: u8 = 81;
/// Pushes 2 onto the stack.
pub const OP_2: u8 = 82;
/// Pushes 3 onto the stack.
pub const OP_3: u8 = 83;
/// Pushes 9 onto the stack.
pub const OP_9: u8 = 89;
/// Pushes 16 onto the stack.
pub const OP_16: u8 = 96;

// Flow Control
/// Ends execution; the remainder of the script is an unspendable data carrier.
pub const OP_RETURN: u8 = 106;

// Stack Operations
/// Duplicates top.
pub const OP_DUP: u8 = 118;

// Bitwise Logic
/// Equals top two (bytes).
pub const OP_EQUAL: u8 = 135;
/// Equals + VERIFY.
pub const OP_EQUALVERIFY: u8 = 136;

// Cryptography
/// RIPEMD160(SHA256(top)).
pub const OP_HASH160: u8 = 169;
/// Starts sig matching from here; stripped from legacy sighash script code.
pub const OP_CODESEPARATOR: u8 = 171;
/// Verifies sig for pubkey/tx (1/0).
pub const OP_CHECKSIG: u8 = 172;
/// m-of-n multisig verify (1/0).
pub const OP_CHECKMULTISIG: u8 = 174;

// Replay protection
/// Fails unless the pushed block hash matches the chain at the pushed
/// height (Horizen replay protection; numerically OP_NOP5).
pub const OP_CHECKBLOCKATHEIGHT: u8 = 180;
