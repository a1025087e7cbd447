//! Standard error and result types for the library.
use base58::FromBase58Error;
use hex::FromHexError;
use secp256k1::Error as Secp256k1Error;
use std::io;

/// Standard error type used in the library
#[derive(Debug)]
pub enum Error {
    /// An argument provided is invalid
    BadArgument(String),
    /// The data given is not valid
    BadData(String),
    /// The planned fee exceeds the funds available
    FeeError(String),
    /// Base58 string could not be decoded
    FromBase58Error(FromBase58Error),
    /// Hex string could not be decoded
    FromHexError(FromHexError),
    /// The state is not valid
    IllegalState(String),
    /// Candidate utxos do not cover the requested amount plus fee
    InsufficientFunds(String),
    /// A private key was malformed or no key matches the required public key
    InvalidPrivateKey(String),
    /// A supplied signature failed verification against its digest
    InvalidSignature(String),
    /// Standard library IO error
    IOError(io::Error),
    /// Error in the Secp256k1 library
    Secp256k1Error(Secp256k1Error),
    /// Externally supplied signatures do not line up with the planned inputs
    SignatureMismatch(String),
    /// The data or functionality is not supported by this library
    Unsupported(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadArgument(s) => write!(f, "Bad argument: {}", s),
            Error::BadData(s) => write!(f, "Bad data: {}", s),
            Error::FeeError(s) => write!(f, "Fee error: {}", s),
            Error::FromBase58Error(e) => write!(f, "Base58 decoding error: {:?}", e),
            Error::FromHexError(e) => write!(f, "Hex decoding error: {}", e),
            Error::IllegalState(s) => write!(f, "Illegal state: {}", s),
            Error::InsufficientFunds(s) => write!(f, "Insufficient funds: {}", s),
            Error::InvalidPrivateKey(s) => write!(f, "Invalid private key: {}", s),
            Error::InvalidSignature(s) => write!(f, "Invalid signature: {}", s),
            Error::IOError(e) => write!(f, "IO error: {}", e),
            Error::Secp256k1Error(e) => write!(f, "Secp256k1 error: {}", e),
            Error::SignatureMismatch(s) => write!(f, "Signature mismatch: {}", s),
            Error::Unsupported(s) => write!(f, "Unsupported: {}", s),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FromHexError(e) => Some(e),
            Error::IOError(e) => Some(e),
            Error::Secp256k1Error(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FromBase58Error> for Error {
    fn from(e: FromBase58Error) -> Self {
        Error::FromBase58Error(e)
    }
}

impl From<FromHexError> for Error {
    fn from(e: FromHexError) -> Self {
        Error::FromHexError(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::IOError(e)
    }
}

impl From<Secp256k1Error> for Error {
    fn from(e: Secp256k1Error) -> Self {
        Error::Secp256k1Error(e)
    }
}

/// Standard Result used in the library
pub type Result<T> = std::result::Result<T, Error>;
