#![deny(missing_docs)]
#![deny(unsafe_code)]

/*! # txforge

A transaction construction and signing engine for UTXO-model chains.
Provides script pattern matchers and builders, coin selection and fee
planning, legacy and BIP-143 signature hashing, and a transaction signer
that works with local keys or externally produced signatures.

## Usage

```no_run
use txforge::chain::ChainParams;
use txforge::signer::{SigningRequest, TransactionSigner};

let mut request = SigningRequest::new(ChainParams::bitcoin());
request.to_address = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string();
request.change_address = request.to_address.clone();
request.amount = 50_000;
// request.utxos / request.private_keys come from the caller's wallet state
let output = TransactionSigner::new(&request)?.sign()?;
println!("{}", output.txid);
# Ok::<(), txforge::util::Error>(())
```

## Security

Private key bytes are held in wiped-on-drop buffers and never logged.
This crate builds and signs transactions; it does not perform consensus
validation or talk to the network.
*/

pub mod address;
pub mod chain;
pub mod planner;
pub mod script;
pub mod signer;
pub mod transaction;
pub mod util;
