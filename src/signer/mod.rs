//! Transaction signing and compilation.
//!
//! The signer turns a [`SigningRequest`] into a fully signed, serialized
//! transaction. Signatures come from local private keys, or the signer can
//! emit the digests to sign and compile externally produced signatures
//! back into the transaction.
use crate::address::{lock_script_for_address, lock_script_for_address_replay};
use crate::chain::ChainParams;
use crate::planner::{self, TransactionPlan, UnspentOutput};
use crate::script::op_codes::{OP_0, OP_1};
use crate::script::{
    build_pay_to_public_key_hash, match_multisig, match_pay_to_pubkey, match_pay_to_pubkey_hash,
    match_pay_to_pubkey_hash_replay, match_pay_to_script_hash, match_pay_to_script_hash_replay,
    match_pay_to_witness_pubkey_hash, match_pay_to_witness_script_hash, Script,
};
use crate::transaction::sighash::{
    sighash, SigHashCache, SignatureVersion, SIGHASH_ALL, SIGHASH_FORKID, SIGHASH_SINGLE,
};
use crate::transaction::{generate_signature, verify_signature, Tx, TxIn, TxOut};
use crate::util::{hash160, Error, Hash256, Result, Serializable};
use bitcoin_hashes::{ripemd160, Hash as BHHash};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use std::collections::HashMap;
use zeroize::Zeroizing;

/// Placeholder signature length when no real signature is produced.
const PLACEHOLDER_SIGNATURE_LEN: usize = 72;
/// Placeholder compressed public key length.
const PLACEHOLDER_PUBKEY_LEN: usize = 33;

/// Everything needed to build and sign a transaction.
///
/// Immutable input to the whole pipeline. Construct with [`SigningRequest::new`]
/// and fill in the fields that apply.
#[derive(Debug)]
pub struct SigningRequest {
    /// Parameters of the chain being signed for.
    pub chain: ChainParams,
    /// Destination address.
    pub to_address: String,
    /// Address receiving the change, if any.
    pub change_address: String,
    /// Amount to send in the smallest unit.
    pub amount: u64,
    /// Fee rate in smallest units per byte.
    pub byte_fee: u64,
    /// Sweep mode: send everything minus the fee, no change.
    pub use_max_amount: bool,
    /// Candidate outputs to spend from.
    pub utxos: Vec<UnspentOutput>,
    /// Raw private keys for local signing, wiped on drop.
    pub private_keys: Vec<Zeroizing<[u8; 32]>>,
    /// Sighash type for every input signature.
    pub sighash_type: u32,
    /// Redeem scripts keyed by the lowercase hex of their hash.
    pub redeem_scripts: HashMap<String, Script>,
    /// Precomputed plan. When set, planning is skipped.
    pub plan: Option<TransactionPlan>,
    /// Block hash for replay-protected output scripts.
    pub replay_block_hash: Option<Vec<u8>>,
    /// Block height for replay-protected output scripts.
    pub replay_block_height: Option<i64>,
}

impl SigningRequest {
    /// Creates an empty request for the chain, with the chain's default
    /// sighash type.
    #[must_use]
    pub fn new(chain: ChainParams) -> Self {
        let sighash_type = if chain.fork_id.is_some() {
            SIGHASH_ALL | SIGHASH_FORKID
        } else {
            SIGHASH_ALL
        };
        SigningRequest {
            chain,
            to_address: String::new(),
            change_address: String::new(),
            amount: 0,
            byte_fee: 1,
            use_max_amount: false,
            utxos: vec![],
            private_keys: vec![],
            sighash_type,
            redeem_scripts: HashMap::new(),
            plan: None,
            replay_block_hash: None,
            replay_block_height: None,
        }
    }
}

/// How input signatures are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningMode {
    /// Sign locally with the request's private keys.
    Normal,
    /// Collect digests and required key hashes, use placeholder signatures.
    HashOnly,
    /// Consume externally supplied signatures in planned-input order.
    External,
}

/// A digest to sign and the hash of the public key that must sign it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashPubkey {
    /// Digest to be signed.
    pub sighash: Hash256,
    /// Hash160 of the required public key.
    pub public_key_hash: Vec<u8>,
}

/// Hand-off artifact for external signing, in planned-input order.
pub type HashPubkeyList = Vec<HashPubkey>;

/// A signed, serialized transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningOutput {
    /// Serialized transaction bytes, extended framing iff any input
    /// carries a witness.
    pub encoded: Vec<u8>,
    /// Display-form transaction id, reversed hex.
    pub txid: String,
}

/// Drives planning, per-input signing and final serialization.
pub struct TransactionSigner<'a> {
    request: &'a SigningRequest,
    plan: TransactionPlan,
    tx: Tx,
    mode: SigningMode,
    external_signatures: Vec<(Vec<u8>, Vec<u8>)>,
    hashes_for_signing: HashPubkeyList,
    cache: SigHashCache,
}

impl<'a> TransactionSigner<'a> {
    /// Plans the spend and builds the unsigned transaction skeleton.
    ///
    /// # Errors
    /// Planning failures, an unsupported destination or change address, or
    /// missing replay parameters on a replay-protected chain.
    pub fn new(request: &'a SigningRequest) -> Result<TransactionSigner<'a>> {
        let plan = match &request.plan {
            Some(plan) => plan.clone(),
            None => planner::plan(request)?,
        };
        if plan.utxos.is_empty() {
            return Err(Error::BadArgument("No inputs to sign".to_string()));
        }
        // A precomputed plan must balance; signing an unbalanced one would
        // produce a transaction spending more than its inputs
        let spend = plan
            .amount
            .checked_add(plan.change)
            .and_then(|v| v.checked_add(plan.fee));
        if spend != Some(plan.total()) {
            return Err(Error::IllegalState(format!(
                "Plan does not balance: {} + {} + {} != {}",
                plan.amount,
                plan.change,
                plan.fee,
                plan.total()
            )));
        }
        let to_script = output_script(&request.to_address, request)?;
        let mut outputs = vec![TxOut {
            amount: plan.amount,
            lock_script: to_script,
        }];
        if plan.change > 0 {
            let change_script = output_script(&request.change_address, request)?;
            outputs.push(TxOut {
                amount: plan.change,
                lock_script: change_script,
            });
        }
        let inputs = plan
            .utxos
            .iter()
            .map(|utxo| TxIn {
                prev_output: utxo.out_point.clone(),
                unlock_script: Script::new(),
                sequence: utxo.sequence,
                witness: vec![],
            })
            .collect();
        let tx = Tx {
            version: 1,
            inputs,
            outputs,
            lock_time: 0,
        };
        Ok(TransactionSigner {
            request,
            plan,
            tx,
            mode: SigningMode::Normal,
            external_signatures: vec![],
            hashes_for_signing: vec![],
            cache: SigHashCache::new(),
        })
    }

    /// Signs every input with the request's private keys and serializes.
    ///
    /// # Errors
    /// Missing keys, unmatched scripts, or signing failures. Never returns
    /// a partially signed transaction.
    pub fn sign(mut self) -> Result<SigningOutput> {
        self.mode = SigningMode::Normal;
        self.sign_all()?;
        self.serialize_signed()
    }

    /// Computes the digests that must be signed, without signing.
    ///
    /// # Errors
    /// Unmatched scripts or digest computation failures.
    pub fn preimage_hashes(mut self) -> Result<HashPubkeyList> {
        self.mode = SigningMode::HashOnly;
        self.sign_all()?;
        Ok(self.hashes_for_signing)
    }

    /// Assembles the transaction from externally produced signatures.
    ///
    /// Signatures are plain DER without a trailing type byte, paired with
    /// their public keys in planned-input order. Each one is verified
    /// against its digest before use.
    ///
    /// # Errors
    /// Count mismatches, verification failures, or unmatched scripts.
    pub fn compile(
        mut self,
        signatures: Vec<Vec<u8>>,
        public_keys: Vec<Vec<u8>>,
    ) -> Result<SigningOutput> {
        if signatures.is_empty() {
            return Err(Error::SignatureMismatch("No signatures provided".to_string()));
        }
        if signatures.len() != public_keys.len() {
            return Err(Error::SignatureMismatch(format!(
                "{} signatures for {} public keys",
                signatures.len(),
                public_keys.len()
            )));
        }
        self.mode = SigningMode::External;
        self.external_signatures = signatures.into_iter().zip(public_keys).collect();
        self.sign_all()?;
        self.serialize_signed()
    }

    fn sign_all(&mut self) -> Result<()> {
        let hash_single = self.request.sighash_type & 0x1f == SIGHASH_SINGLE;
        for index in 0..self.plan.utxos.len() {
            // A SINGLE input without a matching output has nothing to sign
            if hash_single && index >= self.tx.outputs.len() {
                continue;
            }
            self.sign_input(index)?;
        }
        Ok(())
    }

    /// Signs one input: classify the lock script, collect the unlocking
    /// items, assemble scriptSig and witness.
    fn sign_input(&mut self, index: usize) -> Result<()> {
        let mut script = self.plan.utxos[index].lock_script.clone();
        let amount = self.plan.utxos[index].amount;
        let sig_version = if self.request.sighash_type & SIGHASH_FORKID != 0 {
            SignatureVersion::WitnessV0
        } else {
            SignatureVersion::Base
        };
        let mut results = self.sign_step(&script, index, amount, sig_version)?;
        let mut redeem_script = None;
        if script.is_pay_to_script_hash() || match_pay_to_script_hash_replay(&script).is_some() {
            script = Script(results[0].clone());
            results = self.sign_step(&script, index, amount, sig_version)?;
            redeem_script = Some(script.clone());
        }
        let mut witness: Vec<Vec<u8>> = vec![];
        if let Some(key_hash) = match_pay_to_witness_pubkey_hash(&script) {
            let witness_script = build_pay_to_public_key_hash(&key_hash);
            witness = self.sign_step(&witness_script, index, amount, SignatureVersion::WitnessV0)?;
            results.clear();
        } else if match_pay_to_witness_script_hash(&script).is_some() {
            let witness_script = Script(results[0].clone());
            witness = self.sign_step(&witness_script, index, amount, SignatureVersion::WitnessV0)?;
            witness.push(witness_script.0);
            results.clear();
        } else if script.is_witness_program() {
            return Err(Error::Unsupported(
                "Unrecognized witness program".to_string(),
            ));
        }
        if let Some(redeem) = redeem_script {
            results.push(redeem.0);
        }
        self.tx.inputs[index].unlock_script = push_all(&results)?;
        self.tx.inputs[index].witness = witness;
        Ok(())
    }

    /// Produces the unlocking items for one script shape. Recursive shapes
    /// (P2SH, P2WSH) return the redeem script for the caller to descend
    /// into.
    fn sign_step(
        &mut self,
        script: &Script,
        index: usize,
        amount: u64,
        version: SignatureVersion,
    ) -> Result<Vec<Vec<u8>>> {
        if let Some(hash) =
            match_pay_to_script_hash(script).or_else(|| match_pay_to_script_hash_replay(script))
        {
            let redeem = self.script_for_script_hash(&hash.0)?;
            return Ok(vec![redeem.0]);
        }
        if let Some(payload) = match_pay_to_witness_script_hash(script) {
            let key = ripemd160::Hash::hash(&payload).to_byte_array();
            let redeem = self.script_for_script_hash(&key)?;
            return Ok(vec![redeem.0]);
        }
        if let Some(hash) = match_pay_to_witness_pubkey_hash(script) {
            return Ok(vec![hash.0.to_vec()]);
        }
        if script.is_witness_program() {
            return Err(Error::Unsupported("Invalid output script".to_string()));
        }
        if let Some((keys, required)) = match_multisig(script) {
            // Leading empty item works around the CHECKMULTISIG pop bug
            let mut results: Vec<Vec<u8>> = vec![vec![]];
            for pubkey in &keys {
                if results.len() > required {
                    break;
                }
                let key_hash = hash160(pubkey);
                let pair = self.key_for_pubkey_hash(&key_hash.0);
                if pair.is_none() && self.mode == SigningMode::Normal {
                    return Err(Error::InvalidPrivateKey(
                        "No key for multisig public key".to_string(),
                    ));
                }
                let signature = self.create_signature(
                    script,
                    &key_hash.0,
                    pair.as_ref().map(|p| &p.0),
                    index,
                    amount,
                    version,
                )?;
                results.push(signature);
            }
            results.resize(required + 1, vec![]);
            return Ok(results);
        }
        if let Some(pubkey) = match_pay_to_pubkey(script) {
            let key_hash = hash160(&pubkey);
            let pair = self.key_for_pubkey_hash(&key_hash.0);
            if pair.is_none() && self.mode == SigningMode::Normal {
                return Err(Error::InvalidPrivateKey(
                    "No key for the required public key".to_string(),
                ));
            }
            let signature = self.create_signature(
                script,
                &key_hash.0,
                pair.as_ref().map(|p| &p.0),
                index,
                amount,
                version,
            )?;
            return Ok(vec![signature]);
        }
        if let Some(hash) =
            match_pay_to_pubkey_hash(script).or_else(|| match_pay_to_pubkey_hash_replay(script))
        {
            let pair = self.key_for_pubkey_hash(&hash.0);
            let pubkey = match &pair {
                Some((_, pubkey)) => pubkey.clone(),
                None => match self.mode {
                    SigningMode::HashOnly => vec![0; PLACEHOLDER_PUBKEY_LEN],
                    SigningMode::External => {
                        let i = self.hashes_for_signing.len();
                        self.external_signatures
                            .get(i)
                            .ok_or_else(|| {
                                Error::SignatureMismatch(
                                    "Not enough external signatures".to_string(),
                                )
                            })?
                            .1
                            .clone()
                    }
                    SigningMode::Normal => {
                        return Err(Error::InvalidPrivateKey(
                            "No key for the required public key hash".to_string(),
                        ))
                    }
                },
            };
            let signature = self.create_signature(
                script,
                &hash.0,
                pair.as_ref().map(|p| &p.0),
                index,
                amount,
                version,
            )?;
            return Ok(vec![signature, pubkey]);
        }
        Err(Error::Unsupported("Invalid output script".to_string()))
    }

    /// Computes the digest for the input and obtains a signature for it
    /// according to the signing mode.
    fn create_signature(
        &mut self,
        script_code: &Script,
        public_key_hash: &[u8],
        key: Option<&Zeroizing<[u8; 32]>>,
        index: usize,
        amount: u64,
        version: SignatureVersion,
    ) -> Result<Vec<u8>> {
        let digest = sighash(
            &self.tx,
            index,
            &script_code.0,
            amount,
            self.request.sighash_type,
            version,
            &self.request.chain,
            &mut self.cache,
        )?;
        match self.mode {
            SigningMode::HashOnly => {
                self.hashes_for_signing.push(HashPubkey {
                    sighash: digest,
                    public_key_hash: public_key_hash.to_vec(),
                });
                Ok(vec![0; PLACEHOLDER_SIGNATURE_LEN])
            }
            SigningMode::External => {
                let i = self.hashes_for_signing.len();
                self.hashes_for_signing.push(HashPubkey {
                    sighash: digest,
                    public_key_hash: public_key_hash.to_vec(),
                });
                let (der_sig, pubkey) = self.external_signatures.get(i).ok_or_else(|| {
                    Error::SignatureMismatch("Not enough external signatures".to_string())
                })?;
                verify_signature(&digest, der_sig, pubkey)?;
                let mut signature = der_sig.clone();
                signature.push((self.request.sighash_type & 0xff) as u8);
                Ok(signature)
            }
            SigningMode::Normal => {
                let key = key.ok_or_else(|| {
                    Error::InvalidPrivateKey(
                        "No key for the required public key hash".to_string(),
                    )
                })?;
                generate_signature(&key[..], &digest, self.request.sighash_type)
            }
        }
    }

    /// Finds the private key whose compressed or uncompressed public key
    /// hashes to the given hash. Returns a wiped-on-drop copy of the key
    /// and the matching public key bytes.
    fn key_for_pubkey_hash(&self, hash: &[u8; 20]) -> Option<(Zeroizing<[u8; 32]>, Vec<u8>)> {
        let secp = Secp256k1::signing_only();
        for key in &self.request.private_keys {
            let secret = match SecretKey::from_byte_array(**key) {
                Ok(secret) => secret,
                Err(_) => continue,
            };
            let public = PublicKey::from_secret_key(&secp, &secret);
            let compressed = public.serialize().to_vec();
            if hash160(&compressed).0 == *hash {
                return Some((key.clone(), compressed));
            }
            let uncompressed = public.serialize_uncompressed().to_vec();
            if hash160(&uncompressed).0 == *hash {
                return Some((key.clone(), uncompressed));
            }
        }
        None
    }

    fn script_for_script_hash(&self, hash: &[u8]) -> Result<Script> {
        self.request
            .redeem_scripts
            .get(&hex::encode(hash))
            .cloned()
            .ok_or_else(|| Error::BadData("Missing redeem script".to_string()))
    }

    fn serialize_signed(&self) -> Result<SigningOutput> {
        let mut encoded = Vec::with_capacity(self.tx.size());
        if self.tx.has_witness() {
            self.tx.write_extended(&mut encoded)?;
        } else {
            self.tx.write(&mut encoded)?;
        }
        let txid = self.tx.txid(self.request.chain.hasher).encode();
        Ok(SigningOutput { encoded, txid })
    }
}

/// Builds the locking script for a destination or change address, using
/// the replay-protected shapes when the chain mandates them.
fn output_script(address: &str, request: &SigningRequest) -> Result<Script> {
    let script = if request.chain.replay_protection {
        let block_hash = request.replay_block_hash.as_deref().ok_or_else(|| {
            Error::BadArgument("Replay protection requires a block hash".to_string())
        })?;
        let block_height = request.replay_block_height.ok_or_else(|| {
            Error::BadArgument("Replay protection requires a block height".to_string())
        })?;
        lock_script_for_address_replay(address, &request.chain, block_hash, block_height)?
    } else {
        lock_script_for_address(address, &request.chain)
    };
    if script.0.is_empty() {
        return Err(Error::BadArgument(format!(
            "Unsupported address: {}",
            address
        )));
    }
    Ok(script)
}

/// Assembles a scriptSig from unlocking items: empty items become `OP_0`,
/// single bytes 1..16 become small-int opcodes, everything else a minimal
/// push.
fn push_all(results: &[Vec<u8>]) -> Result<Script> {
    let mut script = Script::new();
    for result in results {
        if result.is_empty() {
            script.append(OP_0);
        } else if result.len() == 1 && result[0] >= 1 && result[0] <= 16 {
            script.append(OP_1 + result[0] - 1);
        } else {
            script.append_data(result)?;
        }
    }
    Ok(script)
}
