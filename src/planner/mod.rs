//! Coin selection and fee planning.
//!
//! Selection accumulates candidates in the order given until the running
//! total covers amount plus fee. This is not a minimization search.
use crate::signer::SigningRequest;
use crate::transaction::OutPoint;
use crate::script::Script;
use crate::util::{Error, Result};

/// Fixed transaction overhead: version, input count, output count, locktime.
const TX_OVERHEAD: u64 = 10;
/// Extended framing overhead: marker and flag bytes.
const WITNESS_FRAMING: u64 = 2;
/// Estimated size of a signed legacy input.
const LEGACY_INPUT_SIZE: u64 = 148;
/// Estimated weight-adjusted size of a signed witness input.
const WITNESS_INPUT_SIZE: u64 = 68;
/// Estimated size of an output.
const OUTPUT_SIZE: u64 = 34;

/// An unspent output available for selection.
///
/// Read-only planning input. Selection copies it into a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    /// Reference to the output being spent.
    pub out_point: OutPoint,
    /// Sequence to use for the input spending this output.
    pub sequence: u32,
    /// Locking script of the output.
    pub lock_script: Script,
    /// Amount in the smallest unit of the chain.
    pub amount: u64,
}

/// A complete, balanced spending plan.
///
/// Balances exactly: the sum of the selected amounts equals
/// `amount + change + fee`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPlan {
    /// Selected outputs, in selection order.
    pub utxos: Vec<UnspentOutput>,
    /// Amount sent to the destination.
    pub amount: u64,
    /// Amount returned to the change address. Zero means no change output.
    pub change: u64,
    /// Fee paid to miners.
    pub fee: u64,
}

impl TransactionPlan {
    /// Total value of the selected outputs.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.utxos.iter().map(|u| u.amount).sum()
    }
}

/// Estimates the serialized size of a signed transaction in bytes.
///
/// Witness estimates use the weight-adjusted input size plus the extended
/// framing bytes.
#[must_use]
pub fn estimate_size(n_inputs: u64, n_outputs: u64, segwit: bool) -> u64 {
    let (input_size, framing) = if segwit {
        (WITNESS_INPUT_SIZE, WITNESS_FRAMING)
    } else {
        (LEGACY_INPUT_SIZE, 0)
    };
    TX_OVERHEAD + framing + input_size * n_inputs + OUTPUT_SIZE * n_outputs
}

fn all_witness(utxos: &[UnspentOutput]) -> bool {
    !utxos.is_empty() && utxos.iter().all(|u| u.lock_script.is_witness_program())
}

/// Builds a spending plan for the request.
///
/// Candidates are taken in the order given until the total covers the
/// requested amount plus the fee, with the fee re-estimated after each
/// added input. In send-max mode every candidate is selected and the
/// destination amount is the total minus the fee.
///
/// # Errors
/// `Error::InsufficientFunds` if the candidates cannot cover amount plus
/// fee, `Error::FeeError` if the fee alone would consume the total or the
/// fee arithmetic overflows.
pub fn plan(request: &SigningRequest) -> Result<TransactionPlan> {
    if request.use_max_amount {
        return plan_max(request);
    }
    let mut selected: Vec<UnspentOutput> = Vec::new();
    let mut total: u64 = 0;
    for utxo in &request.utxos {
        total = total
            .checked_add(utxo.amount)
            .ok_or_else(|| Error::FeeError("Input total overflow".to_string()))?;
        selected.push(utxo.clone());
        // Destination and change output
        let size = estimate_size(selected.len() as u64, 2, all_witness(&selected));
        let fee = size
            .checked_mul(request.byte_fee)
            .ok_or_else(|| Error::FeeError("Fee overflow".to_string()))?;
        let target = request
            .amount
            .checked_add(fee)
            .ok_or_else(|| Error::FeeError("Target overflow".to_string()))?;
        if total >= target {
            return Ok(TransactionPlan {
                utxos: selected,
                amount: request.amount,
                change: total - target,
                fee,
            });
        }
    }
    Err(Error::InsufficientFunds(format!(
        "Have {} of {} requested",
        total, request.amount
    )))
}

/// Send-max plan: every candidate, no change.
fn plan_max(request: &SigningRequest) -> Result<TransactionPlan> {
    let selected = request.utxos.clone();
    let total: u64 = selected.iter().map(|u| u.amount).sum();
    let size = estimate_size(selected.len() as u64, 1, all_witness(&selected));
    let fee = size
        .checked_mul(request.byte_fee)
        .ok_or_else(|| Error::FeeError("Fee overflow".to_string()))?;
    if fee >= total {
        return Err(Error::FeeError(format!(
            "Fee {} consumes the total {}",
            fee, total
        )));
    }
    Ok(TransactionPlan {
        utxos: selected,
        amount: total - fee,
        change: 0,
        fee,
    })
}
