//! flash-ledger
//!
//! The per-node ledger: genesis endowments, per-sender transaction logs, the
//! balance-replay function and the stake-weighted quorum predicate. Pure
//! state — all networking lives above this crate.

pub mod merge;

pub use merge::merge_txs;

use std::collections::HashMap;

use flash_core::{FlashError, Tx, TxMap};

/// Ledger state owned by a node.
///
/// `balances` is always derived: it is only ever replaced wholesale by a
/// successful [`Ledger::calc_balances`] run.
#[derive(Debug, Default)]
pub struct Ledger {
    /// Sender peer-id → that sender's ordered, gap-free tx log.
    pub txs: TxMap,
    /// Initial balance assignment. Immutable after load.
    pub genesis: HashMap<String, f64>,
    /// Current balances, derived by replay.
    pub balances: HashMap<String, f64>,
    /// Sum of all genesis balances. Immutable.
    pub total_coins: f64,
    /// Sequence number the node will assign to its next outgoing tx.
    pub next_sequence_num: u64,
}

impl Ledger {
    pub fn new(genesis: HashMap<String, f64>) -> Self {
        let total_coins = genesis.values().sum();
        Self {
            txs: TxMap::new(),
            genesis,
            balances: HashMap::new(),
            total_coins,
            next_sequence_num: 0,
        }
    }

    /// Replay every tx log from genesis and replace `balances` on success.
    ///
    /// Enforces per-sender sequence contiguity and non-negative sender
    /// balances. Receiver accounts are created on first use — a tx may pay
    /// into an account no genesis entry ever mentioned. A failed replay
    /// leaves the previous balances untouched.
    pub fn calc_balances(&mut self) -> Result<(), FlashError> {
        let mut balances = self.genesis.clone();

        for txs in self.txs.values() {
            for (i, tx) in txs.iter().enumerate() {
                if tx.sequence_num != i as u64 {
                    return Err(FlashError::OutOfOrder);
                }

                *balances.entry(tx.from.clone()).or_insert(0.0) -= tx.amount;
                *balances.entry(tx.to.clone()).or_insert(0.0) += tx.amount;

                if balances[&tx.from] < 0.0 {
                    return Err(FlashError::NegativeBalance);
                }
            }
        }

        self.balances = balances;
        Ok(())
    }

    /// Merge another tx-log map into this ledger's logs.
    pub fn merge_from(&mut self, other: &TxMap) {
        self.txs = merge_txs(&self.txs, other);
    }

    /// Sum of the current balances of a tx's verifiers. Unknown ids count 0.
    pub fn verifier_stake(&self, tx: &Tx) -> f64 {
        tx.verifiers
            .iter()
            .filter_map(|v| self.balances.get(&v.id))
            .sum()
    }

    /// Stake-weighted acceptance: verifier stake must strictly exceed half
    /// of the total coin supply. Single round; the sender cannot vote for
    /// itself because it never appears in its own verifier list.
    pub fn has_verifier_quorum(&self, tx: &Tx) -> bool {
        self.verifier_stake(tx) > self.total_coins / 2.0
    }
}
