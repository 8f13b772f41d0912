use std::collections::HashSet;

use flash_core::TxMap;

/// Merge two tx-log maps.
///
/// For each sender the result is `a`'s log followed by those entries of
/// `b`'s log whose signature bytes do not already appear in `a`'s. Order is
/// preserved as-is; no re-sorting by sequence number happens here — a merge
/// that produces an out-of-order log is caught by the next balance replay.
pub fn merge_txs(a: &TxMap, b: &TxMap) -> TxMap {
    let mut merged = a.clone();

    for (sender, incoming) in b {
        let log = merged.entry(sender.clone()).or_default();
        let seen: HashSet<&[u8]> = log.iter().map(|tx| tx.sig.as_slice()).collect();

        let fresh: Vec<_> = incoming
            .iter()
            .filter(|tx| !seen.contains(tx.sig.as_slice()))
            .cloned()
            .collect();
        log.extend(fresh);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use flash_core::Tx;

    fn tx(sig: &str) -> Tx {
        Tx {
            sequence_num: 0,
            from: String::new(),
            to: String::new(),
            pubkey: Vec::new(),
            amount: 0.0,
            sig: sig.as_bytes().to_vec(),
            verifiers: Vec::new(),
            committed: false,
        }
    }

    fn map(entries: &[(&str, &[&str])]) -> TxMap {
        entries
            .iter()
            .map(|(sender, sigs)| (sender.to_string(), sigs.iter().map(|s| tx(s)).collect()))
            .collect()
    }

    fn sigs(log: &[Tx]) -> Vec<&str> {
        log.iter().map(|t| std::str::from_utf8(&t.sig).unwrap()).collect()
    }

    #[test]
    fn disjoint_senders_merge() {
        let a = map(&[("key1", &["sig1", "sig2"])]);
        let b = map(&[("key2", &["sig3", "sig4"])]);

        let merged = merge_txs(&a, &b);

        assert_eq!(merged.len(), 2);
        assert_eq!(sigs(&merged["key1"]), ["sig1", "sig2"]);
        assert_eq!(sigs(&merged["key2"]), ["sig3", "sig4"]);
    }

    #[test]
    fn duplicate_signatures_appear_once() {
        let a = map(&[("key1", &["sig1"])]);
        let b = map(&[("key1", &["sig1", "sig2"])]);

        let merged = merge_txs(&a, &b);

        assert_eq!(merged.len(), 1);
        assert_eq!(sigs(&merged["key1"]), ["sig1", "sig2"]);
    }

    #[test]
    fn empty_inputs_merge_to_empty() {
        assert!(merge_txs(&TxMap::new(), &TxMap::new()).is_empty());
    }

    #[test]
    fn partial_overlap() {
        let a = map(&[("key1", &["sig1"])]);
        let b = map(&[("key1", &["sig2"]), ("key2", &["sig3"])]);

        let merged = merge_txs(&a, &b);

        assert_eq!(merged.len(), 2);
        assert_eq!(sigs(&merged["key1"]), ["sig1", "sig2"]);
        assert_eq!(sigs(&merged["key2"]), ["sig3"]);
    }

    #[test]
    fn no_overlap_between_logs() {
        let a = map(&[("key1", &["sig1"])]);
        let b = map(&[("key2", &["sig2"])]);

        let merged = merge_txs(&a, &b);

        assert_eq!(merged.len(), 2);
        assert_eq!(sigs(&merged["key1"]), ["sig1"]);
        assert_eq!(sigs(&merged["key2"]), ["sig2"]);
    }

    #[test]
    fn merge_is_idempotent() {
        let a = map(&[("key1", &["sig1", "sig2"])]);
        let b = map(&[("key1", &["sig2", "sig3"]), ("key2", &["sig4"])]);

        let once = merge_txs(&a, &b);
        let twice = merge_txs(&once, &b);

        assert_eq!(once, twice);
    }

    #[test]
    fn merge_with_empty_is_identity() {
        let a = map(&[("key1", &["sig1"]), ("key2", &["sig2", "sig3"])]);
        assert_eq!(merge_txs(&a, &TxMap::new()), a);
    }
}
