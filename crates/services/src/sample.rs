//! Uniform sampling for crawl batches.

use rand::seq::IndexedRandom;

use domains::models::PeerId;

/// Samples up to `cap` peers uniformly without replacement. Batches at
/// or under the cap come back whole.
pub fn sample_peers(peers: &[PeerId], cap: usize) -> Vec<PeerId> {
    if peers.len() <= cap {
        return peers.to_vec();
    }
    peers
        .choose_multiple(&mut rand::rng(), cap)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn peers(n: usize) -> Vec<PeerId> {
        (0..n).map(|i| PeerId::new(format!("Qm{i}"))).collect()
    }

    #[test]
    fn test_small_batches_come_back_whole() {
        let all = peers(7);
        assert_eq!(sample_peers(&all, 10), all);
        assert_eq!(sample_peers(&all, 7), all);
    }

    #[test]
    fn test_large_batches_are_capped_and_distinct() {
        let all = peers(500);
        let sampled = sample_peers(&all, 100);
        assert_eq!(sampled.len(), 100);

        let distinct: HashSet<&PeerId> = sampled.iter().collect();
        assert_eq!(distinct.len(), 100);
        assert!(sampled.iter().all(|p| all.contains(p)));
    }
}
