//! Bounded list of the best distinct alignment scores.
//!
//! Local alignments produce many high-scoring cells that are only the same
//! alignment extended by a few more columns. A new record is kept only if it
//! is close enough to the best score and cannot be explained as the
//! continuation of an existing, better record.

use std::collections::BTreeSet;
use std::sync::Mutex;

use crate::lock;
use crate::matrix::ScoreRecord;
use crate::scores::{Score, ScoreParams};

/// Fraction of a positive best score a record must reach to be kept.
pub const ALLOWED_POSITIVE_RATIO: f64 = 0.25;
/// Multiple of a negative best score a record must stay above to be kept.
pub const ALLOWED_NEGATIVE_RATIO: f64 = 1.10;
/// Probability of a match in the score envelope used by the derivation test.
pub const MATCH_PROBABILITY: f64 = 0.25;

#[derive(Debug)]
pub struct BestScoreList {
    params: ScoreParams,
    capacity: usize,
    min_score: Score,
    // best first
    records: Mutex<BTreeSet<ScoreRecord>>
}

impl BestScoreList {
    pub fn new(params: ScoreParams, capacity: usize, min_score: Score) -> Self {
        Self {
            params,
            capacity: capacity.max(1),
            min_score,
            records: Mutex::new(BTreeSet::new())
        }
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    pub fn min_score(&self) -> Score {
        self.min_score
    }

    /// Offers a record to the list. Returns whether it was inserted.
    pub fn add(&self, record: ScoreRecord) -> bool {
        if record.score < self.min_score {
            log::trace!("best list: {} below floor {}", record, self.min_score);
            return false;
        }

        let mut records = lock(&self.records);
        if records.contains(&record) {
            return false;
        }

        if records.len() >= self.capacity {
            if let Some(worst) = records.last() {
                if record.score <= worst.score {
                    log::trace!("best list: {} not better than worst {}", record, worst);
                    return false;
                }
            }
        }

        if let Some(best) = records.first() {
            if !is_allowed(best.score, record.score) {
                log::trace!("best list: {} too far below best {}", record, best);
                return false;
            }
        }

        if let Some(a) = records.iter().find(|a| self.is_derived(a, &record)) {
            log::trace!("best list: {} derived from {}", record, a);
            return false;
        }

        records.retain(|b| !self.is_derived(&record, b));
        records.insert(record);

        while records.len() > self.capacity {
            if let Some(worst) = records.pop_last() {
                log::debug!("best list: evicted {}", worst);
            }
        }
        true
    }

    /// Whether `record` is plausibly `from`'s alignment continued to another
    /// cell: it scores lower, and the drop is at least what a random
    /// continuation over the coordinate delta is expected to cost.
    pub fn is_derived(&self, from: &ScoreRecord, record: &ScoreRecord) -> bool {
        if record.score >= from.score {
            return false;
        }

        let (di, dj) = from.delta(record);
        let diag = di.min(dj);
        let gaps = di.abs_diff(dj);
        let p = &self.params;
        let per_cell = MATCH_PROBABILITY * p.match_score as f64 + (1.0 - MATCH_PROBABILITY) * p.mismatch as f64;
        let envelope = diag as f64 * per_cell.abs() + p.gap_cost(gaps) as f64;

        (from.score as i64 - record.score as i64) as f64 >= envelope
    }

    pub fn best(&self) -> Option<ScoreRecord> {
        lock(&self.records).first().copied()
    }

    pub fn worst(&self) -> Option<ScoreRecord> {
        lock(&self.records).last().copied()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }

    /// Snapshot of the records, best first.
    pub fn records(&self) -> Vec<ScoreRecord> {
        lock(&self.records).iter().copied().collect()
    }

    pub fn clear(&self) {
        lock(&self.records).clear();
    }
}

fn is_allowed(best: Score, score: Score) -> bool {
    let (best, score) = (best as f64, score as f64);
    if best > 0.0 {
        score >= ALLOWED_POSITIVE_RATIO * best
    } else if best < 0.0 {
        score >= ALLOWED_NEGATIVE_RATIO * best
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(capacity: usize, min_score: Score) -> BestScoreList {
        BestScoreList::new(ScoreParams::new(1, -3, 3, 2).unwrap(), capacity, min_score)
    }

    #[test]
    fn test_floor_and_capacity() {
        let l = list(2, 1);
        assert!(!l.add(ScoreRecord::new(10, 10, 0)));
        assert!(l.add(ScoreRecord::new(100, 100, 10)));
        assert!(l.add(ScoreRecord::new(500, 500, 12)));
        assert!(l.add(ScoreRecord::new(900, 900, 11)));
        assert_eq!(l.records(), vec![ScoreRecord::new(500, 500, 12), ScoreRecord::new(900, 900, 11)]);
        assert!(!l.add(ScoreRecord::new(300, 300, 9)));
        assert!(!l.add(ScoreRecord::new(300, 300, 11)));
        assert_eq!(l.len(), 2);
    }

    #[test]
    fn test_allowed_ratio() {
        let l = list(16, 1);
        assert!(l.add(ScoreRecord::new(0, 0, 100)));
        assert!(!l.add(ScoreRecord::new(1000, 1000, 20)));
        assert!(l.add(ScoreRecord::new(1000, 1000, 30)));

        let l = list(16, -1000);
        assert!(l.add(ScoreRecord::new(0, 0, -20)));
        assert!(!l.add(ScoreRecord::new(500, 500, -23)));
        assert!(l.add(ScoreRecord::new(500, 500, -21)));
    }

    #[test]
    fn test_derivation() {
        let a = ScoreRecord::new(100, 100, 200);
        let b = ScoreRecord::new(150, 150, 90);

        let l = list(16, 1);
        // envelope over 50 diagonal cells is 50 * |0.25 - 2.25| = 100
        assert!(l.is_derived(&a, &b));
        assert!(!l.is_derived(&b, &a));
        assert!(!l.is_derived(&a, &ScoreRecord::new(150, 150, 101)));
        assert!(l.add(a));
        assert!(!l.add(b));
        assert_eq!(l.records(), vec![a]);

        // a better record displaces what it explains
        let l = list(16, 1);
        assert!(l.add(b));
        assert!(l.add(a));
        assert_eq!(l.records(), vec![a]);
    }

    #[test]
    fn test_idempotent() {
        let l = list(4, 1);
        let r = ScoreRecord::new(8, 8, 4);
        assert!(l.add(r));
        let before = l.records();
        assert!(!l.add(r));
        assert_eq!(l.records(), before);
        assert_eq!(l.best(), Some(r));
        assert_eq!(l.worst(), Some(r));
        l.clear();
        assert!(l.is_empty());
    }

    #[test]
    fn test_concurrent_adds() {
        let l = list(8, 1);
        std::thread::scope(|s| {
            for t in 0..4 {
                let l = &l;
                s.spawn(move || {
                    for k in 0..50 {
                        l.add(ScoreRecord::new(t * 1000 + k * 10, k * 10, 100 + (k % 7) as Score));
                    }
                });
            }
        });
        assert!(l.len() <= 8);
        assert_eq!(l.best().map(|r| r.score), Some(106));
    }
}
