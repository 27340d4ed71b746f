//! Random sequences for tests and benchmarks.

use rand::prelude::*;

pub static NUC: [u8; 4] = [b'A', b'C', b'G', b'T'];

pub static AMINO_ACIDS: [u8; 20] = [
    b'A', b'C', b'D', b'E', b'F', b'G', b'H', b'I', b'K', b'L',
    b'M', b'N', b'P', b'Q', b'R', b'S', b'T', b'V', b'W', b'Y'
];

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
enum Edit {
    Keep,
    Substitute,
    Insert,
    Delete
}

/// Uniform random string over `alpha`. Empty when `alpha` is empty.
pub fn rand_str<R: Rng>(len: usize, alpha: &[u8], rng: &mut R) -> Vec<u8> {
    (0..len).filter_map(|_| alpha.choose(rng).copied()).collect()
}

/// Applies between `3k/4` and `k` random edits to `a`. Every edit position is
/// distinct, so deletions never empty a sequence longer than `k`.
pub fn rand_mutate<R: Rng>(a: &[u8], k: usize, alpha: &[u8], rng: &mut R) -> Vec<u8> {
    let k = k.min(a.len());
    let count = rng.gen_range(k * 3 / 4..=k);
    let mut edits = vec![Edit::Keep; a.len()];
    let positions = rand::seq::index::sample(rng, a.len(), count);
    for idx in positions.iter() {
        edits[idx] = match rng.gen_range(0..3) {
            0 => Edit::Substitute,
            1 => Edit::Insert,
            _ => Edit::Delete
        };
    }

    let mut b = Vec::with_capacity(a.len() + count);
    for (&c, &edit) in a.iter().zip(edits.iter()) {
        match edit {
            Edit::Keep => b.push(c),
            Edit::Substitute => {
                // fall back to the original letter for single-letter alphabets
                let other = alpha.iter().copied().filter(|&x| x != c).choose(rng);
                b.push(other.unwrap_or(c));
            },
            Edit::Insert => {
                b.extend(alpha.choose(rng).copied());
                b.push(c);
            },
            Edit::Delete => ()
        }
    }
    b
}

/// A random sequence and a mutated copy of it, for end-to-end runs.
pub fn rand_pair<R: Rng>(len: usize, k: usize, alpha: &[u8], rng: &mut R) -> (Vec<u8>, Vec<u8>) {
    let a = rand_str(len, alpha, rng);
    let b = rand_mutate(&a, k, alpha, rng);
    (a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rand_mutate() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = rand_str(100, &NUC, &mut rng);
        assert_eq!(a.len(), 100);
        assert!(a.iter().all(|c| NUC.contains(c)));

        assert_eq!(rand_mutate(&a, 0, &NUC, &mut rng), a);

        let b = rand_mutate(&a, 10, &NUC, &mut rng);
        assert!(b.len() >= 90 && b.len() <= 110);
        assert!(b.iter().all(|c| NUC.contains(c)));
    }

    #[test]
    fn test_rand_pair_short() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let (a, b) = rand_pair(2, 1, &NUC, &mut rng);
            assert_eq!(a.len(), 2);
            assert!(!b.is_empty());
        }
    }
}
