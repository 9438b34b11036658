//! Lazy k-subset enumeration.

/// Lexicographic k-subsets of `0..n`, generated one at a time.
///
/// `Combinations::new(4, 2)` yields `[0,1] [0,2] [0,3] [1,2] [1,3] [2,3]`.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    k: usize,
    next: Option<Vec<usize>>,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        let next = (k <= n).then(|| (0..k).collect());
        Combinations { n, k, next }
    }

    /// Number of subsets `C(n, k)`, saturating at `u128::MAX`
    pub fn total(n: usize, k: usize) -> u128 {
        if k > n {
            return 0;
        }
        let k = k.min(n - k);
        (0..k).fold(1u128, |acc, i| {
            acc.saturating_mul((n - i) as u128) / (i as u128 + 1)
        })
    }

    /// Group subsets into vectors of at most `size`
    pub fn chunks(self, size: usize) -> Chunks {
        Chunks {
            inner: self,
            size: size.max(1),
        }
    }

    fn advance(&self, current: &[usize]) -> Option<Vec<usize>> {
        let mut next = current.to_vec();
        // Rightmost position that can still move up
        let i = (0..self.k).rev().find(|&i| next[i] < self.n - self.k + i)?;
        next[i] += 1;
        for j in i + 1..self.k {
            next[j] = next[j - 1] + 1;
        }
        Some(next)
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.next.take()?;
        self.next = self.advance(&current);
        Some(current)
    }
}

/// Fixed-size groups of combinations
#[derive(Debug, Clone)]
pub struct Chunks {
    inner: Combinations,
    size: usize,
}

impl Iterator for Chunks {
    type Item = Vec<Vec<usize>>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk: Vec<Vec<usize>> = self.inner.by_ref().take(self.size).collect();
        (!chunk.is_empty()).then_some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicographic_order() {
        let all: Vec<Vec<usize>> = Combinations::new(4, 2).collect();
        assert_eq!(
            all,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
    }

    #[test]
    fn test_counts_match_binomial() {
        for n in 0..8 {
            for k in 0..=n + 1 {
                assert_eq!(
                    Combinations::new(n, k).count() as u128,
                    Combinations::total(n, k),
                    "C({n}, {k})"
                );
            }
        }
    }

    #[test]
    fn test_edge_sizes() {
        assert_eq!(Combinations::new(3, 0).collect::<Vec<_>>(), vec![Vec::<usize>::new()]);
        assert_eq!(Combinations::new(3, 3).collect::<Vec<_>>(), vec![vec![0, 1, 2]]);
        assert_eq!(Combinations::new(2, 3).count(), 0);
    }

    #[test]
    fn test_chunks_cover_everything_once() {
        let chunks: Vec<Vec<Vec<usize>>> = Combinations::new(5, 2).chunks(3).collect();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[3].len(), 1);
        let flat: Vec<Vec<usize>> = chunks.into_iter().flatten().collect();
        assert_eq!(flat, Combinations::new(5, 2).collect::<Vec<_>>());
    }
}
