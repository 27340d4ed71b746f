use std::fmt;

/// Half-open rectangle `[i0, i1) x [j0, j1)` of the alignment matrix.
///
/// Rows follow sequence 1 and columns follow sequence 2. Partitions are never
/// mutated; translation produces a new value.
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, Default)]
pub struct Partition {
    i0: usize,
    j0: usize,
    i1: usize,
    j1: usize
}

impl Partition {
    /// Creates a partition; bounds given in reverse order are swapped.
    pub fn new(i0: usize, j0: usize, i1: usize, j1: usize) -> Self {
        Self {
            i0: i0.min(i1),
            j0: j0.min(j1),
            i1: i0.max(i1),
            j1: j0.max(j1)
        }
    }

    /// Whole matrix for sequences of the given lengths.
    pub fn whole(len1: usize, len2: usize) -> Self {
        Self::new(0, 0, len1, len2)
    }

    #[inline(always)]
    pub fn i0(&self) -> usize { self.i0 }
    #[inline(always)]
    pub fn j0(&self) -> usize { self.j0 }
    #[inline(always)]
    pub fn i1(&self) -> usize { self.i1 }
    #[inline(always)]
    pub fn j1(&self) -> usize { self.j1 }

    #[inline(always)]
    pub fn height(&self) -> usize {
        self.i1 - self.i0
    }

    #[inline(always)]
    pub fn width(&self) -> usize {
        self.j1 - self.j0
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.height() == 0 || self.width() == 0
    }

    #[inline(always)]
    pub fn area(&self) -> usize {
        self.height() * self.width()
    }

    /// Shifts the partition by `(di, dj)`, for moving between a local and the
    /// global coordinate space. Returns `None` if a bound would go negative.
    pub fn translate(&self, di: isize, dj: isize) -> Option<Self> {
        Some(Self {
            i0: self.i0.checked_add_signed(di)?,
            j0: self.j0.checked_add_signed(dj)?,
            i1: self.i1.checked_add_signed(di)?,
            j1: self.j1.checked_add_signed(dj)?
        })
    }

    /// Same region expressed in the coordinates of the reversed sequences.
    pub fn reversed(&self, len1: usize, len2: usize) -> Option<Self> {
        if self.i1 > len1 || self.j1 > len2 {
            return None;
        }
        Some(Self::new(len1 - self.i1, len2 - self.j1, len1 - self.i0, len2 - self.j0))
    }

    /// Whether `other` lies entirely within this partition.
    pub fn contains(&self, other: &Partition) -> bool {
        other.i0 >= self.i0 && other.i1 <= self.i1 && other.j0 >= self.j0 && other.j1 <= self.j1
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{})x[{},{})", self.i0, self.i1, self.j0, self.j1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dims() {
        let p = Partition::new(10, 20, 30, 25);
        assert_eq!(p.height(), 20);
        assert_eq!(p.width(), 5);
        assert_eq!(p.area(), 100);
        assert!(!p.is_empty());
        assert!(Partition::new(5, 5, 5, 9).is_empty());
        assert_eq!(Partition::new(30, 25, 10, 20), p);
    }

    #[test]
    fn test_translate() {
        let p = Partition::new(10, 20, 30, 25);
        assert_eq!(p.translate(-10, 5), Some(Partition::new(0, 25, 20, 30)));
        assert_eq!(p.translate(-11, 0), None);
        let back = p.translate(100, 100).and_then(|q| q.translate(-100, -100));
        assert_eq!(back, Some(p));
    }

    #[test]
    fn test_reversed() {
        let p = Partition::new(2, 3, 5, 7);
        let r = p.reversed(10, 10).unwrap();
        assert_eq!(r, Partition::new(5, 3, 8, 7));
        assert_eq!(r.reversed(10, 10), Some(p));
        assert_eq!(p.reversed(4, 10), None);
        assert!(Partition::whole(10, 10).contains(&p));
        assert!(!p.contains(&Partition::whole(10, 10)));
    }
}
