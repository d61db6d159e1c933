use core::fmt;

/// Float-like column aligned to a series' row index.
///
/// - Rows are created with the `fill` value (NaN for float columns).
/// - SoA layout: each Var stores its own column.
#[derive(Clone, PartialEq)]
pub(crate) struct Column<T: Copy> {
    fill: T,
    data: Vec<T>,
}

impl<T: Copy> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl<T: Copy> Column<T> {
    pub fn with_len(len: usize, fill: T) -> Self {
        Self {
            fill,
            data: vec![fill; len],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn get(&self, row: usize) -> Option<T> {
        self.data.get(row).copied()
    }

    /// Writes `v` at `row`; returns false when `row` is out of range.
    #[inline]
    pub fn set(&mut self, row: usize, v: T) -> bool {
        match self.data.get_mut(row) {
            Some(slot) => {
                *slot = v;
                true
            }
            None => false,
        }
    }

    /// Resets one row to the fill value.
    #[inline]
    pub fn reset(&mut self, row: usize) {
        let fill = self.fill;
        self.set(row, fill);
    }

    /// Grows (with fill) or shrinks to exactly `len` rows.
    pub fn resize(&mut self, len: usize) {
        self.data.resize(len, self.fill);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::Column;

    #[test]
    fn grows_with_fill_and_resets_rows() {
        let mut c = Column::with_len(2, f64::NAN);
        assert!(c.set(0, 1.0));
        assert!(c.set(1, 2.0));
        c.resize(4);
        assert_eq!(c.len(), 4);
        assert!(c.get(3).unwrap().is_nan());
        assert_eq!(c.get(4), None);
        assert!(c.set(3, 4.0));
        assert!(!c.set(9, 4.0));
        c.reset(0);
        assert!(c.get(0).unwrap().is_nan());
        c.resize(2);
        assert_eq!(c.as_slice()[1], 2.0);
    }
}
