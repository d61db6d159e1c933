use crate::error::{Error, Result};

/// Strictly increasing occurred times; position = row index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timestamps {
    times: Vec<i64>,
}

impl Timestamps {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    #[inline]
    pub fn get(&self, row: usize) -> Option<i64> {
        self.times.get(row).copied()
    }

    pub fn first(&self) -> Option<i64> {
        self.times.first().copied()
    }

    pub fn last(&self) -> Option<i64> {
        self.times.last().copied()
    }

    /// `Ok(row)` on an exact hit, `Err(insertion_point)` otherwise.
    #[inline]
    pub fn index_of(&self, time: i64) -> std::result::Result<usize, usize> {
        self.times.binary_search(&time)
    }

    /// Last row whose time is `<= time`.
    pub fn floor_row(&self, time: i64) -> Option<usize> {
        match self.index_of(time) {
            Ok(row) => Some(row),
            Err(0) => None,
            Err(pos) => Some(pos - 1),
        }
    }

    /// First row whose time is `>= time`.
    pub fn ceil_row(&self, time: i64) -> Option<usize> {
        let pos = self.index_of(time).unwrap_or_else(|pos| pos);
        (pos < self.times.len()).then_some(pos)
    }

    /// Appends `time`, which must be greater than the last stored time.
    pub fn push(&mut self, time: i64) -> Result<usize> {
        if let Some(last) = self.last() {
            if time <= last {
                return Err(Error::NonMonotonicTime { time, last });
            }
        }
        self.times.push(time);
        Ok(self.times.len() - 1)
    }

    pub fn truncate(&mut self, len: usize) {
        self.times.truncate(len);
    }

    pub fn clear(&mut self) {
        self.times.clear();
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.times
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.times.iter().copied()
    }
}
