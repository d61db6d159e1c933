//! Dense real vector used by the neural network core.

use core::fmt;
use core::ops::{Index, IndexMut};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fixed-length real vector, zero-initialized by [`DefaultVec::new`]. Binary
/// arithmetic requires equal dimensions and returns
/// [`Error::DimensionMismatch`] otherwise; nothing is truncated or padded.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultVec {
    values: Vec<f64>,
}

impl fmt::Debug for DefaultVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values.iter()).finish()
    }
}

impl DefaultVec {
    /// Zero vector of `dimension` elements.
    pub fn new(dimension: usize) -> Self {
        Self {
            values: vec![0.0; dimension],
        }
    }

    pub fn from_vec(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Uniform random vector in `[-bound, bound]`.
    pub fn random<R: Rng + ?Sized>(dimension: usize, bound: f64, rng: &mut R) -> Self {
        let values = (0..dimension)
            .map(|_| if bound > 0.0 { rng.gen_range(-bound..=bound) } else { 0.0 })
            .collect();
        Self { values }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn get(&self, i: usize) -> Option<f64> {
        self.values.get(i).copied()
    }

    /// Sets element `i`; out-of-range indices are reported, not ignored.
    pub fn set(&mut self, i: usize, v: f64) -> Result<()> {
        let dim = self.dimension();
        let slot = self.values.get_mut(i).ok_or(Error::dimension(dim, i + 1))?;
        *slot = v;
        Ok(())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }

    pub fn fill(&mut self, v: f64) {
        self.values.iter_mut().for_each(|x| *x = v);
    }

    /// Copies `src` into `self`.
    pub fn copy_from(&mut self, src: &DefaultVec) -> Result<()> {
        self.check(src)?;
        self.values.copy_from_slice(&src.values);
        Ok(())
    }

    fn check(&self, other: &DefaultVec) -> Result<()> {
        if self.dimension() != other.dimension() {
            return Err(Error::dimension(self.dimension(), other.dimension()));
        }
        Ok(())
    }

    pub fn plus(&self, other: &DefaultVec) -> Result<DefaultVec> {
        self.check(other)?;
        Ok(self.zip_map(other, |a, b| a + b))
    }

    pub fn minus(&self, other: &DefaultVec) -> Result<DefaultVec> {
        self.check(other)?;
        Ok(self.zip_map(other, |a, b| a - b))
    }

    pub fn inner_product(&self, other: &DefaultVec) -> Result<f64> {
        self.check(other)?;
        Ok(self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a * b)
            .sum())
    }

    /// `self += other`.
    pub fn add_assign(&mut self, other: &DefaultVec) -> Result<()> {
        self.check(other)?;
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a += b;
        }
        Ok(())
    }

    pub fn scale(&mut self, k: f64) {
        self.values.iter_mut().for_each(|x| *x *= k);
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn norm1(&self) -> f64 {
        self.values.iter().map(|x| x.abs()).sum()
    }

    pub fn norm2(&self) -> f64 {
        self.values.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    /// Euclidean distance.
    pub fn metric(&self, other: &DefaultVec) -> Result<f64> {
        Ok(self.minus(other)?.norm2())
    }

    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.values.iter()
    }

    fn zip_map(&self, other: &DefaultVec, f: impl Fn(f64, f64) -> f64) -> DefaultVec {
        DefaultVec {
            values: self
                .values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| f(*a, *b))
                .collect(),
        }
    }
}

impl From<Vec<f64>> for DefaultVec {
    fn from(values: Vec<f64>) -> Self {
        Self::from_vec(values)
    }
}

impl From<&[f64]> for DefaultVec {
    fn from(values: &[f64]) -> Self {
        Self::from_vec(values.to_vec())
    }
}

impl Index<usize> for DefaultVec {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.values[i]
    }
}

impl IndexMut<usize> for DefaultVec {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.values[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn arithmetic_on_equal_dimensions() {
        let a = DefaultVec::from(vec![1.0, 2.0, 3.0]);
        let b = DefaultVec::from(vec![4.0, 5.0, 6.0]);
        assert_eq!(a.plus(&b).unwrap().as_slice(), &[5.0, 7.0, 9.0]);
        assert_eq!(b.minus(&a).unwrap().as_slice(), &[3.0, 3.0, 3.0]);
        assert_eq!(a.inner_product(&b).unwrap(), 32.0);
        assert!((a.metric(&b).unwrap() - 27f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn mismatched_dimensions_fail_fast() {
        let a = DefaultVec::new(3);
        let b = DefaultVec::new(4);
        let err = Error::DimensionMismatch {
            expected: 3,
            actual: 4,
        };
        assert_eq!(a.plus(&b).unwrap_err(), err);
        assert_eq!(a.minus(&b).unwrap_err(), err);
        assert_eq!(a.inner_product(&b).unwrap_err(), err);
        let mut c = a.clone();
        assert!(c.add_assign(&b).is_err());
        assert_eq!(c, a);
        assert!(c.set(3, 1.0).is_err());
    }

    #[test]
    fn new_is_zeroed_and_never_grows() {
        let mut v = DefaultVec::new(3);
        assert_eq!(v.as_slice(), &[0.0, 0.0, 0.0]);
        assert_eq!(v.get(3), None);
        assert_eq!(
            v.set(5, 1.0).unwrap_err(),
            Error::DimensionMismatch {
                expected: 3,
                actual: 6,
            }
        );
        assert_eq!(v.dimension(), 3);
    }

    #[test]
    fn random_stays_in_bound() {
        let mut rng = StdRng::seed_from_u64(7);
        let v = DefaultVec::random(500, 0.25, &mut rng);
        assert_eq!(v.dimension(), 500);
        assert!(v.iter().all(|x| (-0.25..=0.25).contains(x)));
        assert!(v.max() > 0.0 && v.min() < 0.0);
    }
}
