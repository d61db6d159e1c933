use rand::Rng;

use super::Activation;
use crate::error::{Error, Result};
use crate::vec::DefaultVec;

/// Value fed to every neuron at input index 0.
pub const BIAS_INPUT: f64 = -1.0;

/// Perceptron with a bias input at index 0.
///
/// The input dimension is the upstream width plus one; weight `j + 1`
/// belongs to upstream neuron `j`.
#[derive(Debug, Clone)]
pub struct Neuron {
    weights: DefaultVec,
    input: DefaultVec,
    gradient: DefaultVec,
    activation: Activation,
    net: f64,
    output: f64,
    delta: f64,
}

impl Neuron {
    /// Weights are drawn uniformly from `±1/sqrt(input dimension)`.
    pub fn new<R: Rng + ?Sized>(upstream: usize, activation: Activation, rng: &mut R) -> Self {
        let dim = upstream + 1;
        let bound = 1.0 / (dim as f64).sqrt();
        let mut input = DefaultVec::new(dim);
        input[0] = BIAS_INPUT;
        Self {
            weights: DefaultVec::random(dim, bound, rng),
            input,
            gradient: DefaultVec::new(dim),
            activation,
            net: 0.0,
            output: 0.0,
            delta: 0.0,
        }
    }

    pub fn input_dimension(&self) -> usize {
        self.weights.dimension()
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn weights(&self) -> &DefaultVec {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut DefaultVec {
        &mut self.weights
    }

    /// Weight applied to `input[i]`.
    #[inline]
    pub fn weight(&self, i: usize) -> f64 {
        self.weights.get(i).unwrap_or(0.0)
    }

    pub fn input(&self) -> &DefaultVec {
        &self.input
    }

    pub fn net(&self) -> f64 {
        self.net
    }

    pub fn output(&self) -> f64 {
        self.output
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn set_delta(&mut self, delta: f64) {
        self.delta = delta;
    }

    /// Loads the upstream outputs behind the bias slot.
    pub fn set_input(&mut self, upstream: &[f64]) -> Result<()> {
        let dim = self.input_dimension();
        if upstream.len() + 1 != dim {
            return Err(Error::dimension(dim - 1, upstream.len()));
        }
        self.input.as_mut_slice()[1..].copy_from_slice(upstream);
        Ok(())
    }

    /// `output = f(weights · input)`.
    pub fn activate(&mut self) -> Result<f64> {
        self.net = self.weights.inner_product(&self.input)?;
        self.output = self.activation.apply(self.net);
        Ok(self.output)
    }

    pub fn slope(&self) -> f64 {
        self.activation.derivative(self.net)
    }

    /// Adds `input * delta` to the accumulated gradient.
    pub fn accumulate_gradient(&mut self) {
        let delta = self.delta;
        for (g, x) in self.gradient.as_mut_slice().iter_mut().zip(self.input.iter()) {
            *g += x * delta;
        }
    }

    pub fn gradient(&self) -> &DefaultVec {
        &self.gradient
    }

    pub fn reset_gradient(&mut self) {
        self.gradient.fill(0.0);
    }
}
