use rand::Rng;

use super::{Activation, Neuron};
use crate::error::{Error, Result};

/// One fully connected layer.
#[derive(Debug, Clone)]
pub struct Layer {
    neurons: Vec<Neuron>,
}

impl Layer {
    pub fn new<R: Rng + ?Sized>(width: usize, upstream: usize, activation: Activation, rng: &mut R) -> Self {
        Self {
            neurons: (0..width).map(|_| Neuron::new(upstream, activation, rng)).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.neurons.len()
    }

    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    pub fn neurons_mut(&mut self) -> &mut [Neuron] {
        &mut self.neurons
    }

    pub fn outputs(&self) -> Vec<f64> {
        self.neurons.iter().map(Neuron::output).collect()
    }

    /// Activates every neuron on `input`.
    pub fn feed(&mut self, input: &[f64]) -> Result<()> {
        for n in &mut self.neurons {
            n.set_input(input)?;
            n.activate()?;
        }
        Ok(())
    }

    /// Feeds this layer's outputs into `next`.
    pub fn propagate_to_next_layer(&self, next: &mut Layer) -> Result<()> {
        next.feed(&self.outputs())
    }

    /// `delta = (expected - output) * f'(net)`; returns `½ Σ (expected - output)²`.
    pub fn compute_output_deltas(&mut self, expected: &[f64]) -> Result<f64> {
        if expected.len() != self.width() {
            return Err(Error::dimension(self.width(), expected.len()));
        }
        let mut error = 0.0;
        for (n, &e) in self.neurons.iter_mut().zip(expected) {
            let diff = e - n.output();
            n.set_delta(diff * n.slope());
            error += 0.5 * diff * diff;
        }
        Ok(error)
    }

    /// `delta_j = (Σ_k w_k[j + 1] · delta_k) * f'(net_j)` over the neurons
    /// `k` of `next`; index 0 of their weights is the bias.
    pub fn compute_hidden_deltas(&mut self, next: &Layer) {
        for (j, n) in self.neurons.iter_mut().enumerate() {
            let sum: f64 = next
                .neurons
                .iter()
                .map(|k| k.weight(j + 1) * k.delta())
                .sum();
            n.set_delta(sum * n.slope());
        }
    }

    pub fn accumulate_gradients(&mut self) {
        self.neurons.iter_mut().for_each(Neuron::accumulate_gradient);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec::DefaultVec;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixed(width: usize, upstream: usize, weights: &[f64]) -> Layer {
        let mut rng = StdRng::seed_from_u64(0);
        let mut layer = Layer::new(width, upstream, Activation::Linear, &mut rng);
        for n in layer.neurons_mut() {
            n.weights_mut()
                .copy_from(&DefaultVec::from_vec(weights.to_vec()))
                .unwrap();
        }
        layer
    }

    #[test]
    fn hidden_deltas_skip_the_bias_weight() {
        let mut hidden = fixed(2, 1, &[0.0, 1.0]);
        let mut out = fixed(1, 2, &[100.0, 2.0, 3.0]);
        hidden.feed(&[1.0]).unwrap();
        hidden.propagate_to_next_layer(&mut out).unwrap();
        assert_eq!(out.outputs(), vec![-100.0 + 2.0 + 3.0]);

        let err = out.compute_output_deltas(&[-94.0]).unwrap();
        assert_eq!(err, 0.5);
        assert_eq!(out.neurons()[0].delta(), 1.0);

        hidden.compute_hidden_deltas(&out);
        assert_eq!(hidden.neurons()[0].delta(), 2.0);
        assert_eq!(hidden.neurons()[1].delta(), 3.0);
    }
}
