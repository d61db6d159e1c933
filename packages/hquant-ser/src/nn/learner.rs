use core::fmt::Debug;

use serde::{Deserialize, Serialize};

use super::Layer;
use crate::vec::DefaultVec;

/// Applies accumulated gradients to the weights, then zeroes them.
pub trait Learner: Debug + Send {
    fn adapt(&mut self, layers: &mut [Layer]);
}

fn state_for(layers: &[Layer], fill: f64) -> Vec<Vec<DefaultVec>> {
    layers
        .iter()
        .map(|l| {
            l.neurons()
                .iter()
                .map(|n| {
                    let mut v = DefaultVec::new(n.input_dimension());
                    v.fill(fill);
                    v
                })
                .collect()
        })
        .collect()
}

/// `Δw = lr · gradient + momentum · Δw_prev`.
#[derive(Debug, Clone)]
pub struct Momentum {
    learning_rate: f64,
    momentum: f64,
    prev: Vec<Vec<DefaultVec>>,
}

impl Momentum {
    pub fn new(learning_rate: f64, momentum: f64) -> Self {
        Self {
            learning_rate,
            momentum,
            prev: Vec::new(),
        }
    }
}

impl Learner for Momentum {
    fn adapt(&mut self, layers: &mut [Layer]) {
        if self.prev.len() != layers.len() {
            self.prev = state_for(layers, 0.0);
        }
        for (layer, prev) in layers.iter_mut().zip(&mut self.prev) {
            for (n, prev) in layer.neurons_mut().iter_mut().zip(prev.iter_mut()) {
                let grad = n.gradient().clone();
                let w = n.weights_mut().as_mut_slice();
                for i in 0..w.len() {
                    let dw = self.learning_rate * grad[i] + self.momentum * prev[i];
                    w[i] += dw;
                    prev[i] = dw;
                }
                n.reset_gradient();
            }
        }
    }
}

pub const RPROP_INCREASE: f64 = 1.2;
pub const RPROP_DECREASE: f64 = 0.5;
pub const RPROP_INITIAL_STEP: f64 = 0.1;
pub const RPROP_MAX_STEP: f64 = 50.0;
pub const RPROP_MIN_STEP: f64 = 1e-6;

/// Resilient propagation: per-weight step sizes driven by the sign of the
/// gradient only.
#[derive(Debug, Clone, Default)]
pub struct Rprop {
    steps: Vec<Vec<DefaultVec>>,
    prev_grad: Vec<Vec<DefaultVec>>,
}

impl Rprop {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Learner for Rprop {
    fn adapt(&mut self, layers: &mut [Layer]) {
        if self.steps.len() != layers.len() {
            self.steps = state_for(layers, RPROP_INITIAL_STEP);
            self.prev_grad = state_for(layers, 0.0);
        }
        for ((layer, steps), prevs) in layers.iter_mut().zip(&mut self.steps).zip(&mut self.prev_grad) {
            for ((n, step), prev) in layer.neurons_mut().iter_mut().zip(steps.iter_mut()).zip(prevs.iter_mut()) {
                let grad = n.gradient().clone();
                let w = n.weights_mut().as_mut_slice();
                for i in 0..w.len() {
                    let g = grad[i];
                    let sign = g * prev[i];
                    if sign > 0.0 {
                        step[i] = (step[i] * RPROP_INCREASE).min(RPROP_MAX_STEP);
                    } else if sign < 0.0 {
                        step[i] = (step[i] * RPROP_DECREASE).max(RPROP_MIN_STEP);
                        // skip this update, forget the sign
                        prev[i] = 0.0;
                        continue;
                    }
                    if g != 0.0 {
                        w[i] += g.signum() * step[i];
                    }
                    prev[i] = g;
                }
                n.reset_gradient();
            }
        }
    }
}

/// Serializable learner choice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LearnerConfig {
    Momentum { learning_rate: f64, momentum: f64 },
    Rprop,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        LearnerConfig::Momentum {
            learning_rate: 0.25,
            momentum: 0.9,
        }
    }
}

impl LearnerConfig {
    pub fn build(&self) -> Box<dyn Learner> {
        match *self {
            LearnerConfig::Momentum {
                learning_rate,
                momentum,
            } => Box::new(Momentum::new(learning_rate, momentum)),
            LearnerConfig::Rprop => Box::new(Rprop::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::Activation;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn single_neuron(weights: &[f64], delta: f64, input: &[f64]) -> Vec<Layer> {
        let mut rng = StdRng::seed_from_u64(0);
        let mut layer = Layer::new(1, input.len(), Activation::Linear, &mut rng);
        let n = &mut layer.neurons_mut()[0];
        n.weights_mut()
            .copy_from(&DefaultVec::from_vec(weights.to_vec()))
            .unwrap();
        n.set_input(input).unwrap();
        n.set_delta(delta);
        n.accumulate_gradient();
        vec![layer]
    }

    #[test]
    fn momentum_carries_previous_step() {
        let mut layers = single_neuron(&[0.0, 0.0], 1.0, &[2.0]);
        let mut m = Momentum::new(0.5, 0.5);
        m.adapt(&mut layers);
        // gradient = [-1, 2]
        assert_eq!(layers[0].neurons()[0].weights().as_slice(), &[-0.5, 1.0]);
        assert!(layers[0].neurons()[0].gradient().iter().all(|g| *g == 0.0));

        layers[0].neurons_mut()[0].accumulate_gradient();
        m.adapt(&mut layers);
        assert_eq!(layers[0].neurons()[0].weights().as_slice(), &[-1.25, 2.5]);
    }

    #[test]
    fn rprop_grows_and_backs_off() {
        let mut layers = single_neuron(&[0.0, 0.0], 1.0, &[2.0]);
        let mut r = Rprop::new();
        r.adapt(&mut layers);
        assert_eq!(layers[0].neurons()[0].weights().as_slice(), &[-0.1, 0.1]);

        layers[0].neurons_mut()[0].accumulate_gradient();
        r.adapt(&mut layers);
        let w = layers[0].neurons()[0].weights().as_slice().to_vec();
        assert!((w[1] - (0.1 + 0.12)).abs() < 1e-12);

        let n = &mut layers[0].neurons_mut()[0];
        n.set_delta(-1.0);
        n.accumulate_gradient();
        r.adapt(&mut layers);
        assert_eq!(layers[0].neurons()[0].weights().as_slice(), w.as_slice());
    }
}
