use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Activation, Layer, LearnerConfig, TrainingSet};
use crate::error::{Error, Result};

/// Layer widths and activations of a [`Network`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub inputs: usize,
    pub hidden: Vec<usize>,
    pub outputs: usize,
    pub hidden_activation: Activation,
    pub output_activation: Activation,
    /// Seed for weight initialization.
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            inputs: 1,
            hidden: vec![4],
            outputs: 1,
            hidden_activation: Activation::Sigmoid,
            output_activation: Activation::Sigmoid,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingMode {
    /// Shuffle every epoch and adapt after each point.
    #[default]
    Serial,
    /// Accumulate every point's gradient and adapt once per epoch.
    Batch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub mode: TrainingMode,
    pub max_epochs: usize,
    /// Training stops once the mean error per point drops below this.
    pub target_error: f64,
    pub learner: LearnerConfig,
    /// Seed for the point order in serial mode.
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            mode: TrainingMode::Serial,
            max_epochs: 1000,
            target_error: 1e-3,
            learner: LearnerConfig::default(),
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingReport {
    pub epochs: usize,
    /// Mean of `½ Σ (expected - output)²` over the points of the last epoch.
    pub mean_error: f64,
    pub converged: bool,
}

/// Feed-forward multilayer perceptron trained by backpropagation.
#[derive(Debug, Clone)]
pub struct Network {
    inputs: usize,
    layers: Vec<Layer>,
}

impl Network {
    pub fn new(cfg: &NetworkConfig) -> Result<Self> {
        if cfg.inputs == 0 || cfg.outputs == 0 || cfg.hidden.iter().any(|w| *w == 0) {
            return Err(Error::Config(format!("layer widths must be positive: {cfg:?}")));
        }
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut layers = Vec::with_capacity(cfg.hidden.len() + 1);
        let mut upstream = cfg.inputs;
        for &width in &cfg.hidden {
            layers.push(Layer::new(width, upstream, cfg.hidden_activation, &mut rng));
            upstream = width;
        }
        layers.push(Layer::new(cfg.outputs, upstream, cfg.output_activation, &mut rng));
        Ok(Self {
            inputs: cfg.inputs,
            layers,
        })
    }

    pub fn input_dimension(&self) -> usize {
        self.inputs
    }

    pub fn output_dimension(&self) -> usize {
        self.layers.last().map_or(0, Layer::width)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn predict(&mut self, input: &[f64]) -> Result<Vec<f64>> {
        let Some((first, rest)) = self.layers.split_first_mut() else {
            return Ok(Vec::new());
        };
        first.feed(input)?;
        let mut prev: &Layer = first;
        for layer in rest {
            prev.propagate_to_next_layer(layer)?;
            prev = layer;
        }
        Ok(prev.outputs())
    }

    /// Computes deltas for the last prediction against `expected` and adds
    /// the gradients to every neuron's accumulator. Returns the point error.
    pub fn backpropagate(&mut self, expected: &[f64]) -> Result<f64> {
        let Some(last) = self.layers.last_mut() else {
            return Ok(0.0);
        };
        let error = last.compute_output_deltas(expected)?;
        for i in (0..self.layers.len() - 1).rev() {
            let (head, tail) = self.layers.split_at_mut(i + 1);
            head[i].compute_hidden_deltas(&tail[0]);
        }
        self.layers.iter_mut().for_each(Layer::accumulate_gradients);
        Ok(error)
    }

    pub fn train(&mut self, set: &TrainingSet, cfg: &TrainingConfig) -> Result<TrainingReport> {
        if set.is_empty() {
            return Err(Error::InvalidTrainingData("empty training set".to_string()));
        }
        if set.input_dimension() != self.input_dimension() {
            return Err(Error::dimension(self.input_dimension(), set.input_dimension()));
        }
        if set.output_dimension() != self.output_dimension() {
            return Err(Error::dimension(self.output_dimension(), set.output_dimension()));
        }

        let mut learner = cfg.learner.build();
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut order: Vec<usize> = (0..set.len()).collect();
        let points = set.points();
        let mut report = TrainingReport {
            epochs: 0,
            mean_error: f64::INFINITY,
            converged: false,
        };

        for epoch in 1..=cfg.max_epochs {
            let mut total = 0.0;
            match cfg.mode {
                TrainingMode::Serial => {
                    order.shuffle(&mut rng);
                    for &i in &order {
                        self.predict(&points[i].input)?;
                        total += self.backpropagate(&points[i].output)?;
                        learner.adapt(&mut self.layers);
                    }
                }
                TrainingMode::Batch => {
                    for p in points {
                        self.predict(&p.input)?;
                        total += self.backpropagate(&p.output)?;
                    }
                    learner.adapt(&mut self.layers);
                }
            }
            report.epochs = epoch;
            report.mean_error = total / set.len() as f64;
            if epoch % 100 == 0 {
                debug!(epoch, mean_error = report.mean_error, "training");
            }
            if report.mean_error < cfg.target_error {
                report.converged = true;
                break;
            }
        }
        info!(
            epochs = report.epochs,
            mean_error = report.mean_error,
            converged = report.converged,
            "training finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::TrainingPoint;

    fn xor() -> TrainingSet {
        TrainingSet::from_points(
            [(0.0, 0.0, 0.0), (0.0, 1.0, 1.0), (1.0, 0.0, 1.0), (1.0, 1.0, 0.0)]
                .into_iter()
                .map(|(a, b, y)| TrainingPoint::new(vec![a, b], vec![y]))
                .collect(),
        )
        .unwrap()
    }

    fn net() -> Network {
        Network::new(&NetworkConfig {
            inputs: 2,
            hidden: vec![3],
            outputs: 1,
            ..NetworkConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn topology_and_bounds() {
        let n = net();
        assert_eq!(n.layers().len(), 2);
        assert_eq!(n.layers()[0].neurons()[0].input_dimension(), 3);
        assert_eq!(n.layers()[1].neurons()[0].input_dimension(), 4);
        let bound = 1.0 / 3f64.sqrt();
        assert!(n.layers()[0]
            .neurons()
            .iter()
            .all(|x| x.weights().iter().all(|w| w.abs() <= bound)));
        assert!(Network::new(&NetworkConfig {
            hidden: vec![0],
            ..NetworkConfig::default()
        })
        .is_err());
    }

    #[test]
    fn same_seed_same_network() {
        let mut a = net();
        let mut b = net();
        assert_eq!(a.predict(&[0.3, 0.7]).unwrap(), b.predict(&[0.3, 0.7]).unwrap());
    }

    #[test]
    fn batch_training_lowers_the_error() {
        let set = xor();
        let mut n = net();
        let short = TrainingConfig {
            mode: TrainingMode::Batch,
            max_epochs: 1,
            target_error: 0.0,
            ..TrainingConfig::default()
        };
        let first = n.train(&set, &short).unwrap();
        let long = TrainingConfig {
            max_epochs: 2000,
            ..short.clone()
        };
        let last = n.train(&set, &long).unwrap();
        assert_eq!(last.epochs, 2000);
        assert!(!last.converged);
        assert!(last.mean_error < first.mean_error);
        // gradients are consumed by every adapt
        assert!(n.layers().iter().all(|l| l
            .neurons()
            .iter()
            .all(|x| x.gradient().iter().all(|g| *g == 0.0))));
    }

    #[test]
    fn serial_training_fits_a_line() {
        let set = TrainingSet::from_points(
            (0..10)
                .map(|i| {
                    let x = i as f64 / 10.0;
                    TrainingPoint::new(vec![x], vec![0.2 + 0.5 * x])
                })
                .collect(),
        )
        .unwrap();
        let mut n = Network::new(&NetworkConfig {
            inputs: 1,
            hidden: vec![],
            outputs: 1,
            output_activation: Activation::Linear,
            ..NetworkConfig::default()
        })
        .unwrap();
        let report = n
            .train(
                &set,
                &TrainingConfig {
                    learner: LearnerConfig::Momentum {
                        learning_rate: 0.1,
                        momentum: 0.5,
                    },
                    target_error: 1e-6,
                    max_epochs: 5000,
                    ..TrainingConfig::default()
                },
            )
            .unwrap();
        assert!(report.converged);
        assert!((n.predict(&[0.5]).unwrap()[0] - 0.45).abs() < 0.01);
    }

    #[test]
    fn mismatched_set_is_rejected() {
        let set = TrainingSet::from_points(vec![TrainingPoint::new(vec![1.0], vec![1.0])]).unwrap();
        assert!(matches!(
            net().train(&set, &TrainingConfig::default()),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(matches!(
            net().train(&TrainingSet::new(), &TrainingConfig::default()),
            Err(Error::InvalidTrainingData(_))
        ));
    }
}
