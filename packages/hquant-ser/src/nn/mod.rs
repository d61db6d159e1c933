//! Feed-forward multilayer perceptron used as an auxiliary predictor.

mod activation;
mod data;
mod layer;
mod learner;
mod network;
mod neuron;

pub use activation::Activation;
pub use data::{Normalizer, TrainingPoint, TrainingSet};
pub use layer::Layer;
pub use learner::{Learner, LearnerConfig, Momentum, Rprop};
pub use network::{Network, NetworkConfig, TrainingConfig, TrainingMode, TrainingReport};
pub use neuron::{Neuron, BIAS_INPUT};
