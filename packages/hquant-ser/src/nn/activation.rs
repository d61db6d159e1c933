use serde::{Deserialize, Serialize};

/// Neuron nonlinearity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Sigmoid,
    Tanh,
    Linear,
}

impl Activation {
    #[inline]
    pub fn apply(self, net: f64) -> f64 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-net).exp()),
            Activation::Tanh => net.tanh(),
            Activation::Linear => net,
        }
    }

    /// `f'(net)`.
    #[inline]
    pub fn derivative(self, net: f64) -> f64 {
        match self {
            Activation::Sigmoid => {
                let s = self.apply(net);
                s * (1.0 - s)
            }
            Activation::Tanh => {
                let t = net.tanh();
                1.0 - t * t
            }
            Activation::Linear => 1.0,
        }
    }
}
