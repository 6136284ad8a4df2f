//! Q-network: a fixed three-layer fully-connected shape parameterized
//! by action cardinality `P` — input `2P+1`, hidden `P`, hidden `2P`,
//! output `P`, ReLU after the first two layers only. Implemented with
//! `burn` (`NdArray` + `Autodiff`), the real tensor/autodiff crate this
//! pack reaches for rather than hand-rolled matrix math (see DESIGN.md).

use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Relu};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use qplan_core::{Error, Result};
use std::path::Path;

#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    activation: Relu,
}

impl<B: Backend> QNetwork<B> {
    /// `num_plans` is the action cardinality `P` for whichever environment
    /// variant this network is trained against.
    pub fn new(device: &B::Device, num_plans: usize) -> Self {
        let input = 2 * num_plans + 1;
        let hidden1 = num_plans;
        let hidden2 = 2 * num_plans;
        let output = num_plans;
        Self {
            fc1: LinearConfig::new(input, hidden1).init(device),
            fc2: LinearConfig::new(hidden1, hidden2).init(device),
            fc3: LinearConfig::new(hidden2, output).init(device),
            activation: Relu::new(),
        }
    }

    /// `input` is `[batch, 2P+1]`; returns `[batch, P]` Q-values, one per
    /// action.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.activation.forward(self.fc1.forward(input));
        let x = self.activation.forward(self.fc2.forward(x));
        self.fc3.forward(x)
    }

    /// Single-state convenience wrapper: `state` is the flattened `2P+1`
    /// state tensor; returns `P` Q-values as plain floats for the agent.
    pub fn forward_one(&self, device: &B::Device, state: &[f64]) -> Vec<f32> {
        let data: Vec<f32> = state.iter().map(|&x| x as f32).collect();
        let width = data.len();
        let tensor = Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([1, width]);
        let q = self.forward(tensor);
        q.into_data().convert::<f32>().to_vec().unwrap()
    }

    pub fn save(&self, path: &Path) -> Result<()>
    where
        Self: Clone,
    {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.clone()
            .save_file(path, &recorder)
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn load(self, path: &Path, device: &B::Device) -> Result<Self> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.load_file(path, &recorder, device)
            .map_err(|e| Error::Serialization(e.to_string()))
    }
}
