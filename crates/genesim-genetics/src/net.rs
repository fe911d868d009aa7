//! The feed-forward behaviour network: three fully connected layers with no
//! biases, tanh activation by default.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::vector;

/// Activation function applied by every layer of a behaviour network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    #[default]
    Tanh,
    Sigmoid,
}

impl Activation {
    fn apply(self, values: &mut [f32]) {
        match self {
            Self::Tanh => {
                for value in values {
                    *value = value.tanh();
                }
            }
            Self::Sigmoid => {
                for value in values {
                    *value = 1.0 / (1.0 + (-*value).exp());
                }
            }
        }
    }
}

/// One fully connected layer plus its activation scratch space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetLayer {
    inputs: usize,
    units: usize,
    activation: Activation,
    weights: Vec<f32>,
    activations: Vec<f32>,
}

impl NetLayer {
    #[must_use]
    pub fn new(inputs: usize, units: usize, activation: Activation) -> Self {
        Self {
            inputs,
            units,
            activation,
            weights: vec![0.0; inputs * units],
            activations: vec![0.0; units],
        }
    }

    /// Product of the input row against the weight matrix, then the
    /// activation. The returned slice is scratch space owned by the layer and
    /// must not be retained across the next forward pass.
    pub fn forward(&mut self, input: &[f32]) -> &[f32] {
        self.activations.fill(0.0);
        for (k, x) in input.iter().enumerate().take(self.inputs) {
            let row = &self.weights[k * self.units..(k + 1) * self.units];
            for (j, weight) in row.iter().enumerate() {
                self.activations[j] += x * weight;
            }
        }
        self.activation.apply(&mut self.activations);
        &self.activations
    }

    /// Draw fresh weights from `U(-range / range_bias, range)`. `range` is
    /// floored at 0.1 and `range_bias` at 1.0.
    pub fn randomize(&mut self, range: f32, range_bias: f32, rng: &mut dyn RngCore) {
        let range = range.max(0.1);
        let range_bias = range_bias.max(1.0);
        vector::randomize_uniform(&mut self.weights, -range / range_bias, range, rng);
    }

    /// Rebuild the weights by combining two parent layers and mutating.
    pub fn combine_from(
        &mut self,
        parent1: &Self,
        parent2: &Self,
        mutation_prob: f32,
        mutation_sigma: f32,
        rng: &mut dyn RngCore,
    ) {
        vector::combine_and_mutate_random(
            &mut self.weights,
            &parent1.weights,
            &parent2.weights,
            mutation_prob,
            mutation_sigma,
            rng,
        );
    }

    /// Rebuild the weights by copying a single parent layer and mutating.
    pub fn inherit_from(
        &mut self,
        parent: &Self,
        mutation_prob: f32,
        mutation_sigma: f32,
        rng: &mut dyn RngCore,
    ) {
        self.weights.copy_from_slice(&parent.weights);
        vector::mutate(&mut self.weights, mutation_prob, mutation_sigma, rng);
    }

    /// Blend a donor layer's weights into this one.
    pub fn transfer_from(&mut self, donor: &Self, donor_weighting: f32) {
        vector::blend(&mut self.weights, &donor.weights, donor_weighting);
    }

    #[must_use]
    pub fn units(&self) -> usize {
        self.units
    }

    #[must_use]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }
}

/// Three layers composed `output(layer2(layer1(input)))`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviourNet {
    layer1: NetLayer,
    layer2: NetLayer,
    output: NetLayer,
}

impl BehaviourNet {
    #[must_use]
    pub fn new(
        inputs: usize,
        hidden1: usize,
        hidden2: usize,
        outputs: usize,
        activation: Activation,
    ) -> Self {
        Self {
            layer1: NetLayer::new(inputs, hidden1, activation),
            layer2: NetLayer::new(hidden1, hidden2, activation),
            output: NetLayer::new(hidden2, outputs, activation),
        }
    }

    /// Full forward pass. The returned slice is the output layer's scratch
    /// space and is overwritten by the next pass.
    pub fn forward(&mut self, input: &[f32]) -> &[f32] {
        let hidden1 = self.layer1.forward(input);
        let hidden2 = self.layer2.forward(hidden1);
        self.output.forward(hidden2)
    }

    pub fn randomize(&mut self, range: f32, range_bias: f32, rng: &mut dyn RngCore) {
        self.layer1.randomize(range, range_bias, rng);
        self.layer2.randomize(range, range_bias, rng);
        self.output.randomize(range, range_bias, rng);
    }

    pub fn combine_from(
        &mut self,
        parent1: &Self,
        parent2: &Self,
        mutation_prob: f32,
        mutation_sigma: f32,
        rng: &mut dyn RngCore,
    ) {
        self.layer1.combine_from(
            &parent1.layer1,
            &parent2.layer1,
            mutation_prob,
            mutation_sigma,
            rng,
        );
        self.layer2.combine_from(
            &parent1.layer2,
            &parent2.layer2,
            mutation_prob,
            mutation_sigma,
            rng,
        );
        self.output.combine_from(
            &parent1.output,
            &parent2.output,
            mutation_prob,
            mutation_sigma,
            rng,
        );
    }

    pub fn inherit_from(
        &mut self,
        parent: &Self,
        mutation_prob: f32,
        mutation_sigma: f32,
        rng: &mut dyn RngCore,
    ) {
        self.layer1
            .inherit_from(&parent.layer1, mutation_prob, mutation_sigma, rng);
        self.layer2
            .inherit_from(&parent.layer2, mutation_prob, mutation_sigma, rng);
        self.output
            .inherit_from(&parent.output, mutation_prob, mutation_sigma, rng);
    }

    pub fn transfer_from(&mut self, donor: &Self, donor_weighting: f32) {
        self.layer1.transfer_from(&donor.layer1, donor_weighting);
        self.layer2.transfer_from(&donor.layer2, donor_weighting);
        self.output.transfer_from(&donor.output, donor_weighting);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn zero_weight_forward_pass_yields_zero_activations() {
        let mut net = BehaviourNet::new(7, 16, 8, 2, Activation::Tanh);
        let outputs = net.forward(&[0.4, -0.2, 1.0, -1.0, 0.0, 0.7, 0.1]);
        assert_eq!(outputs, &[0.0, 0.0]);
    }

    #[test]
    fn forward_pass_outputs_stay_in_activation_range() {
        let mut rng = SmallRng::seed_from_u64(0xBEE5);
        let mut net = BehaviourNet::new(7, 16, 8, 2, Activation::Tanh);
        net.randomize(2.0, 1.0, &mut rng);
        let outputs = net.forward(&[1.0; 7]);
        assert_eq!(outputs.len(), 2);
        assert!(outputs.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn sigmoid_layer_maps_zero_input_to_half() {
        let mut layer = NetLayer::new(3, 4, Activation::Sigmoid);
        let outputs = layer.forward(&[0.0, 0.0, 0.0]);
        assert!(outputs.iter().all(|v| (*v - 0.5).abs() < f32::EPSILON));
    }

    #[test]
    fn single_unit_layer_computes_dot_product() {
        let mut layer = NetLayer::new(2, 1, Activation::Tanh);
        let mut rng = SmallRng::seed_from_u64(1);
        layer.randomize(2.0, 1.0, &mut rng);
        let weights = [layer.weights()[0], layer.weights()[1]];
        let input = [0.25, -0.75];
        let expected = (input[0] * weights[0] + input[1] * weights[1]).tanh();
        let outputs = layer.forward(&input);
        assert!((outputs[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn randomize_respects_floored_range() {
        let mut rng = SmallRng::seed_from_u64(77);
        let mut layer = NetLayer::new(16, 16, Activation::Tanh);
        layer.randomize(0.0, 0.0, &mut rng);
        assert!(layer.weights().iter().all(|w| (-0.1..0.1).contains(w)));
    }

    #[test]
    fn transfer_with_full_weighting_copies_donor() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut donor = NetLayer::new(4, 4, Activation::Tanh);
        donor.randomize(1.0, 1.0, &mut rng);
        let mut recipient = NetLayer::new(4, 4, Activation::Tanh);
        recipient.transfer_from(&donor, 1.0);
        assert_eq!(recipient.weights(), donor.weights());
    }
}
