//! The genotype: a behaviour network plus fifteen trait genes, with the
//! crossover, inheritance, and horizontal-transfer operations that act on it.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::net::{Activation, BehaviourNet};
use crate::phenotype::Phenotype;
use crate::{MutationParams, TRAIT_GENE_COUNT, vector};

/// Heritable state of one organism.
///
/// During the simulation the genotype lives inside a `Mutex` so that
/// horizontal gene transfer can read a donor while the donor's owner may be
/// transferring in the other direction; see [`Genotype::transfer_from`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genotype {
    net: BehaviourNet,
    trait_genes: Vec<f32>,
}

impl Genotype {
    #[must_use]
    pub fn new(sensory_inputs: usize, hidden1: usize, hidden2: usize, outputs: usize) -> Self {
        Self {
            net: BehaviourNet::new(
                sensory_inputs,
                hidden1,
                hidden2,
                outputs,
                Activation::default(),
            ),
            trait_genes: vec![0.0; TRAIT_GENE_COUNT],
        }
    }

    /// Random weights for the behaviour network, standard-normal trait genes.
    pub fn randomize(&mut self, weight_range: f32, weight_range_bias: f32, rng: &mut dyn RngCore) {
        self.net.randomize(weight_range, weight_range_bias, rng);
        vector::randomize_normal(&mut self.trait_genes, 0.0, 1.0, rng);
    }

    /// Rebuild from two parents: per-layer combine with a uniformly drawn
    /// weighting, then mutate; trait genes the same way.
    pub fn combine_from(
        &mut self,
        parent1: &Self,
        parent2: &Self,
        mutation: &MutationParams,
        rng: &mut dyn RngCore,
    ) {
        self.net.combine_from(
            &parent1.net,
            &parent2.net,
            mutation.net_prob,
            mutation.net_sigma,
            rng,
        );
        vector::combine_and_mutate_random(
            &mut self.trait_genes,
            &parent1.trait_genes,
            &parent2.trait_genes,
            mutation.genes_prob,
            mutation.genes_sigma,
            rng,
        );
    }

    /// Rebuild from a single parent: copy, then mutate.
    pub fn inherit_from(&mut self, parent: &Self, mutation: &MutationParams, rng: &mut dyn RngCore) {
        self.net
            .inherit_from(&parent.net, mutation.net_prob, mutation.net_sigma, rng);
        self.trait_genes.copy_from_slice(&parent.trait_genes);
        vector::mutate(
            &mut self.trait_genes,
            mutation.genes_prob,
            mutation.genes_sigma,
            rng,
        );
    }

    /// Horizontal gene transfer: blend the donor's layer weights and trait
    /// genes into the recipient with the given donor weighting.
    ///
    /// Both mutexes are acquired together in address order, never nested in
    /// caller-chosen order, so arbitrary simultaneous pairings (including
    /// symmetric A→B and B→A transfers on two threads) cannot deadlock.
    pub fn transfer_from(recipient: &Mutex<Self>, donor: &Mutex<Self>, donor_weighting: f32) {
        let recipient_addr = std::ptr::from_ref(recipient).addr();
        let donor_addr = std::ptr::from_ref(donor).addr();
        debug_assert_ne!(recipient_addr, donor_addr, "self-transfer");
        let (mut own, theirs) = if recipient_addr < donor_addr {
            let own = lock(recipient);
            let theirs = lock(donor);
            (own, theirs)
        } else {
            let theirs = lock(donor);
            let own = lock(recipient);
            (own, theirs)
        };
        own.net.transfer_from(&theirs.net, donor_weighting);
        vector::blend(&mut own.trait_genes, &theirs.trait_genes, donor_weighting);
    }

    /// Run the behaviour network over scaled sensory data. The returned slice
    /// is the output layer's scratch space and must not be retained across
    /// the next forward pass.
    pub fn express_behaviour(&mut self, sensory_data: &[f32]) -> &[f32] {
        self.net.forward(sensory_data)
    }

    /// Write the five trait means into the phenotype. Gene windows overlap
    /// (0..4, 3..7, 6..9, 9..12, 12..15), linking traits pleiotropically;
    /// speed and health rate are negated.
    pub fn express_traits(&self, phenotype: &mut Phenotype) {
        phenotype.set_area_of_influence(self.trait_value(0, 4, false));
        phenotype.set_speed(self.trait_value(3, 4, true));
        phenotype.set_health_rate(self.trait_value(6, 3, true));
        phenotype.set_ideal_temp(self.trait_value(9, 3, false));
        phenotype.set_temp_range(self.trait_value(12, 3, false));
    }

    #[must_use]
    pub fn trait_genes(&self) -> &[f32] {
        &self.trait_genes
    }

    fn trait_value(&self, start: usize, count: usize, negate: bool) -> f32 {
        let sum: f32 = self.trait_genes[start..start + count].iter().sum();
        let mean = sum / count as f32;
        if negate { -mean } else { mean }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phenotype::{PhenotypeParams, Standardizer};
    use crate::{DECISION_OUTPUTS, SENSORY_INPUTS};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use std::sync::Arc;

    fn genotype(seed: u64) -> Genotype {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut genotype = Genotype::new(SENSORY_INPUTS, 16, 8, DECISION_OUTPUTS);
        genotype.randomize(2.0, 1.0, &mut rng);
        genotype
    }

    fn unit_params() -> PhenotypeParams {
        let identity = Standardizer::new(0.0, 1.0);
        PhenotypeParams {
            area_of_influence: identity,
            speed: identity,
            health_rate: identity,
            ideal_temp: identity,
            temp_range: identity,
        }
    }

    #[test]
    fn expressed_traits_are_gene_window_means() {
        let genotype = genotype(11);
        let genes = genotype.trait_genes().to_vec();
        let mut phenotype = Phenotype::new(unit_params());
        genotype.express_traits(&mut phenotype);

        let mean = |range: std::ops::Range<usize>| {
            genes[range.clone()].iter().sum::<f32>() / range.len() as f32
        };
        assert_eq!(phenotype.area_of_influence(), mean(0..4));
        assert_eq!(phenotype.speed(), -mean(3..7));
        assert_eq!(phenotype.health_rate(), -mean(6..9));
        assert_eq!(phenotype.ideal_temp(), mean(9..12));
        assert_eq!(phenotype.temp_range(), mean(12..15));
    }

    #[test]
    fn expressing_unchanged_genotype_is_idempotent() {
        let genotype = genotype(29);
        let mut first = Phenotype::new(unit_params());
        let mut second = Phenotype::new(unit_params());
        genotype.express_traits(&mut first);
        genotype.express_traits(&mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn inherit_without_mutation_copies_parent() {
        let parent = genotype(3);
        let mut rng = SmallRng::seed_from_u64(4);
        let mut child = Genotype::new(SENSORY_INPUTS, 16, 8, DECISION_OUTPUTS);
        let mutation = MutationParams {
            net_prob: 0.0,
            net_sigma: 1.0,
            genes_prob: 0.0,
            genes_sigma: 1.0,
        };
        child.inherit_from(&parent, &mutation, &mut rng);
        assert_eq!(child.trait_genes(), parent.trait_genes());
    }

    #[test]
    fn combine_keeps_genes_within_parent_hull_without_mutation() {
        let parent1 = genotype(5);
        let parent2 = genotype(6);
        let mut rng = SmallRng::seed_from_u64(7);
        let mut child = Genotype::new(SENSORY_INPUTS, 16, 8, DECISION_OUTPUTS);
        let mutation = MutationParams {
            net_prob: 0.0,
            net_sigma: 0.0,
            genes_prob: 0.0,
            genes_sigma: 0.0,
        };
        child.combine_from(&parent1, &parent2, &mutation, &mut rng);
        for ((child_gene, a), b) in child
            .trait_genes()
            .iter()
            .zip(parent1.trait_genes())
            .zip(parent2.trait_genes())
        {
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            assert!((lo - 1e-6..=hi + 1e-6).contains(child_gene));
        }
    }

    #[test]
    fn transfer_blends_trait_genes() {
        let recipient = Mutex::new(genotype(8));
        let donor = Mutex::new(genotype(9));
        let before = recipient.lock().unwrap().trait_genes().to_vec();
        let donated = donor.lock().unwrap().trait_genes().to_vec();
        Genotype::transfer_from(&recipient, &donor, 0.25);
        let after = recipient.lock().unwrap();
        for ((after_gene, own), donor_gene) in
            after.trait_genes().iter().zip(&before).zip(&donated)
        {
            let expected = 0.25 * donor_gene + 0.75 * own;
            assert!((after_gene - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn symmetric_transfers_on_two_threads_do_not_deadlock() {
        let a = Arc::new(Mutex::new(genotype(100)));
        let b = Arc::new(Mutex::new(genotype(101)));
        let mut handles = Vec::new();
        for flip in [false, true] {
            let a = Arc::clone(&a);
            let b = Arc::clone(&b);
            handles.push(std::thread::spawn(move || {
                for _ in 0..10_000 {
                    if flip {
                        Genotype::transfer_from(&a, &b, 0.1);
                    } else {
                        Genotype::transfer_from(&b, &a, 0.1);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().expect("transfer thread panicked");
        }
    }
}
