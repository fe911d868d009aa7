//! Heritable state shared by every organism in a genesim population: flat
//! gene-vector operations, the three-layer behaviour network, the genotype
//! that owns both, and the phenotype it expresses into.

use serde::{Deserialize, Serialize};

mod genotype;
mod net;
mod phenotype;
pub mod vector;

pub use genotype::Genotype;
pub use net::{Activation, BehaviourNet, NetLayer};
pub use phenotype::{Phenotype, PhenotypeParams, Standardizer};

/// Number of scaled sensory channels feeding the behaviour network.
pub const SENSORY_INPUTS: usize = 7;
/// Number of decision outputs produced by the behaviour network.
pub const DECISION_OUTPUTS: usize = 2;
/// Number of trait genes mapped pleiotropically onto the physical traits.
pub const TRAIT_GENE_COUNT: usize = 15;

/// Mutation settings applied when deriving offspring genotypes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutationParams {
    /// Per-weight mutation probability for the behaviour network.
    pub net_prob: f32,
    /// Standard deviation of behaviour-network weight mutations.
    pub net_sigma: f32,
    /// Per-gene mutation probability for the trait genes.
    pub genes_prob: f32,
    /// Standard deviation of trait-gene mutations.
    pub genes_sigma: f32,
}
