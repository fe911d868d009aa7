//! Element-wise operations over flat gene vectors. Behaviour-net weight
//! matrices and trait-gene sequences both go through these.

use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal};

/// Fill `values` with independent draws from `N(mean, sigma)`.
pub fn randomize_normal(values: &mut [f32], mean: f32, sigma: f32, rng: &mut dyn RngCore) {
    let Ok(dist) = Normal::new(mean, sigma) else {
        values.fill(mean);
        return;
    };
    for value in values {
        *value = dist.sample(rng);
    }
}

/// Fill `values` with independent draws from `U(min_val, max_val)`.
pub fn randomize_uniform(values: &mut [f32], min_val: f32, max_val: f32, rng: &mut dyn RngCore) {
    for value in values {
        *value = rng.random_range(min_val..max_val);
    }
}

/// Weighted average of two parent vectors:
/// `child[i] = w * parent1[i] + (1 - w) * parent2[i]`.
pub fn combine(child: &mut [f32], parent1: &[f32], parent2: &[f32], parent1_weighting: f32) {
    for (i, value) in child.iter_mut().enumerate() {
        *value = parent1_weighting * parent1[i] + (1.0 - parent1_weighting) * parent2[i];
    }
}

/// In-place variant of [`combine`] used by gene transfer, where the recipient
/// vector is also the second parent.
pub fn blend(own: &mut [f32], donor: &[f32], donor_weighting: f32) {
    for (value, donated) in own.iter_mut().zip(donor) {
        *value = donor_weighting * donated + (1.0 - donor_weighting) * *value;
    }
}

/// With probability `mutation_prob` per element, add a draw from
/// `N(0, mutation_sigma)`.
pub fn mutate(values: &mut [f32], mutation_prob: f32, mutation_sigma: f32, rng: &mut dyn RngCore) {
    let Ok(dist) = Normal::new(0.0, mutation_sigma) else {
        return;
    };
    for value in values {
        if rng.random::<f32>() <= mutation_prob {
            *value += dist.sample(rng);
        }
    }
}

/// Combine two parents with a uniformly drawn weighting, then mutate.
pub fn combine_and_mutate_random(
    child: &mut [f32],
    parent1: &[f32],
    parent2: &[f32],
    mutation_prob: f32,
    mutation_sigma: f32,
    rng: &mut dyn RngCore,
) {
    let weighting = rng.random::<f32>();
    combine(child, parent1, parent2, weighting);
    mutate(child, mutation_prob, mutation_sigma, rng);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn combine_is_exact_weighted_average() {
        let parent1 = [1.0, 2.0, 3.0];
        let parent2 = [5.0, 6.0, 7.0];
        let mut child = [0.0; 3];
        combine(&mut child, &parent1, &parent2, 0.25);
        assert_eq!(child, [4.0, 5.0, 6.0]);
    }

    #[test]
    fn blend_matches_combine_with_aliased_recipient() {
        let donor = [2.0, 4.0, 8.0];
        let mut own = [1.0, 1.0, 1.0];
        let mut expected = [0.0; 3];
        combine(&mut expected, &donor, &own, 0.5);
        blend(&mut own, &donor, 0.5);
        assert_eq!(own, expected);
    }

    #[test]
    fn mutate_with_zero_probability_is_identity() {
        let mut rng = SmallRng::seed_from_u64(17);
        let mut values = [0.5, -0.5, 1.5];
        let original = values;
        mutate(&mut values, 0.0, 1.0, &mut rng);
        assert_eq!(values, original);
    }

    #[test]
    fn mutate_with_unit_probability_changes_every_element() {
        let mut rng = SmallRng::seed_from_u64(23);
        let mut values = [0.0f32; 32];
        mutate(&mut values, 1.0, 1.0, &mut rng);
        assert!(values.iter().all(|v| *v != 0.0));
    }

    #[test]
    fn randomize_uniform_respects_bounds() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut values = [0.0f32; 256];
        randomize_uniform(&mut values, -2.0, 2.0, &mut rng);
        assert!(values.iter().all(|v| (-2.0..2.0).contains(v)));
    }

    #[test]
    fn randomize_normal_with_zero_sigma_fills_mean() {
        let mut rng = SmallRng::seed_from_u64(9);
        let mut values = [0.0f32; 8];
        randomize_normal(&mut values, 3.5, 0.0, &mut rng);
        assert!(values.iter().all(|v| (*v - 3.5).abs() < f32::EPSILON));
    }
}
