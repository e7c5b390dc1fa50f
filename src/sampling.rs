/// Weighted draws over exact populations, with rejection of exhausted categories

use crate::composition::Composition;
use crate::error::{Error, Result};
use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::Rng;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub population: BigUint,
}

impl Category {
    pub fn new(name: impl Into<String>, population: impl Into<BigUint>) -> Self {
        Category {
            name: name.into(),
            population: population.into(),
        }
    }
}

/// One accepted draw: the category and its 1-based running count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub index: usize,
    pub name: String,
    pub ordinal: BigUint,
}

impl fmt::Display for Emission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} molecule #{}", self.name, self.ordinal)
    }
}

/// Per-category counters as decimal strings; the values overflow JSON numbers
#[derive(Debug, Clone, Serialize)]
pub struct CategorySnapshot {
    pub name: String,
    pub population: String,
    pub emitted: String,
}

/// Picks an index with probability proportional to its weight.
/// The draw is uniform over the whole integer range, not a scaled float.
pub fn weighted_pick<R: Rng + ?Sized>(weights: &[BigUint], total: &BigUint, rng: &mut R) -> Result<usize> {
    if total.is_zero() {
        return Err(Error::InvalidComposition("total weight is zero".into()));
    }
    let mut remaining = rng.gen_biguint_below(total);
    for (index, weight) in weights.iter().enumerate() {
        if remaining < *weight {
            return Ok(index);
        }
        remaining -= weight;
    }
    Err(Error::NoCategoryMatched)
}

/// Owns the emitted counters; the only way to advance them is `draw_next`
pub struct SamplingEngine<R: Rng> {
    categories: Vec<Category>,
    weights: Vec<BigUint>,
    total_weight: BigUint,
    emitted: Vec<BigUint>,
    rng: R,
}

impl<R: Rng> SamplingEngine<R> {
    pub fn new(composition: &Composition, rng: R) -> Result<Self> {
        let categories = composition
            .constituents()
            .iter()
            .map(|c| Category::new(c.display_name(), c.population.clone()))
            .collect();
        Self::from_populations(categories, rng)
    }

    pub fn from_populations(categories: Vec<Category>, rng: R) -> Result<Self> {
        let weights: Vec<BigUint> = categories.iter().map(|c| c.population.clone()).collect();
        let total_weight: BigUint = weights.iter().sum();
        if total_weight.is_zero() {
            return Err(Error::InvalidComposition(
                "total weight is zero, the sampling loop cannot start".into(),
            ));
        }
        let emitted = vec![BigUint::zero(); categories.len()];
        Ok(SamplingEngine {
            categories,
            weights,
            total_weight,
            emitted,
            rng,
        })
    }

    /// Draws the next unit. Weights stay the original populations for the life
    /// of the engine; capped categories are redrawn rather than reweighted.
    pub fn draw_next(&mut self) -> Result<Emission> {
        if self.is_exhausted() {
            warn!("every category exhausted");
            return Err(Error::Exhausted);
        }

        let mut rejected = 0u32;
        let index = loop {
            let candidate = weighted_pick(&self.weights, &self.total_weight, &mut self.rng)?;
            if self.emitted[candidate] < self.categories[candidate].population {
                break candidate;
            }
            rejected += 1;
        };
        if rejected > 0 {
            debug!(rejected, "redrew capped categories");
        }

        self.emitted[index] += BigUint::one();
        Ok(Emission {
            index,
            name: self.categories[index].name.clone(),
            ordinal: self.emitted[index].clone(),
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.categories
            .iter()
            .zip(&self.emitted)
            .all(|(c, emitted)| *emitted >= c.population)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn emitted(&self, index: usize) -> Option<&BigUint> {
        self.emitted.get(index)
    }

    pub fn population(&self, index: usize) -> Option<&BigUint> {
        self.categories.get(index).map(|c| &c.population)
    }

    pub fn remaining(&self, index: usize) -> Option<BigUint> {
        let population = self.population(index)?;
        let emitted = self.emitted(index)?;
        Some(population - emitted)
    }

    pub fn total_weight(&self) -> &BigUint {
        &self.total_weight
    }

    pub fn snapshot(&self) -> Vec<CategorySnapshot> {
        self.categories
            .iter()
            .zip(&self.emitted)
            .map(|(c, emitted)| CategorySnapshot {
                name: c.name.clone(),
                population: c.population.to_string(),
                emitted: emitted.to_string(),
            })
            .collect()
    }
}
