//! Population-density noise field.
//!
//! A seeded 2D scalar noise function standing in for population density and
//! terrain guidance. Negative noise values are clamped to zero so the field
//! reads as "no population" rather than oscillating below zero.

use noise::{NoiseFn, Perlin, Seedable};

use crate::geom::Vec2;

/// Frequency used by the street generator's population field.
pub const STREET_FREQUENCY: f64 = 0.001;

/// Frequency used by the river walk's guidance field (much larger features).
pub const RIVER_FREQUENCY: f64 = 0.0001;

/// Deterministic 2D scalar noise field, parameterized by seed and frequency.
#[derive(Clone)]
pub struct DensityField {
    noise: Perlin,
    frequency: f64,
}

impl DensityField {
    pub fn new(seed: u32, frequency: f64) -> Self {
        Self {
            noise: Perlin::new(1).set_seed(seed),
            frequency,
        }
    }

    /// Sample the field at a world position. Result is in `[0, 1]`.
    pub fn sample(&self, point: Vec2) -> f64 {
        let value = self
            .noise
            .get([point.x * self.frequency, point.y * self.frequency]);
        value.max(0.0)
    }

    /// Raw signed noise value, used where the guidance only needs ordering
    /// (river walks climb the gradient, negative values included).
    pub fn sample_signed(&self, point: Vec2) -> f64 {
        self.noise
            .get([point.x * self.frequency, point.y * self.frequency])
    }
}
