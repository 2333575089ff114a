//! Point type for inckmeans.
//!
//! A point is a fixed-dimensional sequence of `f64` coordinates. The same
//! type represents input observations, centroids, and componentwise sums.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// A dense point in `D`-dimensional Euclidean space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Point {
    coords: Vec<f64>,
}

impl Point {
    /// Create the origin of the given dimensionality.
    pub fn zeros(dimensions: usize) -> Self {
        Self {
            coords: vec![0.0; dimensions],
        }
    }

    /// Create a point from raw coordinates.
    pub fn from_data(coords: Vec<f64>) -> Self {
        Self { coords }
    }

    /// Get the dimensionality.
    pub fn dimensions(&self) -> usize {
        self.coords.len()
    }

    /// Get the raw coordinates as a slice.
    pub fn data(&self) -> &[f64] {
        &self.coords
    }

    pub fn into_data(self) -> Vec<f64> {
        self.coords
    }

    /// Squared Euclidean distance. Cheaper than [`Point::distance`] when
    /// only the ordering matters.
    pub fn squared_distance(&self, other: &Point) -> f64 {
        assert_eq!(
            self.dimensions(),
            other.dimensions(),
            "Dimension mismatch in distance"
        );

        self.coords
            .iter()
            .zip(other.coords.iter())
            .map(|(&a, &b)| {
                let diff = a - b;
                diff * diff
            })
            .sum()
    }

    /// Euclidean distance.
    pub fn distance(&self, other: &Point) -> f64 {
        self.squared_distance(other).sqrt()
    }

    /// Componentwise in-place addition.
    pub fn accumulate(&mut self, other: &[f64]) {
        assert_eq!(
            self.dimensions(),
            other.len(),
            "Dimension mismatch in point addition"
        );

        for (c, &o) in self.coords.iter_mut().zip(other) {
            *c += o;
        }
    }
}

impl From<Vec<f64>> for Point {
    fn from(coords: Vec<f64>) -> Self {
        Self::from_data(coords)
    }
}

impl Index<usize> for Point {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.coords[index]
    }
}

impl IndexMut<usize> for Point {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.coords[index]
    }
}
