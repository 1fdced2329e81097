//! Minimal json-stat2 reader.
//!
//! PxWeb answers `"format": "json-stat2"` queries with a dense value array
//! laid out in row-major order over the dimensions listed in `id`: the last
//! dimension varies fastest.

use crate::error::{AppError, ProxyError};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct Dataset {
    pub id: Vec<String>,
    pub size: Vec<usize>,
    pub dimension: HashMap<String, Dimension>,
    pub value: Values,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dimension {
    pub label: Option<String>,
    pub category: Category,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub index: Option<CategoryIndex>,
    #[serde(default)]
    pub label: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CategoryIndex {
    Ordered(Vec<String>),
    Positions(HashMap<String, usize>),
}

/// Dense array, or the sparse `{"position": value}` form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Values {
    Dense(Vec<Option<f64>>),
    Sparse(HashMap<String, Option<f64>>),
}

/// One non-null cell with its category code and label per dimension,
/// in `Dataset::id` order.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub codes: Vec<String>,
    pub labels: Vec<String>,
    pub value: f64,
}

fn invalid(message: impl Into<String>) -> AppError {
    ProxyError::InvalidFormat(message.into()).into()
}

/// Number of cells in a cube with the given dimension sizes.
fn cell_count(size: &[usize]) -> Result<usize, AppError> {
    size.iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| invalid("dimension sizes overflow the cell count"))
}

impl Dimension {
    /// Category codes ordered by position.
    fn ordered_codes(&self) -> Vec<String> {
        match &self.category.index {
            Some(CategoryIndex::Ordered(codes)) => codes.clone(),
            Some(CategoryIndex::Positions(positions)) => {
                let mut pairs: Vec<(&String, &usize)> = positions.iter().collect();
                pairs.sort_by_key(|(_, position)| **position);
                pairs.into_iter().map(|(code, _)| code.clone()).collect()
            }
            // A single-category dimension may omit the index
            None => {
                let mut codes: Vec<String> = self.category.label.keys().cloned().collect();
                codes.sort();
                codes
            }
        }
    }

    fn label_for(&self, code: &str) -> String {
        self.category
            .label
            .get(code)
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }
}

impl Dataset {
    pub fn dimension_position(&self, id: &str) -> Option<usize> {
        self.id.iter().position(|d| d == id)
    }

    /// Walk every cell of the cube, skipping nulls.
    pub fn observations(&self) -> Result<Vec<Observation>, AppError> {
        if self.id.len() != self.size.len() {
            return Err(invalid("id and size have different lengths"));
        }

        let mut axes: Vec<(Vec<String>, Vec<String>)> = Vec::with_capacity(self.id.len());
        for (dim_id, &size) in self.id.iter().zip(&self.size) {
            let dimension = self
                .dimension
                .get(dim_id)
                .ok_or_else(|| invalid(format!("dimension '{}' is not described", dim_id)))?;
            let codes = dimension.ordered_codes();
            if codes.len() != size {
                return Err(invalid(format!(
                    "dimension '{}' has {} categories, size says {}",
                    dim_id,
                    codes.len(),
                    size
                )));
            }
            let labels = codes.iter().map(|c| dimension.label_for(c)).collect();
            axes.push((codes, labels));
        }

        let total = cell_count(&self.size)?;
        let cells: Vec<(usize, f64)> = match &self.value {
            Values::Dense(values) => {
                if values.len() != total {
                    return Err(invalid(format!(
                        "expected {} values, got {}",
                        total,
                        values.len()
                    )));
                }
                values
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| v.map(|v| (i, v)))
                    .collect()
            }
            Values::Sparse(values) => {
                let mut cells = Vec::with_capacity(values.len());
                for (key, value) in values {
                    let index: usize = key
                        .parse()
                        .map_err(|_| invalid(format!("bad value index '{}'", key)))?;
                    if index >= total {
                        return Err(invalid(format!("value index {} out of range", index)));
                    }
                    if let Some(v) = value {
                        cells.push((index, *v));
                    }
                }
                cells.sort_by_key(|(i, _)| *i);
                cells
            }
        };

        let mut observations = Vec::with_capacity(cells.len());
        for (flat, value) in cells {
            let mut remainder = flat;
            let mut coords = vec![0usize; self.size.len()];
            for (axis, &size) in self.size.iter().enumerate().rev() {
                coords[axis] = remainder % size;
                remainder /= size;
            }

            let codes = coords
                .iter()
                .zip(&axes)
                .map(|(&c, (codes, _))| codes[c].clone())
                .collect();
            let labels = coords
                .iter()
                .zip(&axes)
                .map(|(&c, (_, labels))| labels[c].clone())
                .collect();
            observations.push(Observation {
                codes,
                labels,
                value,
            });
        }

        Ok(observations)
    }
}
