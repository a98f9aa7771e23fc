// This file is part of Canopy.
//
// Canopy is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Canopy is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Canopy.  If not, see <http://www.gnu.org/licenses/>.
use crate::tree::Tree;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    Numerical,
    Boolean,
    Categorical,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub kind: FeatureType,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionTransform {
    Identity,
    Sigmoid,
    Softmax,
}

impl Default for PredictionTransform {
    fn default() -> Self {
        PredictionTransform::Identity
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    Sum,
}

impl Default for Reduction {
    fn default() -> Self {
        Reduction::Sum
    }
}

/// An ordered sequence of trees, plus the attributes spec.md 3 gives the
/// ensemble as a whole.
#[derive(Clone, Debug)]
pub struct Forest {
    pub trees: Vec<Tree>,
    pub features: Vec<Feature>,
    pub prediction_transform: PredictionTransform,
    pub reduction: Reduction,
    pub num_classes: usize,
    pub initial_offset: f64,
}

impl Forest {
    pub fn row_width(&self) -> usize {
        self.features.len()
    }

    /// 0/1 classes means a regressor; >=2 means a multiclass classifier.
    pub fn is_multiclass(&self) -> bool {
        self.num_classes >= 2
    }

    /// Reference prediction: walk every tree directly (no tiling, no
    /// layout), reduce by sum, apply the prediction transform. Every
    /// lowered representation must match this within the declared
    /// precision (spec.md 8, property 6).
    pub fn predict(&self, row: &[f64]) -> Vec<f64> {
        if self.is_multiclass() {
            let mut class_sums = vec![0.0_f64; self.num_classes];
            for tree in &self.trees {
                let class = tree.class_id.expect("multiclass tree missing class id") as usize;
                class_sums[class] += tree.walk(row);
            }
            for sum in &mut class_sums {
                *sum += self.initial_offset;
            }
            match self.prediction_transform {
                PredictionTransform::Softmax => softmax(&class_sums),
                PredictionTransform::Identity => class_sums,
                PredictionTransform::Sigmoid => class_sums.into_iter().map(sigmoid).collect(),
            }
        } else {
            let mut sum = self.initial_offset;
            for tree in &self.trees {
                sum += tree.walk(row);
            }
            vec![match self.prediction_transform {
                PredictionTransform::Identity => sum,
                PredictionTransform::Sigmoid => sigmoid(sum),
                PredictionTransform::Softmax => sum,
            }]
        }
    }

    /// The index of the highest-scoring class, for multiclass predictions.
    pub fn argmax_class(&self, row: &[f64]) -> usize {
        let scores = self.predict(row);
        scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).expect("NaN in prediction"))
            .map(|(i, _)| i)
            .expect("forest has at least one class")
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax(values: &[f64]) -> Vec<f64> {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}
