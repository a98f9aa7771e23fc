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

//! JSON schemas for `canopy compile`'s two supported inputs (spec.md 6):
//! a plain forest description, and a decoded ONNX `TreeEnsemble*` attribute
//! table. Both end up going through the same `ForestBuilder`.
use forest::{CanopyError, Feature, Forest, ForestBuilder, PredictionTransform, Reduction};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSpec {
    pub threshold: f64,
    pub feature_index: i32,
    #[serde(default)]
    pub left: Option<usize>,
    #[serde(default)]
    pub right: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TreeSpec {
    #[serde(default)]
    pub class_id: Option<u32>,
    pub nodes: Vec<NodeSpec>,
}

/// A whole forest, flattened to plain data: every tree's nodes are given
/// in the same arena order `ForestBuilder::new_node` would assign them, so
/// `left`/`right` are just indices into that tree's own `nodes` array.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForestSpec {
    pub features: Vec<Feature>,
    #[serde(default)]
    pub prediction_transform: PredictionTransform,
    #[serde(default)]
    pub reduction: Reduction,
    #[serde(default)]
    pub num_classes: usize,
    #[serde(default)]
    pub initial_offset: f64,
    pub trees: Vec<TreeSpec>,
}

pub fn build_forest(spec: &ForestSpec) -> Result<Forest, CanopyError> {
    let mut builder = ForestBuilder::new();
    for feature in &spec.features {
        builder.add_feature(feature.name.clone(), feature.kind)?;
    }
    builder.set_prediction_transform(spec.prediction_transform)?;
    builder.set_reduction(spec.reduction)?;
    builder.set_num_classes(spec.num_classes)?;
    builder.set_initial_offset(spec.initial_offset)?;

    for (tree_index, tree) in spec.trees.iter().enumerate() {
        builder.new_tree()?;
        let ids: Result<Vec<_>, _> = tree.nodes.iter().map(|n| builder.new_node(n.threshold, n.feature_index)).collect();
        let ids = ids?;
        for (local_index, node) in tree.nodes.iter().enumerate() {
            if let Some(left) = node.left {
                let child = *ids.get(left).ok_or_else(|| CanopyError::invalid_node(tree_index, local_index, format!("left child {left} out of range")))?;
                builder.set_left_child(ids[local_index], child)?;
            }
            if let Some(right) = node.right {
                let child = *ids.get(right).ok_or_else(|| CanopyError::invalid_node(tree_index, local_index, format!("right child {right} out of range")))?;
                builder.set_right_child(ids[local_index], child)?;
            }
        }
        if let Some(class_id) = tree.class_id {
            builder.set_tree_class_id(class_id)?;
        }
        builder.end_tree()?;
    }

    builder.persist()
}
