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

//! The ONNX import interface (spec.md 6): out of scope as a subsystem (no
//! protobuf decoder lives here), but its *interface* is specified, so this
//! module implements it against an already-decoded attribute table rather
//! than raw bytes -- a real frontend would hand us this after parsing the
//! single `TreeEnsembleRegressor`/`TreeEnsembleClassifier` node's
//! attributes out of a `.onnx` protobuf.
//!
//! The model carries exactly one comparison predicate for every branch
//! node (`nodes_modes`), but `Node::goes_right` only ever tests
//! `row[feature] >= threshold`. Reconciling the two: `ULT`/`UGE` are exact
//! complements of that single comparator, so they just pick which child
//! is "true" and leave the threshold untouched. `ULE`/`UGT` are not
//! representable by an inclusive `>=` at the threshold itself, so their
//! threshold is nudged to the next representable float (`f64::next_up`)
//! before picking a child -- the same trick real exporters use to turn a
//! strict inequality into an inclusive one.
use crate::{
    builder::ForestBuilder,
    error::CanopyError,
    forest::{Forest, PredictionTransform},
    node::{NodeId, LEAF_FEATURE_INDEX},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OnnxPredicate {
    Ult,
    Uge,
    Ugt,
    Ule,
}

/// The decoded attribute table of a single ONNX `TreeEnsembleRegressor` or
/// `TreeEnsembleClassifier` node (spec.md 6). A real frontend extracts
/// this from `onnx::NodeProto::attribute`; this module starts downstream
/// of that extraction. Also the JSON shape `canopy compile --onnx` reads,
/// since no protobuf decoder lives in this workspace.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OnnxAttributes {
    pub base_value: f64,
    pub post_transform: PredictionTransform,
    pub node_mode: OnnxPredicate,
    pub num_features: usize,
    pub is_classifier: bool,
    pub n_targets: usize,

    pub nodes_treeids: Vec<i64>,
    pub nodes_nodeids: Vec<i64>,
    pub nodes_featureids: Vec<i64>,
    pub nodes_values: Vec<f64>,
    pub nodes_falsenodeids: Vec<i64>,
    pub nodes_truenodeids: Vec<i64>,
    /// Present only when the exporter emitted it; every entry must be 0.
    pub nodes_missing_value_tracks_true: Vec<i64>,

    pub target_treeids: Vec<i64>,
    pub target_nodeids: Vec<i64>,
    pub target_ids: Vec<i64>,
    pub target_weights: Vec<f64>,
}

/// The interface spec.md 6 names: something that turns a decoded model
/// description into a `Forest`.
pub trait ModelImporter {
    fn import(&self, attrs: &OnnxAttributes) -> Result<Forest, CanopyError>;
}

pub struct OnnxTreeEnsembleImporter;

struct BranchRecord {
    feature_id: i64,
    threshold: f64,
    false_node: i64,
    true_node: i64,
}

struct LeafRecord {
    weight: f64,
    class_id: i64,
}

impl ModelImporter for OnnxTreeEnsembleImporter {
    fn import(&self, attrs: &OnnxAttributes) -> Result<Forest, CanopyError> {
        if attrs.nodes_missing_value_tracks_true.iter().any(|&v| v != 0) {
            return Err(CanopyError::UnsupportedConfiguration(
                "nodes_missing_value_tracks_true is not supported".to_string(),
            ));
        }
        let max_feature = attrs.nodes_featureids.iter().copied().max().unwrap_or(-1);
        if max_feature >= attrs.num_features as i64 {
            return Err(CanopyError::UnsupportedConfiguration(format!(
                "num_features={} does not cover observed feature index {max_feature}",
                attrs.num_features
            )));
        }

        let mut branches: HashMap<(i64, i64), BranchRecord> = HashMap::new();
        for i in 0..attrs.nodes_nodeids.len() {
            let key = (attrs.nodes_treeids[i], attrs.nodes_nodeids[i]);
            branches.insert(
                key,
                BranchRecord {
                    feature_id: attrs.nodes_featureids[i],
                    threshold: attrs.nodes_values[i],
                    false_node: attrs.nodes_falsenodeids[i],
                    true_node: attrs.nodes_truenodeids[i],
                },
            );
        }

        let mut leaves: HashMap<(i64, i64), Vec<LeafRecord>> = HashMap::new();
        for i in 0..attrs.target_nodeids.len() {
            let key = (attrs.target_treeids[i], attrs.target_nodeids[i]);
            leaves.entry(key).or_default().push(LeafRecord {
                weight: attrs.target_weights[i],
                class_id: *attrs.target_ids.get(i).unwrap_or(&0),
            });
        }

        let mut tree_ids: Vec<i64> = attrs.nodes_treeids.clone();
        tree_ids.sort_unstable();
        tree_ids.dedup();

        let mut builder = ForestBuilder::new();
        for i in 0..attrs.num_features {
            builder.add_feature(format!("f{i}"), crate::forest::FeatureType::Numerical)?;
        }
        builder.set_prediction_transform(attrs.post_transform)?;
        builder.set_num_classes(if attrs.is_classifier { attrs.n_targets } else { 0 })?;
        builder.set_initial_offset(attrs.base_value)?;

        for tree_id in tree_ids {
            builder.new_tree()?;
            let mut node_ids: HashMap<i64, NodeId> = HashMap::new();
            let mut class_id = None;
            build_node(
                &mut builder,
                tree_id,
                0,
                attrs.node_mode,
                &branches,
                &leaves,
                &mut node_ids,
                &mut class_id,
            )?;
            if attrs.is_classifier {
                let class_id = class_id.ok_or_else(|| {
                    CanopyError::UnsupportedConfiguration(format!("tree {tree_id} has no leaf class id"))
                })?;
                builder.set_tree_class_id(class_id as u32)?;
            }
            builder.end_tree()?;
        }

        builder.persist()
    }
}

#[allow(clippy::too_many_arguments)]
fn build_node(
    builder: &mut ForestBuilder,
    tree_id: i64,
    onnx_node_id: i64,
    mode: OnnxPredicate,
    branches: &HashMap<(i64, i64), BranchRecord>,
    leaves: &HashMap<(i64, i64), Vec<LeafRecord>>,
    node_ids: &mut HashMap<i64, NodeId>,
    class_id: &mut Option<i64>,
) -> Result<NodeId, CanopyError> {
    if let Some(existing) = node_ids.get(&onnx_node_id) {
        return Ok(*existing);
    }

    if let Some(records) = leaves.get(&(tree_id, onnx_node_id)) {
        if records.len() != 1 {
            return Err(CanopyError::UnsupportedConfiguration(format!(
                "tree {tree_id} node {onnx_node_id} has {} leaf weights, expected 1",
                records.len()
            )));
        }
        let record = &records[0];
        if let Some(existing_class) = *class_id {
            if existing_class != record.class_id {
                return Err(CanopyError::UnsupportedConfiguration(format!(
                    "tree {tree_id} has more than one target class, only one per tree is supported"
                )));
            }
        } else {
            *class_id = Some(record.class_id);
        }
        let id = builder.new_node(record.weight, LEAF_FEATURE_INDEX)?;
        node_ids.insert(onnx_node_id, id);
        return Ok(id);
    }

    let branch = branches.get(&(tree_id, onnx_node_id)).ok_or_else(|| {
        CanopyError::invalid_model(
            tree_id as usize,
            format!("onnx node {onnx_node_id} is neither a branch nor a leaf"),
        )
    })?;

    // `Node::goes_right` always tests `row[feature] >= threshold`. ULT/UGE
    // are exact complements of that comparator; ULE/UGT need the
    // threshold nudged to the next representable float to make the
    // boundary land on the correct child (see module docs).
    let (threshold, false_is_right) = match mode {
        OnnxPredicate::Ult => (branch.threshold, true),
        OnnxPredicate::Uge => (branch.threshold, false),
        OnnxPredicate::Ule => (branch.threshold.next_up(), true),
        OnnxPredicate::Ugt => (branch.threshold.next_up(), false),
    };

    let id = builder.new_node(threshold, branch.feature_id as i32)?;
    node_ids.insert(onnx_node_id, id);

    let false_id = build_node(
        builder,
        tree_id,
        branch.false_node,
        mode,
        branches,
        leaves,
        node_ids,
        class_id,
    )?;
    let true_id = build_node(
        builder,
        tree_id,
        branch.true_node,
        mode,
        branches,
        leaves,
        node_ids,
        class_id,
    )?;

    let (left_id, right_id) = if false_is_right {
        (true_id, false_id)
    } else {
        (false_id, true_id)
    };
    builder.set_left_child(id, left_id)?;
    builder.set_right_child(id, right_id)?;

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regressor_attrs(node_mode: OnnxPredicate, threshold: f64) -> OnnxAttributes {
        OnnxAttributes {
            base_value: 0.0,
            post_transform: PredictionTransform::Identity,
            node_mode,
            num_features: 1,
            is_classifier: false,
            n_targets: 0,
            nodes_treeids: vec![0],
            nodes_nodeids: vec![0],
            nodes_featureids: vec![0],
            nodes_values: vec![threshold],
            nodes_falsenodeids: vec![1],
            nodes_truenodeids: vec![2],
            nodes_missing_value_tracks_true: vec![],
            target_treeids: vec![0, 0],
            target_nodeids: vec![1, 2],
            target_ids: vec![0, 0],
            target_weights: vec![-1.0, 1.0],
        }
    }

    // Testable scenario (vi): BRANCH_LEQ maps to ULE; a row exactly on the
    // boundary takes the true ("<=") edge, which here is node 2 (weight 1.0).
    #[test]
    fn branch_leq_boundary_row_takes_true_edge() {
        let attrs = regressor_attrs(OnnxPredicate::Ule, 0.5);
        let forest = OnnxTreeEnsembleImporter.import(&attrs).unwrap();
        assert_eq!(forest.predict(&[0.5])[0], 1.0);
        assert_eq!(forest.predict(&[0.6])[0], -1.0);
    }

    #[test]
    fn branch_gt_boundary_row_takes_false_edge() {
        let attrs = regressor_attrs(OnnxPredicate::Ugt, 0.5);
        let forest = OnnxTreeEnsembleImporter.import(&attrs).unwrap();
        assert_eq!(forest.predict(&[0.5])[0], -1.0);
        assert_eq!(forest.predict(&[0.6])[0], 1.0);
    }

    #[test]
    fn branch_lt_exactly_complements_our_comparator() {
        let attrs = regressor_attrs(OnnxPredicate::Ult, 0.5);
        let forest = OnnxTreeEnsembleImporter.import(&attrs).unwrap();
        assert_eq!(forest.predict(&[0.4])[0], 1.0);
        assert_eq!(forest.predict(&[0.5])[0], -1.0);
    }

    #[test]
    fn branch_geq_matches_native_convention_directly() {
        let attrs = regressor_attrs(OnnxPredicate::Uge, 0.5);
        let forest = OnnxTreeEnsembleImporter.import(&attrs).unwrap();
        assert_eq!(forest.predict(&[0.4])[0], -1.0);
        assert_eq!(forest.predict(&[0.5])[0], 1.0);
    }

    #[test]
    fn rejects_missing_value_tracking() {
        let mut attrs = regressor_attrs(OnnxPredicate::Uge, 0.5);
        attrs.nodes_missing_value_tracks_true = vec![1];
        let err = OnnxTreeEnsembleImporter.import(&attrs).unwrap_err();
        assert!(matches!(err, CanopyError::UnsupportedConfiguration(_)));
    }

    #[test]
    fn classifier_requires_one_class_per_tree() {
        let mut attrs = regressor_attrs(OnnxPredicate::Uge, 0.5);
        attrs.is_classifier = true;
        attrs.n_targets = 2;
        attrs.target_ids = vec![0, 1];
        let err = OnnxTreeEnsembleImporter.import(&attrs).unwrap_err();
        assert!(matches!(err, CanopyError::UnsupportedConfiguration(_)));
    }
}
