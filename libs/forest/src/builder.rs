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

//! The forest builder state machine from spec.md 4.7:
//! `{empty -> in-tree -> between-trees -> sealed}`, with `new-tree`,
//! `new-node`, `end-tree`, `persist` as the transitions. Calling a
//! tree-mutating method outside `in-tree` is a documented programmer
//! error in the source; here it is instead a recoverable `InvalidModel`
//! error, since importers further up the pipeline may hand back
//! malformed input rather than a programmer mis-sequencing calls.
use crate::{
    error::CanopyError,
    forest::{Feature, FeatureType, Forest, PredictionTransform, Reduction},
    node::{Node, NodeId},
    tree::Tree,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum BuilderState {
    Empty,
    InTree,
    BetweenTrees,
    Sealed,
}

pub struct ForestBuilder {
    state: BuilderState,
    features: Vec<Feature>,
    trees: Vec<Tree>,
    current_nodes: Vec<Node>,
    current_class_id: Option<u32>,
    prediction_transform: PredictionTransform,
    reduction: Reduction,
    num_classes: usize,
    initial_offset: f64,
}

impl Default for ForestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ForestBuilder {
    pub fn new() -> Self {
        Self {
            state: BuilderState::Empty,
            features: Vec::new(),
            trees: Vec::new(),
            current_nodes: Vec::new(),
            current_class_id: None,
            prediction_transform: PredictionTransform::Identity,
            reduction: Reduction::Sum,
            num_classes: 0,
            initial_offset: 0.0,
        }
    }

    fn require_not_in_tree(&self, action: &str) -> Result<(), CanopyError> {
        if self.state == BuilderState::InTree {
            return Err(CanopyError::invalid_model(
                self.trees.len(),
                format!("cannot {action} while a tree is open"),
            ));
        }
        if self.state == BuilderState::Sealed {
            return Err(CanopyError::invalid_model(
                self.trees.len(),
                format!("cannot {action} after the forest has been persisted"),
            ));
        }
        Ok(())
    }

    pub fn add_feature(&mut self, name: impl Into<String>, kind: FeatureType) -> Result<(), CanopyError> {
        self.require_not_in_tree("add a feature")?;
        self.features.push(Feature {
            name: name.into(),
            kind,
        });
        Ok(())
    }

    pub fn set_prediction_transform(&mut self, transform: PredictionTransform) -> Result<(), CanopyError> {
        self.require_not_in_tree("set the prediction transform")?;
        self.prediction_transform = transform;
        Ok(())
    }

    pub fn set_reduction(&mut self, reduction: Reduction) -> Result<(), CanopyError> {
        self.require_not_in_tree("set the reduction")?;
        self.reduction = reduction;
        Ok(())
    }

    pub fn set_num_classes(&mut self, num_classes: usize) -> Result<(), CanopyError> {
        self.require_not_in_tree("set the class count")?;
        self.num_classes = num_classes;
        Ok(())
    }

    pub fn set_initial_offset(&mut self, offset: f64) -> Result<(), CanopyError> {
        self.require_not_in_tree("set the initial offset")?;
        self.initial_offset = offset;
        Ok(())
    }

    pub fn new_tree(&mut self) -> Result<(), CanopyError> {
        self.require_not_in_tree("start a new tree")?;
        self.current_nodes.clear();
        self.current_class_id = None;
        self.state = BuilderState::InTree;
        Ok(())
    }

    fn require_in_tree(&self, action: &str) -> Result<(), CanopyError> {
        if self.state != BuilderState::InTree {
            return Err(CanopyError::invalid_model(
                self.trees.len(),
                format!("cannot {action} outside an open tree"),
            ));
        }
        Ok(())
    }

    pub fn new_node(&mut self, threshold: f64, feature_index: i32) -> Result<NodeId, CanopyError> {
        self.require_in_tree("add a node")?;
        let id = NodeId::new(self.current_nodes.len());
        self.current_nodes.push(Node {
            threshold,
            feature_index,
            left: NodeId::INVALID,
            right: NodeId::INVALID,
            parent: NodeId::INVALID,
            tile_id: -1,
        });
        Ok(id)
    }

    pub fn set_left_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), CanopyError> {
        self.require_in_tree("wire a left child")?;
        self.current_nodes[parent.index()].left = child;
        self.current_nodes[child.index()].parent = parent;
        Ok(())
    }

    pub fn set_right_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), CanopyError> {
        self.require_in_tree("wire a right child")?;
        self.current_nodes[parent.index()].right = child;
        self.current_nodes[child.index()].parent = parent;
        Ok(())
    }

    pub fn set_tree_class_id(&mut self, class_id: u32) -> Result<(), CanopyError> {
        self.require_in_tree("set the tree class id")?;
        self.current_class_id = Some(class_id);
        Ok(())
    }

    /// Runs the self-check invariants from spec.md 4.1: every non-leaf has
    /// two valid children; leaves have feature index -1; the root's parent
    /// is INVALID; feature indices reference an existing feature.
    pub fn end_tree(&mut self) -> Result<(), CanopyError> {
        self.require_in_tree("end a tree")?;
        let tree_index = self.trees.len();
        if self.current_nodes.is_empty() {
            return Err(CanopyError::invalid_model(tree_index, "tree has no nodes"));
        }
        if self.current_nodes[0].parent.is_valid() {
            return Err(CanopyError::invalid_node(
                tree_index,
                0,
                "root's parent must be INVALID",
            ));
        }
        for (i, node) in self.current_nodes.iter().enumerate() {
            if node.is_leaf() {
                continue;
            }
            if node.left.is_invalid() || node.right.is_invalid() {
                return Err(CanopyError::invalid_node(
                    tree_index,
                    i,
                    "non-leaf node must have both children",
                ));
            }
            if !self.features.is_empty() && node.feature_index as usize >= self.features.len() {
                return Err(CanopyError::invalid_node(
                    tree_index,
                    i,
                    format!("feature index {} does not reference a known feature", node.feature_index),
                ));
            }
        }
        self.trees.push(Tree {
            nodes: std::mem::take(&mut self.current_nodes),
            tiling: None,
            class_id: self.current_class_id.take(),
        });
        self.state = BuilderState::BetweenTrees;
        Ok(())
    }

    pub fn persist(mut self) -> Result<Forest, CanopyError> {
        self.require_not_in_tree("persist the forest")?;
        self.state = BuilderState::Sealed;
        if self.num_classes >= 2 {
            for (i, tree) in self.trees.iter().enumerate() {
                if tree.class_id.is_none() {
                    return Err(CanopyError::invalid_model(
                        i,
                        "multiclass forest requires every tree to carry a class id",
                    ));
                }
            }
        }
        Ok(Forest {
            trees: self.trees,
            features: self.features,
            prediction_transform: self.prediction_transform,
            reduction: self.reduction,
            num_classes: self.num_classes,
            initial_offset: self.initial_offset,
        })
    }
}
