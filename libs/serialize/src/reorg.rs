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

//! The `reorg` layout (spec.md 4.3): per-node rather than per-tile,
//! interleaving node *i* of every tree at `i * numTrees + treeIndex`.
//! Operates on the raw forest directly -- reorg has no tiles, so the
//! `tiled_trees` argument is ignored. Tuned for GPU coalesced access:
//! a thread block reading one heap level reads contiguous memory across
//! all trees at once.
use crate::pack::{write_feature_index_le, write_threshold_le, PackedModel, SENTINEL_FEATURE_INDEX};
use crate::params::PackingParams;
use crate::serializer::Serializer;
use forest::{CanopyError, Forest, NodeId, Tree};
use tiling::TiledTree;

fn node_depth(tree: &Tree, id: NodeId) -> usize {
    let node = tree.node(id);
    if node.is_leaf() {
        1
    } else {
        1 + node_depth(tree, node.left).max(node_depth(tree, node.right))
    }
}

/// Heap position of every node, root at 0, using the binary stride the
/// reorg layout shares with a tile-size-1 array layout (`2*node+1+child`).
fn heap_positions(tree: &Tree) -> Vec<usize> {
    let mut positions = vec![0usize; tree.len()];
    let mut stack = vec![(tree.root(), 0usize)];
    while let Some((id, pos)) = stack.pop() {
        positions[id.index()] = pos;
        let node = tree.node(id);
        if !node.is_leaf() {
            stack.push((node.left, 2 * pos + 1));
            stack.push((node.right, 2 * pos + 2));
        }
    }
    positions
}

pub struct ReorgSerializer;

impl Serializer for ReorgSerializer {
    fn layout_name(&self) -> &'static str {
        "reorg"
    }

    fn serialize(&self, forest: &Forest, _tiled_trees: &[TiledTree], params: &PackingParams) -> Result<PackedModel, CanopyError> {
        params.validate()?;
        let num_trees = forest.trees.len();
        let depth = forest.trees.iter().map(|t| if t.is_empty() { 0 } else { node_depth(t, t.root()) }).max().unwrap_or(0);
        let slots_per_tree = if depth == 0 { 0 } else { (1usize << depth) - 1 };
        let total_slots = slots_per_tree * num_trees;

        let wt = (params.threshold_width / 8) as usize;
        let wi = (params.feature_index_width / 8) as usize;
        let mut thresholds = vec![0u8; total_slots * wt];
        let mut feature_indices = vec![0u8; total_slots * wi];
        for slot in 0..total_slots {
            write_threshold_le(&mut thresholds[slot * wt..], params.threshold_width, f64::NAN);
            write_feature_index_le(&mut feature_indices[slot * wi..], params.feature_index_width, SENTINEL_FEATURE_INDEX);
        }

        for (tree_index, tree) in forest.trees.iter().enumerate() {
            if tree.is_empty() {
                continue;
            }
            let positions = heap_positions(tree);
            for node_index in 0..tree.len() {
                let pos = positions[node_index];
                if pos >= slots_per_tree {
                    continue;
                }
                let slot = pos * num_trees + tree_index;
                let node = tree.node(NodeId::new(node_index));
                write_threshold_le(&mut thresholds[slot * wt..], params.threshold_width, node.threshold);
                write_feature_index_le(&mut feature_indices[slot * wi..], params.feature_index_width, node.feature_index);
            }
        }

        let mut model_bytes = thresholds;
        model_bytes.extend_from_slice(&feature_indices);

        let class_ids = forest.is_multiclass().then(|| forest.trees.iter().map(|t| t.class_id.unwrap_or(0) as i32).collect());

        Ok(PackedModel {
            layout: self.layout_name(),
            params: *params,
            model_bytes,
            offsets: vec![0; num_trees],
            lengths: vec![slots_per_tree as i32; num_trees],
            class_ids,
        })
    }

    fn sidecar(&self, forest: &Forest, packed: &PackedModel, batch_size: u32) -> model_io::ModelSidecar {
        let wt = (packed.params.threshold_width / 8) as usize;
        let wi = (packed.params.feature_index_width / 8) as usize;
        let threshold_bytes = &packed.model_bytes[..packed.model_bytes.len() - packed.lengths.iter().sum::<i32>() as usize * wi];
        let feature_bytes = &packed.model_bytes[threshold_bytes.len()..];
        let thresholds: Vec<f64> = threshold_bytes.chunks(wt).map(|c| crate::pack::read_threshold_le(c, packed.params.threshold_width)).collect();
        let feature_indices: Vec<i32> = feature_bytes.chunks(wi).map(|c| crate::pack::read_feature_index_le(c, packed.params.feature_index_width)).collect();

        model_io::ModelSidecar {
            layout: self.layout_name().to_string(),
            input_element_bit_width: 64,
            return_type_bit_width: 64,
            row_size: forest.row_width() as u32,
            batch_size,
            number_of_trees: forest.trees.len() as u32,
            number_of_classes: forest.num_classes as u32,
            tile_size: packed.params.tile_size,
            threshold_type_width: packed.params.threshold_width,
            feature_index_type_width: packed.params.feature_index_width,
            node_index_type_width: 32,
            tile_shape_bit_width: 8,
            child_index_bit_width: 32,
            thresholds: Some(thresholds),
            feature_indices: Some(feature_indices),
            class_ids: packed.class_ids.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forest::{FeatureType, ForestBuilder, LEAF_FEATURE_INDEX};

    #[test]
    fn interleaves_two_trees_by_level() {
        let mut b = ForestBuilder::new();
        b.add_feature("x", FeatureType::Numerical).unwrap();
        for (threshold, left, right) in [(0.5, -1.0, 1.0), (0.0, -0.5, 0.5)] {
            b.new_tree().unwrap();
            let root = b.new_node(threshold, 0).unwrap();
            let l = b.new_node(left, LEAF_FEATURE_INDEX).unwrap();
            let r = b.new_node(right, LEAF_FEATURE_INDEX).unwrap();
            b.set_left_child(root, l).unwrap();
            b.set_right_child(root, r).unwrap();
            b.end_tree().unwrap();
        }
        let forest = b.persist().unwrap();
        let params = PackingParams {
            tile_size: 1,
            threshold_width: 64,
            feature_index_width: 32,
        };
        let packed = ReorgSerializer.serialize(&forest, &[], &params).unwrap();
        let sidecar = ReorgSerializer.sidecar(&forest, &packed, 1);
        let thresholds = sidecar.thresholds.unwrap();
        // depth 2 -> 3 slots/tree, interleaved tree-major per slot.
        assert_eq!(thresholds.len(), 3 * 2);
        assert_eq!(thresholds[0], 0.5);
        assert_eq!(thresholds[1], 0.0);
    }
}
