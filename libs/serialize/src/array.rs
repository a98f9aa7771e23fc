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

//! The `array` layout (spec.md 4.4): tiles live at their implicit-heap
//! position (`child = tileSize*node + 1 + childNumber`), so unoccupied
//! heap slots must still reserve a full tile record's worth of space,
//! filled with sentinel thresholds/feature indices.
use crate::pack::{write_record, PackedModel, SENTINEL_FEATURE_INDEX};
use crate::params::PackingParams;
use crate::serializer::Serializer;
use forest::{CanopyError, Forest};
use tiling::{to_implicit_heap, TiledTree};

pub struct ArraySerializer;

impl Serializer for ArraySerializer {
    fn layout_name(&self) -> &'static str {
        "array"
    }

    fn serialize(&self, forest: &Forest, tiled_trees: &[TiledTree], params: &PackingParams) -> Result<PackedModel, CanopyError> {
        params.validate()?;
        let record_bytes = params.tile_record_bytes();
        let mut model_bytes = Vec::new();
        let mut offsets = Vec::with_capacity(tiled_trees.len());
        let mut lengths = Vec::with_capacity(tiled_trees.len());

        for tiled in tiled_trees {
            let heap = to_implicit_heap(tiled);
            if heap.is_empty() {
                offsets.push(-1);
                lengths.push(0);
                continue;
            }
            offsets.push((model_bytes.len() / record_bytes) as i32);
            lengths.push(heap.len() as i32);

            for slot in &heap {
                let mut record = vec![0u8; record_bytes];
                match slot {
                    Some(tile_index) => {
                        let tile = &tiled.tiles[*tile_index];
                        let thresholds: Vec<f64> = tile.nodes.iter().map(|n| tiled.nodes[n.index()].threshold).collect();
                        let feature_indices: Vec<i32> = tile.nodes.iter().map(|n| tiled.nodes[n.index()].feature_index).collect();
                        write_record(&mut record, params, &thresholds, &feature_indices);
                    }
                    None => {
                        let thresholds = vec![f64::NAN; params.tile_size as usize];
                        let feature_indices = vec![SENTINEL_FEATURE_INDEX; params.tile_size as usize];
                        write_record(&mut record, params, &thresholds, &feature_indices);
                    }
                }
                model_bytes.extend_from_slice(&record);
            }
        }

        let class_ids = forest.is_multiclass().then(|| forest.trees.iter().map(|t| t.class_id.unwrap_or(0) as i32).collect());

        Ok(PackedModel {
            layout: self.layout_name(),
            params: *params,
            model_bytes,
            offsets,
            lengths,
            class_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::read_record;
    use forest::{FeatureType, ForestBuilder, LEAF_FEATURE_INDEX};
    use tiling::{build_tiled_tree, TileColoring, UniformTiling};

    #[test]
    fn single_tile_tree_round_trips() {
        let mut b = ForestBuilder::new();
        b.add_feature("x", FeatureType::Numerical).unwrap();
        b.new_tree().unwrap();
        let root = b.new_node(0.5, 0).unwrap();
        let l = b.new_node(-1.0, LEAF_FEATURE_INDEX).unwrap();
        let r = b.new_node(1.0, LEAF_FEATURE_INDEX).unwrap();
        b.set_left_child(root, l).unwrap();
        b.set_right_child(root, r).unwrap();
        b.end_tree().unwrap();
        let forest = b.persist().unwrap();

        let coloring = UniformTiling { tile_size: 2 };
        let tiling = coloring.color(&forest.trees[0]);
        let tiled = build_tiled_tree(0, &forest.trees[0], &tiling).unwrap();

        let params = PackingParams {
            tile_size: 2,
            threshold_width: 32,
            feature_index_width: 16,
        };
        let packed = ArraySerializer.serialize(&forest, &[tiled], &params).unwrap();
        assert_eq!(packed.offsets, vec![0]);
        assert_eq!(params.tile_record_bytes(), 12);

        let (thresholds, feature_indices) = read_record(&packed.model_bytes[..12], &params);
        assert_eq!(thresholds[0], 0.5);
        assert_eq!(feature_indices[0], 0);
    }
}
