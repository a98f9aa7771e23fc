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

//! The `sparse` layout (spec.md 4.4): move-to-child reads an explicit
//! child-index field from the tile record instead of using heap
//! arithmetic, so tiles pack densely with no unoccupied-slot padding.
//! Each record additionally carries a tile-shape id and the global index
//! of its first child tile; later children are assumed contiguous, which
//! holds for every tile this crate's builder produces (see DESIGN.md).
use crate::pack::{write_record, PackedModel};
use crate::params::PackingParams;
use crate::serializer::Serializer;
use forest::{CanopyError, Forest};
use tiling::TiledTree;

const TILE_SHAPE_BYTES: usize = 1;
const CHILD_INDEX_BYTES: usize = 4;

pub struct SparseSerializer;

impl SparseSerializer {
    fn trailer_offset(params: &PackingParams) -> usize {
        params.tile_record_bytes()
    }
}

impl Serializer for SparseSerializer {
    fn layout_name(&self) -> &'static str {
        "sparse"
    }

    fn serialize(&self, forest: &Forest, tiled_trees: &[TiledTree], params: &PackingParams) -> Result<PackedModel, CanopyError> {
        params.validate()?;
        let record_bytes = Self::trailer_offset(params) + TILE_SHAPE_BYTES + CHILD_INDEX_BYTES;
        let mut model_bytes = Vec::new();
        let mut offsets = Vec::with_capacity(tiled_trees.len());
        let mut lengths = Vec::with_capacity(tiled_trees.len());
        let mut global_tile_base = 0i32;

        for tiled in tiled_trees {
            if tiled.tiles.is_empty() {
                offsets.push(-1);
                lengths.push(0);
                continue;
            }
            offsets.push(global_tile_base);
            lengths.push(tiled.tiles.len() as i32);

            for tile in &tiled.tiles {
                let thresholds: Vec<f64> = tile.nodes.iter().map(|n| tiled.nodes[n.index()].threshold).collect();
                let feature_indices: Vec<i32> = tile.nodes.iter().map(|n| tiled.nodes[n.index()].feature_index).collect();
                let mut record = vec![0u8; record_bytes];
                write_record(&mut record[..Self::trailer_offset(params)], params, &thresholds, &feature_indices);

                // `Tile::is_leaf_tile` merely checks singleton size, which is
                // also true of every tile under tile_size=1: check the node
                // itself so that shape_id actually marks a tree leaf.
                let shape_id: u8 = if tiled.nodes[tile.entry().index()].is_leaf() { 0 } else { 1 };
                record[Self::trailer_offset(params)] = shape_id;

                let child_index: i32 = tile
                    .child_tiles
                    .first()
                    .map(|&idx| global_tile_base + idx as i32)
                    .unwrap_or(-1);
                let trailer = Self::trailer_offset(params) + TILE_SHAPE_BYTES;
                record[trailer..trailer + CHILD_INDEX_BYTES].copy_from_slice(&child_index.to_le_bytes());

                model_bytes.extend_from_slice(&record);
            }
            global_tile_base += tiled.tiles.len() as i32;
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
    use forest::{FeatureType, ForestBuilder, LEAF_FEATURE_INDEX};
    use tiling::{build_tiled_tree, TileColoring, UniformTiling};

    #[test]
    fn packs_one_record_per_tile_with_no_holes() {
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

        let coloring = UniformTiling { tile_size: 1 };
        let tiling = coloring.color(&forest.trees[0]);
        let tiled = build_tiled_tree(0, &forest.trees[0], &tiling).unwrap();
        let tile_count = tiled.tiles.len();

        let params = PackingParams {
            tile_size: 1,
            threshold_width: 32,
            feature_index_width: 16,
        };
        let packed = SparseSerializer.serialize(&forest, &[tiled], &params).unwrap();
        let record_bytes = params.tile_record_bytes() + TILE_SHAPE_BYTES + CHILD_INDEX_BYTES;
        assert_eq!(packed.model_bytes.len(), record_bytes * tile_count);
        assert_eq!(packed.lengths, vec![tile_count as i32]);
    }
}
