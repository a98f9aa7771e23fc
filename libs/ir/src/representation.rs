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

//! The representation interface (spec.md 4.4): the handful of address
//! computations a generated walk needs, factored out so the rest of the
//! walk-lowering logic (`crate::walk`) stays layout-agnostic. One impl per
//! packed layout; each mirrors the read side of its `serialize` writer.
use serialize::{read_feature_index_le, read_record, read_threshold_le, PackedModel, SENTINEL_FEATURE_INDEX};

/// An address is opaque outside its own representation: a record index for
/// `array`, a dense tile index for `sparse`, a heap position for `reorg`.
pub trait Representation: Send + Sync {
    fn layout_name(&self) -> &'static str;

    /// (i)/(ii): where tree `tree_index`'s root tile lives.
    fn root_address(&self, model: &PackedModel, tree_index: usize) -> i32;

    /// (iii): move from one tile to the child reached by boundary edge
    /// `child_number` (its position in `Tile::child_tiles`).
    fn child_address(&self, model: &PackedModel, tree_index: usize, from_address: i32, child_number: usize) -> i32;

    /// (iv)
    fn is_leaf_tile(&self, model: &PackedModel, tree_index: usize, address: i32) -> bool;

    /// (v)
    fn get_leaf_value(&self, model: &PackedModel, tree_index: usize, address: i32) -> f64;

    /// (vi, partial): the thresholds/feature indices a non-leaf tile holds,
    /// in the same node order the tiled tree builder produced.
    fn load_tile(&self, model: &PackedModel, tree_index: usize, address: i32) -> (Vec<f64>, Vec<i32>);
}

pub struct ArrayRepresentation;

impl ArrayRepresentation {
    fn record_at<'a>(&self, model: &'a PackedModel, address: i32) -> &'a [u8] {
        let record_bytes = model.params.tile_record_bytes();
        let start = address as usize * record_bytes;
        &model.model_bytes[start..start + record_bytes]
    }
}

impl Representation for ArrayRepresentation {
    fn layout_name(&self) -> &'static str {
        "array"
    }

    fn root_address(&self, model: &PackedModel, tree_index: usize) -> i32 {
        model.offsets[tree_index]
    }

    fn child_address(&self, model: &PackedModel, tree_index: usize, from_address: i32, child_number: usize) -> i32 {
        let base = model.offsets[tree_index];
        let local = from_address - base;
        let stride = model.params.tile_size as i64 + 1;
        let next_local = local as i64 * stride + 1 + child_number as i64;
        base + next_local as i32
    }

    fn is_leaf_tile(&self, model: &PackedModel, _tree_index: usize, address: i32) -> bool {
        let record = self.record_at(model, address);
        let wt = (model.params.threshold_width / 8) as usize;
        read_feature_index_le(&record[model.params.tile_size as usize * wt..], model.params.feature_index_width) == SENTINEL_FEATURE_INDEX
    }

    fn get_leaf_value(&self, model: &PackedModel, _tree_index: usize, address: i32) -> f64 {
        let record = self.record_at(model, address);
        read_threshold_le(record, model.params.threshold_width)
    }

    fn load_tile(&self, model: &PackedModel, _tree_index: usize, address: i32) -> (Vec<f64>, Vec<i32>) {
        read_record(self.record_at(model, address), &model.params)
    }
}

pub struct SparseRepresentation;

const TILE_SHAPE_BYTES: usize = 1;
const CHILD_INDEX_BYTES: usize = 4;

impl SparseRepresentation {
    fn record_bytes(params: &serialize::PackingParams) -> usize {
        params.tile_record_bytes() + TILE_SHAPE_BYTES + CHILD_INDEX_BYTES
    }

    fn record_at<'a>(&self, model: &'a PackedModel, address: i32) -> &'a [u8] {
        let record_bytes = Self::record_bytes(&model.params);
        let start = address as usize * record_bytes;
        &model.model_bytes[start..start + record_bytes]
    }
}

impl Representation for SparseRepresentation {
    fn layout_name(&self) -> &'static str {
        "sparse"
    }

    fn root_address(&self, model: &PackedModel, tree_index: usize) -> i32 {
        model.offsets[tree_index]
    }

    fn child_address(&self, model: &PackedModel, tree_index: usize, from_address: i32, child_number: usize) -> i32 {
        let _ = tree_index;
        let record = self.record_at(model, from_address);
        let trailer = model.params.tile_record_bytes() + TILE_SHAPE_BYTES;
        let first_child = i32::from_le_bytes(record[trailer..trailer + CHILD_INDEX_BYTES].try_into().unwrap());
        first_child + child_number as i32
    }

    fn is_leaf_tile(&self, model: &PackedModel, _tree_index: usize, address: i32) -> bool {
        let record = self.record_at(model, address);
        record[model.params.tile_record_bytes()] == 0
    }

    fn get_leaf_value(&self, model: &PackedModel, _tree_index: usize, address: i32) -> f64 {
        let record = self.record_at(model, address);
        read_threshold_le(record, model.params.threshold_width)
    }

    fn load_tile(&self, model: &PackedModel, _tree_index: usize, address: i32) -> (Vec<f64>, Vec<i32>) {
        let record = self.record_at(model, address);
        read_record(&record[..model.params.tile_record_bytes()], &model.params)
    }
}

/// `reorg` has no tiles: every "tile" is exactly one node, and addresses are
/// binary heap positions shared across every tree in the forest (spec.md
/// 4.3). `child_number` is 0 (left) or 1 (right).
pub struct ReorgRepresentation;

impl ReorgRepresentation {
    fn slots_per_tree(model: &PackedModel) -> usize {
        model.lengths.first().copied().unwrap_or(0) as usize
    }

    fn slot(&self, model: &PackedModel, tree_index: usize, heap_pos: i32) -> usize {
        heap_pos as usize * model.offsets.len() + tree_index
    }
}

impl Representation for ReorgRepresentation {
    fn layout_name(&self) -> &'static str {
        "reorg"
    }

    fn root_address(&self, _model: &PackedModel, _tree_index: usize) -> i32 {
        0
    }

    fn child_address(&self, _model: &PackedModel, _tree_index: usize, from_address: i32, child_number: usize) -> i32 {
        2 * from_address + 1 + child_number as i32
    }

    fn is_leaf_tile(&self, model: &PackedModel, tree_index: usize, address: i32) -> bool {
        let num_trees = model.offsets.len();
        let total_slots = Self::slots_per_tree(model) * num_trees;
        let wt = (model.params.threshold_width / 8) as usize;
        let wi = (model.params.feature_index_width / 8) as usize;
        let slot = self.slot(model, tree_index, address);
        let feature_bytes = &model.model_bytes[total_slots * wt + slot * wi..];
        read_feature_index_le(feature_bytes, model.params.feature_index_width) == SENTINEL_FEATURE_INDEX
    }

    fn get_leaf_value(&self, model: &PackedModel, tree_index: usize, address: i32) -> f64 {
        let wt = (model.params.threshold_width / 8) as usize;
        let slot = self.slot(model, tree_index, address);
        read_threshold_le(&model.model_bytes[slot * wt..], model.params.threshold_width)
    }

    fn load_tile(&self, model: &PackedModel, tree_index: usize, address: i32) -> (Vec<f64>, Vec<i32>) {
        let num_trees = model.offsets.len();
        let total_slots = Self::slots_per_tree(model) * num_trees;
        let wt = (model.params.threshold_width / 8) as usize;
        let wi = (model.params.feature_index_width / 8) as usize;
        let slot = self.slot(model, tree_index, address);
        let feature_bytes = &model.model_bytes[total_slots * wt + slot * wi..];
        let feature_index = read_feature_index_le(feature_bytes, model.params.feature_index_width);
        (vec![self.get_leaf_value(model, tree_index, address)], vec![feature_index])
    }
}

pub fn for_layout(name: &str) -> Option<Box<dyn Representation>> {
    match name {
        "array" | "gpu_array" => Some(Box::new(ArrayRepresentation)),
        "sparse" => Some(Box::new(SparseRepresentation)),
        "reorg" | "gpu_reorg" => Some(Box::new(ReorgRepresentation)),
        _ => None,
    }
}
