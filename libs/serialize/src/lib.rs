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

//! The serializer registry and layout-specific packers (C3/C4): turn
//! tiled trees into packed byte buffers plus a JSON sidecar, and hold the
//! per-process packed-buffer singleton the runtime initializer functions
//! read from.
mod array;
mod pack;
mod params;
mod registry;
mod reorg;
mod serializer;
mod sparse;
mod store;

pub use array::ArraySerializer;
pub use pack::{read_feature_index_le, read_record, read_threshold_le, PackedModel, SENTINEL_FEATURE_INDEX};
pub use params::PackingParams;
pub use registry::{create, register};
pub use reorg::ReorgSerializer;
pub use serializer::Serializer;
pub use sparse::SparseSerializer;
pub use store::{add_single_tree, clear_all_data, initialize_buffer, initialize_class_id_buffer, initialize_length_buffer, initialize_offset_buffer, persist};

#[cfg(test)]
mod tests {
    use super::*;
    use forest::{FeatureType, ForestBuilder, LEAF_FEATURE_INDEX};
    use tiling::{build_tiled_tree, TileColoring, UniformTiling};

    fn two_tree_forest() -> forest::Forest {
        let mut b = ForestBuilder::new();
        b.add_feature("f0", FeatureType::Numerical).unwrap();
        b.add_feature("f1", FeatureType::Numerical).unwrap();
        b.new_tree().unwrap();
        let root = b.new_node(0.5, 0).unwrap();
        let l = b.new_node(1.0, LEAF_FEATURE_INDEX).unwrap();
        let r = b.new_node(2.0, LEAF_FEATURE_INDEX).unwrap();
        b.set_left_child(root, l).unwrap();
        b.set_right_child(root, r).unwrap();
        b.end_tree().unwrap();
        b.new_tree().unwrap();
        let root = b.new_node(0.0, 1).unwrap();
        let l = b.new_node(-0.5, LEAF_FEATURE_INDEX).unwrap();
        let r = b.new_node(0.5, LEAF_FEATURE_INDEX).unwrap();
        b.set_left_child(root, l).unwrap();
        b.set_right_child(root, r).unwrap();
        b.end_tree().unwrap();
        b.persist().unwrap()
    }

    // Every layout packs the same tiled trees into nonempty buffers under
    // its own name. The actual execution equivalence against
    // `Forest::predict` (property 6, spec.md 8 scenarios (i)/(ii)) is
    // checked in `lowering`'s `compiled_forest_matches_reference_predict_across_layouts`,
    // which alone can drive a `Representation` through a compiled
    // `TargetProgram` without a dependency cycle back into this crate.
    #[test]
    fn array_sparse_reorg_pack_into_nonempty_named_buffers() {
        let forest = two_tree_forest();
        let params = PackingParams {
            tile_size: 1,
            threshold_width: 64,
            feature_index_width: 32,
        };

        let tiled: Vec<_> = forest
            .trees
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let coloring = UniformTiling { tile_size: 1 };
                let tiling = coloring.color(t);
                build_tiled_tree(i, t, &tiling).unwrap()
            })
            .collect();

        for name in ["array", "sparse", "reorg"] {
            let serializer = create(name).unwrap();
            let packed = serializer.serialize(&forest, &tiled, &params).unwrap();
            assert_eq!(packed.layout, name);
            assert!(!packed.model_bytes.is_empty());
        }
    }

    #[test]
    fn unsupported_widths_are_rejected_before_packing() {
        let forest = two_tree_forest();
        let params = PackingParams {
            tile_size: 1,
            threshold_width: 48,
            feature_index_width: 16,
        };
        let serializer = create("array").unwrap();
        let err = serializer.serialize(&forest, &[], &params).unwrap_err();
        assert!(matches!(err, forest::CanopyError::UnsupportedConfiguration(_)));
    }
}
