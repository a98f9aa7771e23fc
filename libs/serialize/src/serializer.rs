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

//! The serializer contract from spec.md 4.3: given a forest (and, for the
//! tiled layouts, its tiled trees) produce packed buffers plus enough
//! sidecar metadata for a receiver to reconstitute their shapes.
use crate::pack::PackedModel;
use crate::params::PackingParams;
use forest::{CanopyError, Forest};
use tiling::TiledTree;

pub trait Serializer: Send + Sync {
    fn layout_name(&self) -> &'static str;

    fn serialize(&self, forest: &Forest, tiled_trees: &[TiledTree], params: &PackingParams) -> Result<PackedModel, CanopyError>;

    fn sidecar(&self, forest: &Forest, packed: &PackedModel, batch_size: u32) -> model_io::ModelSidecar {
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
            thresholds: None,
            feature_indices: None,
            class_ids: packed.class_ids.clone(),
        }
    }
}
