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

// A persisted model is a JSON sidecar describing the layout parameters,
// next to a packed binary buffer file holding the actual tile records.
// The reorg layout additionally inlines its buffers directly into the
// sidecar, since it has no separate tile-record blob (see spec.md 6).
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelSidecar {
    pub layout: String,
    pub input_element_bit_width: u32,
    pub return_type_bit_width: u32,
    pub row_size: u32,
    pub batch_size: u32,
    pub number_of_trees: u32,
    pub number_of_classes: u32,

    pub tile_size: u32,
    pub threshold_type_width: u32,
    pub feature_index_type_width: u32,
    pub node_index_type_width: u32,
    pub tile_shape_bit_width: u32,
    pub child_index_bit_width: u32,

    /// Reorg layout only: per-node thresholds, interleaved tree-major.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Vec<f64>>,
    /// Reorg layout only: per-node feature indices, interleaved tree-major.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_indices: Option<Vec<i32>>,
    /// Multiclass only: per-tree class id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_ids: Option<Vec<i32>>,
}
