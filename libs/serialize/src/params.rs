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

//! The packing rule from spec.md 4.3: tile size T, threshold width Wt,
//! feature-index width Wi determine a tile record's byte layout with no
//! alignment padding.
use forest::CanopyError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackingParams {
    pub tile_size: u32,
    pub threshold_width: u32,
    pub feature_index_width: u32,
}

impl PackingParams {
    pub fn validate(&self) -> Result<(), CanopyError> {
        if !matches!(self.threshold_width, 32 | 64) {
            return Err(CanopyError::UnsupportedConfiguration(format!(
                "threshold width {} not in {{32, 64}}",
                self.threshold_width
            )));
        }
        if !matches!(self.feature_index_width, 8 | 16 | 32) {
            return Err(CanopyError::UnsupportedConfiguration(format!(
                "feature index width {} not in {{8, 16, 32}}",
                self.feature_index_width
            )));
        }
        if self.tile_size == 0 {
            return Err(CanopyError::UnsupportedConfiguration("tile size must be >= 1".to_string()));
        }
        Ok(())
    }

    /// Byte offset of the feature-index region within a tile record.
    pub fn feature_index_offset(&self) -> usize {
        (self.tile_size as usize * self.threshold_width as usize) / 8
    }

    /// Byte size of one tile record: `T * (Wt + Wi) / 8`.
    pub fn tile_record_bytes(&self) -> usize {
        self.tile_size as usize * (self.threshold_width as usize + self.feature_index_width as usize) / 8
    }
}
