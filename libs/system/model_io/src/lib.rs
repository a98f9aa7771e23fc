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

//! Reads and writes the two files a compiled model lives in on disk: a JSON
//! sidecar (layout parameters) and a packed binary buffer (tile records).
//! This is the out-of-process half of the serializer contract in
//! spec.md 4.3 -- the in-process half lives in the `serialize` crate.

mod error;
mod sidecar;

pub use crate::{error::ModelIoError, sidecar::ModelSidecar};

use std::{fs, path::Path};
use tracing::debug;

pub fn write_sidecar(path: &Path, sidecar: &ModelSidecar) -> Result<(), ModelIoError> {
    let json = serde_json::to_string_pretty(sidecar).expect("ModelSidecar always serializes");
    fs::write(path, json).map_err(|source| ModelIoError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "wrote model sidecar");
    Ok(())
}

pub fn read_sidecar(path: &Path) -> Result<ModelSidecar, ModelIoError> {
    let text = fs::read_to_string(path).map_err(|_| ModelIoError::SidecarMissing(path.to_path_buf()))?;
    serde_json::from_str(&text).map_err(|source| ModelIoError::SidecarMalformed {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_packed_buffer(path: &Path, bytes: &[u8]) -> Result<(), ModelIoError> {
    fs::write(path, bytes).map_err(|source| ModelIoError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = bytes.len(), "wrote packed model buffer");
    Ok(())
}

pub fn read_packed_buffer(path: &Path) -> Result<Vec<u8>, ModelIoError> {
    fs::read(path).map_err(|_| ModelIoError::BufferMissing(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sidecar_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let sidecar = ModelSidecar {
            layout: "array".to_string(),
            input_element_bit_width: 32,
            return_type_bit_width: 64,
            row_size: 2,
            batch_size: 1,
            number_of_trees: 2,
            number_of_classes: 0,
            tile_size: 1,
            threshold_type_width: 64,
            feature_index_type_width: 16,
            node_index_type_width: 32,
            tile_shape_bit_width: 8,
            child_index_bit_width: 8,
            thresholds: None,
            feature_indices: None,
            class_ids: None,
        };
        write_sidecar(&path, &sidecar).unwrap();
        let read_back = read_sidecar(&path).unwrap();
        assert_eq!(read_back, sidecar);
    }

    #[test]
    fn missing_sidecar_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(matches!(
            read_sidecar(&path),
            Err(ModelIoError::SidecarMissing(_))
        ));
    }
}
