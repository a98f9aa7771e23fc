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
use std::path::PathBuf;
use thiserror::Error;

/// The IOFailure category of the compiler's error taxonomy: a missing or
/// malformed sidecar, or a packed buffer file that could not be read back.
#[derive(Debug, Error)]
pub enum ModelIoError {
    #[error("model sidecar not found at {0}")]
    SidecarMissing(PathBuf),

    #[error("model sidecar at {path} is malformed: {source}")]
    SidecarMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("packed buffer file not found at {0}")]
    BufferMissing(PathBuf),

    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
