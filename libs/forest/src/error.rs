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

//! The error taxonomy from spec.md 7, shared by every stage of the
//! pipeline. None of these are recovered locally -- a pass that hits one
//! returns it up to the caller, which reports it and aborts the compile.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanopyError {
    /// An unsupported width combination, predicate, or ONNX shape. Fatal
    /// to the current compile; surfaced immediately.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// A tiling-descriptor mismatch, a tile without an entry node, a
    /// dummy-padding search that found no candidate, or a failed
    /// validation pass. Names the offending tree/node per spec.md 7.
    #[error("invalid model in tree {tree}{}: {reason}", node.map(|n| format!(", node {n}")).unwrap_or_default())]
    InvalidModel {
        tree: usize,
        node: Option<usize>,
        reason: String,
    },

    /// A rewrite pass returned failure from the driver.
    #[error("lowering failed in pass `{pass}`: {reason}")]
    LoweringFailure { pass: String, reason: String },

    /// A device allocation or memcpy failed at runtime.
    #[error("runtime initialization failed: {0}")]
    RuntimeInitFailure(String),
}

impl CanopyError {
    pub fn invalid_model(tree: usize, reason: impl Into<String>) -> Self {
        Self::InvalidModel {
            tree,
            node: None,
            reason: reason.into(),
        }
    }

    pub fn invalid_node(tree: usize, node: usize, reason: impl Into<String>) -> Self {
        Self::InvalidModel {
            tree,
            node: Some(node),
            reason: reason.into(),
        }
    }
}
