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

//! The forest data model (C1): trees of decision nodes grouped into an
//! ensemble, plus the builder that constructs one under the invariants
//! spec.md 4.1 requires and the reference (untiled) walk semantics every
//! later representation is checked against.
mod builder;
mod error;
mod forest;
mod node;
mod onnx;
mod tree;

pub use builder::ForestBuilder;
pub use error::CanopyError;
pub use forest::{Feature, FeatureType, Forest, PredictionTransform, Reduction};
pub use node::{Node, NodeId, LEAF_FEATURE_INDEX};
pub use onnx::{ModelImporter, OnnxAttributes, OnnxPredicate, OnnxTreeEnsembleImporter};
pub use tree::{TilingDescriptor, Tree};
