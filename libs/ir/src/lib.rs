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

//! The forest intermediate representation (C5/C6): a representation
//! registry abstracting how each packed layout addresses its tiles
//! (spec.md 4.4), a small typed op library describing a tree walk
//! (spec.md 4.5/4.6), and the reference interpreter both `lowering` and
//! this crate's own tests check packed execution against.
mod op;
mod representation;
mod walk;

pub use op::{build_walk_program, ForestOp};
pub use representation::{for_layout, ArrayRepresentation, ReorgRepresentation, Representation, SparseRepresentation};
pub use walk::{traverse_tree_tile, walk_packed, walk_tiled_tree, TileStep};
