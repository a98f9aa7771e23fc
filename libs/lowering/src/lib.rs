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

//! Walk lowering and the CPU backend (C7/C8): compiles a tiled tree into a
//! flat `TargetProgram` addressed entirely through an `ir::Representation`,
//! then reduces one `TargetProgram` per tree into a whole-forest prediction.
mod forest_program;
mod target;

pub use forest_program::CompiledForest;
pub use target::{compile_tree, TargetInstr, TargetProgram};
