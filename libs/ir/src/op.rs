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

//! The forest op library (spec.md 4.5/4.6): the vocabulary `lowering`
//! builds programs out of. `build_walk_program` assembles one tree's walk
//! the way the reference interpreter in `crate::walk` executes it, with an
//! optional peel factor that statically unrolls the tile loop's first K
//! iterations before falling back to a generic loop for the remainder.
#[derive(Clone, Debug, PartialEq)]
pub enum ForestOp {
    /// Binds the packed buffers for one tree (the per-process singleton,
    /// or a standalone buffer when running outside the compile/run sequence).
    EnsembleConstant { tree_index: usize, layout: &'static str },
    GetRoot { tree_index: usize },
    TraverseTreeTile { tree_index: usize },
    LoadTileThresholds { tree_index: usize },
    LoadTileFeatureIndices { tree_index: usize },
    IsLeafTile { tree_index: usize },
    IsLeaf { tree_index: usize },
    GetLeafValue { tree_index: usize },
    /// The unrolled remainder after `peel` static iterations, or the whole
    /// walk when no peeling was requested.
    Loop { body: Vec<ForestOp> },
}

fn tile_step(tree_index: usize) -> Vec<ForestOp> {
    vec![
        ForestOp::TraverseTreeTile { tree_index },
        ForestOp::LoadTileThresholds { tree_index },
        ForestOp::LoadTileFeatureIndices { tree_index },
        ForestOp::IsLeafTile { tree_index },
    ]
}

/// `WalkDecisionTree`, optionally `WalkDecisionTreePeeled` when `peel` is set.
pub fn build_walk_program(tree_index: usize, layout: &'static str, peel: Option<u32>) -> Vec<ForestOp> {
    let mut ops = vec![ForestOp::EnsembleConstant { tree_index, layout }, ForestOp::GetRoot { tree_index }];
    match peel {
        Some(k) => {
            for _ in 0..k {
                ops.extend(tile_step(tree_index));
            }
            ops.push(ForestOp::Loop { body: tile_step(tree_index) });
        }
        None => ops.push(ForestOp::Loop { body: tile_step(tree_index) }),
    }
    ops.push(ForestOp::GetLeafValue { tree_index });
    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peeling_unrolls_the_requested_iteration_count() {
        let program = build_walk_program(0, "array", Some(2));
        let unrolled_steps = program.iter().filter(|op| matches!(op, ForestOp::TraverseTreeTile { .. })).count();
        // 2 peeled + 1 inside the trailing Loop body.
        assert_eq!(unrolled_steps, 2);
        assert!(matches!(program.last(), Some(ForestOp::GetLeafValue { .. })));
        let loop_body_steps = program.iter().find_map(|op| if let ForestOp::Loop { body } = op { Some(body.len()) } else { None });
        assert_eq!(loop_body_steps, Some(4));
    }

    #[test]
    fn unpeeled_program_has_a_single_loop() {
        let program = build_walk_program(3, "sparse", None);
        assert_eq!(program.iter().filter(|op| matches!(op, ForestOp::Loop { .. })).count(), 1);
    }
}
