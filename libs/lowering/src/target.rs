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

//! The CPU backend (C8, spec.md 4.6): lowers one tree's tiled structure
//! into a flat `TargetProgram`, a sequence of `TargetInstr` that only ever
//! touch the packed buffer through a `Representation` -- no reference back
//! to the source tree survives compilation, same as a real backend handing
//! off a finished object to a loader that never sees the frontend's IR.
use ir::Representation;
use serde::{Deserialize, Serialize};
use serialize::PackedModel;
use tiling::{Tile, TiledTree};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TargetInstr {
    /// Loads the tile at `address`, compares `row[feature_index]` against
    /// `threshold` at `local_idx` within it, and jumps accordingly.
    Branch { address: i32, local_idx: usize, if_true: usize, if_false: usize },
    /// Loads the leaf value at `address` and returns it.
    Return { address: i32 },
}

/// Persisted as one entry of a model's `program.json` (spec.md 4.6's
/// "executable code...attached to host module"): this is what `run` loads
/// back instead of recompiling from the source forest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetProgram {
    pub tree_index: usize,
    pub entry_pc: usize,
    pub instrs: Vec<TargetInstr>,
}

impl TargetProgram {
    pub fn execute(&self, representation: &dyn Representation, model: &PackedModel, row: &[f64]) -> f64 {
        let mut pc = self.entry_pc;
        loop {
            match &self.instrs[pc] {
                TargetInstr::Return { address } => return representation.get_leaf_value(model, self.tree_index, *address),
                TargetInstr::Branch { address, local_idx, if_true, if_false } => {
                    let (thresholds, feature_indices) = representation.load_tile(model, self.tree_index, *address);
                    let goes_right = row[feature_indices[*local_idx] as usize] >= thresholds[*local_idx];
                    pc = if goes_right { *if_true } else { *if_false };
                }
            }
        }
    }
}

/// Walk lowering (C7): compiles `WalkDecisionTree`/`WalkDecisionTreePeeled`
/// for one tree into a `TargetProgram`. Peeling is moot for this backend --
/// the whole tree is already unrolled into a flat instruction list, the
/// same end state `ir::build_walk_program`'s peel factor is aiming for --
/// so there is nothing left for a peel factor to do here; it only changes
/// the GPU kernel outlining pass (`gpu_backend`), which schedules work in
/// fixed-size waves instead of unrolling a CPU jump table.
pub fn compile_tree(representation: &dyn Representation, model: &PackedModel, tiled: &TiledTree, tree_index: usize) -> TargetProgram {
    let mut instrs = Vec::new();
    let root_address = representation.root_address(model, tree_index);
    let entry_pc = compile_node(tiled, 0, root_address, representation, model, tree_index, &mut instrs);
    TargetProgram { tree_index, entry_pc, instrs }
}

fn compile_node(
    tiled: &TiledTree,
    tile_index: usize,
    address: i32,
    representation: &dyn Representation,
    model: &PackedModel,
    tree_index: usize,
    instrs: &mut Vec<TargetInstr>,
) -> usize {
    let tile = &tiled.tiles[tile_index];
    let child_pcs: Vec<usize> = tile
        .child_tiles
        .iter()
        .enumerate()
        .map(|(child_number, &child_tile_index)| {
            let child_address = representation.child_address(model, tree_index, address, child_number);
            compile_node(tiled, child_tile_index, child_address, representation, model, tree_index, instrs)
        })
        .collect();
    compile_tile(tiled, tile, address, &child_pcs, instrs)
}

fn compile_tile(tiled: &TiledTree, tile: &Tile, address: i32, child_pcs: &[usize], instrs: &mut Vec<TargetInstr>) -> usize {
    if tile.is_leaf_tile() && tiled.nodes[tile.entry().index()].is_leaf() {
        let pc = instrs.len();
        instrs.push(TargetInstr::Return { address });
        return pc;
    }

    let base = instrs.len();
    instrs.resize(base + tile.nodes.len(), TargetInstr::Return { address: -1 });
    for (local_idx, &node_id) in tile.nodes.iter().enumerate().rev() {
        let node = &tiled.nodes[node_id.index()];
        let resolve = |target: forest::NodeId| -> usize {
            if let Some(pos) = tile.nodes.iter().position(|&n| n == target) {
                base + pos
            } else {
                let child_number = tile
                    .child_tiles
                    .iter()
                    .position(|&idx| tiled.tiles[idx].entry() == target)
                    .expect("boundary edge must land on a child tile's entry node");
                child_pcs[child_number]
            }
        };
        instrs[base + local_idx] = TargetInstr::Branch {
            address,
            local_idx,
            if_true: resolve(node.right),
            if_false: resolve(node.left),
        };
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use forest::{FeatureType, Forest, ForestBuilder, LEAF_FEATURE_INDEX};
    use ir::for_layout;
    use serialize::{create, PackingParams};
    use tiling::{build_tiled_tree, TileColoring, UniformTiling};

    fn deep_tree_forest() -> Forest {
        let mut b = ForestBuilder::new();
        b.add_feature("x", FeatureType::Numerical).unwrap();
        b.new_tree().unwrap();
        let root = b.new_node(0.0, 0).unwrap();
        let l = b.new_node(1.0, 0).unwrap();
        let r = b.new_node(2.0, 0).unwrap();
        b.set_left_child(root, l).unwrap();
        b.set_right_child(root, r).unwrap();
        let ll = b.new_node(-1.0, LEAF_FEATURE_INDEX).unwrap();
        let lr = b.new_node(-2.0, LEAF_FEATURE_INDEX).unwrap();
        let rl = b.new_node(-3.0, LEAF_FEATURE_INDEX).unwrap();
        let rr = b.new_node(-4.0, LEAF_FEATURE_INDEX).unwrap();
        b.set_left_child(l, ll).unwrap();
        b.set_right_child(l, lr).unwrap();
        b.set_left_child(r, rl).unwrap();
        b.set_right_child(r, rr).unwrap();
        b.end_tree().unwrap();
        b.persist().unwrap()
    }

    #[test]
    fn compiled_program_matches_source_walk_for_every_layout_and_tile_size() {
        let forest = deep_tree_forest();
        let tree = &forest.trees[0];
        for tile_size in [1u32, 2, 3] {
            let coloring = UniformTiling { tile_size };
            let tiling = coloring.color(tree);
            let tiled = build_tiled_tree(0, tree, &tiling).unwrap();
            let params = PackingParams { tile_size, threshold_width: 64, feature_index_width: 32 };

            for layout in ["array", "sparse"] {
                let serializer = create(layout).unwrap();
                let packed = serializer.serialize(&forest, std::slice::from_ref(&tiled), &params).unwrap();
                let representation = for_layout(layout).unwrap();
                let program = compile_tree(representation.as_ref(), &packed, &tiled, 0);

                for x in [-0.5, 0.5, 1.5] {
                    let row = [x];
                    let expected = tree.walk(&row);
                    let actual = program.execute(representation.as_ref(), &packed, &row);
                    assert_eq!(expected, actual, "layout={layout} tile_size={tile_size} x={x}");
                }
            }
        }
    }
}
