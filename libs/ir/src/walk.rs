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

//! `TraverseTreeTile` (spec.md 4.5): decide, within one tile, which node to
//! evaluate next, until either a leaf value or a tile-boundary edge is
//! reached. Layout-agnostic -- every packed representation walks the same
//! tiled tree, they just disagree on how to address the next tile.
use forest::NodeId;
use tiling::{Tile, TiledTree};

use crate::representation::Representation;
use serialize::PackedModel;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TileStep {
    Leaf(f64),
    /// Exits to the child tile at this position in `Tile::child_tiles`.
    Exit { child_number: usize },
}

/// Runs one tile's internal decision sequence against `row`.
pub fn traverse_tree_tile(tiled: &TiledTree, tile: &Tile, row: &[f64]) -> TileStep {
    let mut node_id: NodeId = tile.entry();
    loop {
        let node = &tiled.nodes[node_id.index()];
        if node.is_leaf() {
            return TileStep::Leaf(node.threshold);
        }
        let next = if node.goes_right(row) { node.right } else { node.left };
        if tile.nodes.contains(&next) {
            node_id = next;
            continue;
        }
        let child_number = tile
            .child_tiles
            .iter()
            .position(|&idx| tiled.tiles[idx].entry() == next)
            .expect("boundary edge must land on a child tile's entry node");
        return TileStep::Exit { child_number };
    }
}

/// `WalkDecisionTree` (spec.md 4.5) against the in-memory tiled tree, the
/// reference a peeled/lowered walk over packed bytes must match exactly.
pub fn walk_tiled_tree(tiled: &TiledTree, row: &[f64]) -> f64 {
    let mut current = tiled.root_tile();
    loop {
        match traverse_tree_tile(tiled, current, row) {
            TileStep::Leaf(value) => return value,
            TileStep::Exit { child_number } => current = &tiled.tiles[current.child_tiles[child_number]],
        }
    }
}

/// The same walk, but addressing exclusively through `Representation` and a
/// packed buffer -- no access to the source tree at all. This is what a
/// generated/lowered program executes (spec.md 4.4/4.5).
pub fn walk_packed(representation: &dyn Representation, model: &PackedModel, tree_index: usize, tiled: &TiledTree, row: &[f64]) -> f64 {
    let mut address = representation.root_address(model, tree_index);
    let mut current = tiled.root_tile();
    loop {
        if representation.is_leaf_tile(model, tree_index, address) {
            return representation.get_leaf_value(model, tree_index, address);
        }
        match traverse_tree_tile(tiled, current, row) {
            TileStep::Leaf(value) => return value,
            TileStep::Exit { child_number } => {
                address = representation.child_address(model, tree_index, address, child_number);
                current = &tiled.tiles[current.child_tiles[child_number]];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::representation::for_layout;
    use forest::{FeatureType, Forest, ForestBuilder, LEAF_FEATURE_INDEX};
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
    fn packed_walk_matches_source_walk_for_every_layout() {
        let forest = deep_tree_forest();
        let tree = &forest.trees[0];
        for tile_size in [1u32, 2] {
            let coloring = UniformTiling { tile_size };
            let tiling = coloring.color(tree);
            let tiled = build_tiled_tree(0, tree, &tiling).unwrap();

            let params = PackingParams { tile_size, threshold_width: 64, feature_index_width: 32 };
            for layout in ["array", "sparse"] {
                let serializer = create(layout).unwrap();
                let packed = serializer.serialize(&forest, std::slice::from_ref(&tiled), &params).unwrap();
                let representation = for_layout(layout).unwrap();
                for x in [-0.5, 0.5, 1.5] {
                    let row = [x];
                    let expected = tree.walk(&row);
                    let actual = walk_packed(representation.as_ref(), &packed, 0, &tiled, &row);
                    assert_eq!(expected, actual, "layout={layout} tile_size={tile_size} x={x}");
                }
            }
        }
    }
}
