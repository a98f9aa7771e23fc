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
use crate::node::{Node, NodeId};

/// For each node index in a tree, the tile id it belongs to, plus the
/// maximum tile size T for this tree (spec.md 3). Produced by a
/// `tiling::TileColoring` and consumed by the tiled-tree builder (C2).
#[derive(Clone, Debug)]
pub struct TilingDescriptor {
    pub tile_id_of: Vec<i32>,
    pub max_tile_size: u32,
}

/// An ordered sequence of nodes, the first of which is the root.
#[derive(Clone, Debug)]
pub struct Tree {
    pub nodes: Vec<Node>,
    pub tiling: Option<TilingDescriptor>,
    /// Multiclass only: which output class this tree contributes to.
    pub class_id: Option<u32>,
}

impl Tree {
    pub fn root(&self) -> NodeId {
        NodeId::new(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walk the tree directly against a row, ignoring any tiling -- this is
    /// the reference semantics every layout (array/sparse/reorg) and every
    /// peeling factor must reproduce exactly (spec.md 8, properties 3/5/6).
    pub fn walk(&self, row: &[f64]) -> f64 {
        let mut node = self.node(self.root());
        while !node.is_leaf() {
            let next = if node.goes_right(row) {
                node.right
            } else {
                node.left
            };
            node = self.node(next);
        }
        node.threshold
    }

    pub fn set_tiling(&mut self, tiling: TilingDescriptor) {
        assert_eq!(tiling.tile_id_of.len(), self.nodes.len());
        for (node, &tile_id) in self.nodes.iter_mut().zip(tiling.tile_id_of.iter()) {
            node.tile_id = tile_id;
        }
        self.tiling = Some(tiling);
    }
}
