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
use forest::{Node, NodeId};

/// A group of source nodes evaluated together at runtime (spec.md 3).
/// `nodes` lists arena indices into the source tree, entry node first,
/// then level order. `|nodes|` is always 1 (a lone leaf) or `T`.
#[derive(Clone, Debug)]
pub struct Tile {
    pub tile_index: usize,
    pub nodes: Vec<NodeId>,
    pub parent_tile: Option<usize>,
    pub child_tiles: Vec<usize>,
}

impl Tile {
    pub fn entry(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn is_leaf_tile(&self) -> bool {
        self.nodes.len() == 1
    }
}

/// A forest of tiles over one source tree, root tile first (spec.md 4.2).
#[derive(Clone, Debug)]
pub struct TiledTree {
    pub tiles: Vec<Tile>,
    pub max_tile_size: u32,
    /// The source arena, extended with any dummy nodes inserted while
    /// padding (spec.md 4.2 step 4). `Tile::nodes` indexes into this.
    pub nodes: Vec<Node>,
}

impl TiledTree {
    pub fn root_tile(&self) -> &Tile {
        &self.tiles[0]
    }

    pub fn depth(&self) -> usize {
        fn depth_of(tiles: &[Tile], index: usize) -> usize {
            let tile = &tiles[index];
            1 + tile
                .child_tiles
                .iter()
                .map(|&c| depth_of(tiles, c))
                .max()
                .unwrap_or(0)
        }
        if self.tiles.is_empty() {
            0
        } else {
            depth_of(&self.tiles, 0)
        }
    }
}
