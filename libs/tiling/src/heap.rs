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

//! Implicit-heap serialization of a tiled tree (spec.md 4.2): tile at
//! position `i` has children at `i*(T+1)+1 .. i*(T+1)+T+2`. Slots no tile
//! occupies are `None`; callers write sentinel thresholds/feature indices
//! there and must never read them back during a valid traversal.
use crate::tile::TiledTree;

pub fn implicit_heap_len(tile_size: u32, depth: usize) -> usize {
    if depth == 0 || tile_size == 0 {
        return 0;
    }
    let branching = (tile_size + 1) as u64;
    let total = (branching.pow(depth as u32) - 1) / tile_size as u64;
    total as usize
}

/// Maps each occupied heap position to the tile index stored there.
pub fn to_implicit_heap(tiled: &TiledTree) -> Vec<Option<usize>> {
    let depth = tiled.depth();
    let len = implicit_heap_len(tiled.max_tile_size, depth);
    let mut heap = vec![None; len];
    if tiled.tiles.is_empty() {
        return heap;
    }
    place(tiled, 0, 0, &mut heap);
    heap
}

fn place(tiled: &TiledTree, tile_index: usize, position: usize, heap: &mut [Option<usize>]) {
    heap[position] = Some(tile_index);
    let tile = &tiled.tiles[tile_index];
    let stride = tiled.max_tile_size as usize + 1;
    for (k, &child_index) in tile.child_tiles.iter().enumerate() {
        let child_position = position * stride + 1 + k;
        place(tiled, child_index, child_position, heap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_len_matches_formula() {
        // T=2, D=2: (3^2 - 1)/2 = 4.
        assert_eq!(implicit_heap_len(2, 2), 4);
        assert_eq!(implicit_heap_len(1, 1), 1);
    }
}
