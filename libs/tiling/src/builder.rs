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

//! The tiled-tree construction pipeline from spec.md 4.2: partition,
//! sort within tile, wire tile parent/children, pad partial tiles with
//! dummies, validate.
use crate::tile::{Tile, TiledTree};
use fxhash::FxHashMap;
use forest::{CanopyError, Node, NodeId, Tree, TilingDescriptor};
use std::collections::VecDeque;

struct TileBuildData {
    order: Vec<usize>,
    parent_tile_id: Option<i32>,
    child_tile_ids: Vec<i32>,
}

pub fn build_tiled_tree(tree_index: usize, tree: &Tree, tiling: &TilingDescriptor) -> Result<TiledTree, CanopyError> {
    let mut nodes: Vec<Node> = tree.nodes.clone();
    let mut tile_id_of: Vec<i32> = tiling.tile_id_of.clone();
    if tile_id_of.len() != nodes.len() {
        return Err(CanopyError::invalid_model(
            tree_index,
            "tiling descriptor length does not match node count",
        ));
    }

    // Step 1 + 4: partition, then pad every non-singleton, non-leaf tile
    // up to the declared tile size.
    let mut distinct_ids: Vec<i32> = tile_id_of.clone();
    distinct_ids.sort_unstable();
    distinct_ids.dedup();
    for &tile_id in &distinct_ids {
        pad_tile(tree_index, tile_id, tiling.max_tile_size, &mut nodes, &mut tile_id_of)?;
    }

    // Step 2 + 3: find each tile's entry node, sort it in level order, and
    // wire its parent/child tiles.
    let mut build_data: FxHashMap<i32, TileBuildData> = FxHashMap::default();
    for &tile_id in &distinct_ids {
        let members: Vec<usize> = (0..nodes.len()).filter(|&i| tile_id_of[i] == tile_id).collect();
        let entry = find_entry(tree_index, tile_id, &members, &nodes, &tile_id_of)?;
        let (order, child_tile_ids) = sort_and_wire(tile_id, entry, &nodes, &tile_id_of);
        let parent_tile_id = match nodes[entry].parent {
            p if p.is_invalid() => None,
            p => Some(tile_id_of[p.index()]),
        };
        build_data.insert(
            tile_id,
            TileBuildData {
                order,
                parent_tile_id,
                child_tile_ids,
            },
        );
    }

    // Step 5 (first half): exactly one tile has no parent -- the root tile.
    let root_candidates: Vec<i32> = distinct_ids
        .iter()
        .copied()
        .filter(|id| build_data[id].parent_tile_id.is_none())
        .collect();
    if root_candidates.len() != 1 {
        return Err(CanopyError::invalid_model(
            tree_index,
            format!("expected exactly one root tile, found {}", root_candidates.len()),
        ));
    }
    let root_tile_id = root_candidates[0];

    // Assign final tile indices root-first by discovery order.
    let mut discovery: Vec<i32> = vec![root_tile_id];
    let mut index_of: FxHashMap<i32, usize> = FxHashMap::default();
    index_of.insert(root_tile_id, 0);
    let mut i = 0;
    while i < discovery.len() {
        let tid = discovery[i];
        i += 1;
        for &child_id in &build_data[&tid].child_tile_ids {
            if !index_of.contains_key(&child_id) {
                index_of.insert(child_id, discovery.len());
                discovery.push(child_id);
            }
        }
    }

    if discovery.len() != distinct_ids.len() {
        return Err(CanopyError::invalid_model(
            tree_index,
            format!(
                "tile graph is not connected: {} of {} tiles reachable from the root",
                discovery.len(),
                distinct_ids.len()
            ),
        ));
    }

    let mut tiles = Vec::with_capacity(discovery.len());
    for (tile_index, tile_id) in discovery.iter().enumerate() {
        let data = &build_data[tile_id];
        tiles.push(Tile {
            tile_index,
            nodes: data.order.iter().map(|&n| NodeId::new(n)).collect(),
            parent_tile: data.parent_tile_id.map(|pid| index_of[&pid]),
            child_tiles: data.child_tile_ids.iter().map(|cid| index_of[cid]).collect(),
        });
    }

    validate(tree_index, tree.len(), tiling.max_tile_size, &tiles)?;

    Ok(TiledTree {
        tiles,
        max_tile_size: tiling.max_tile_size,
        nodes,
    })
}

fn find_entry(
    tree_index: usize,
    tile_id: i32,
    members: &[usize],
    nodes: &[Node],
    tile_id_of: &[i32],
) -> Result<usize, CanopyError> {
    let entries: Vec<usize> = members
        .iter()
        .copied()
        .filter(|&n| {
            let parent = nodes[n].parent;
            parent.is_invalid() || tile_id_of[parent.index()] != tile_id
        })
        .collect();
    match entries.as_slice() {
        [single] => Ok(*single),
        _ => Err(CanopyError::invalid_model(
            tree_index,
            format!("tile {tile_id} has {} candidate entry nodes, expected 1", entries.len()),
        )),
    }
}

fn sort_and_wire(tile_id: i32, entry: usize, nodes: &[Node], tile_id_of: &[i32]) -> (Vec<usize>, Vec<i32>) {
    let mut order = Vec::new();
    let mut child_tile_ids = Vec::new();
    let mut queue = VecDeque::from([entry]);
    while let Some(n) = queue.pop_front() {
        order.push(n);
        let node = &nodes[n];
        if node.is_leaf() {
            continue;
        }
        for child in [node.left, node.right] {
            if tile_id_of[child.index()] == tile_id {
                queue.push_back(child.index());
            } else {
                child_tile_ids.push(tile_id_of[child.index()]);
            }
        }
    }
    (order, child_tile_ids)
}

/// Grows a tile to exactly `target_size` nodes by repeatedly wrapping one
/// leaf edge of a "both children are leaves" candidate in a dummy node
/// that copies the candidate's predicate (spec.md 4.2 step 4). Leaves
/// dummies as candidates for later iterations, the same way the source's
/// padding loop can chain dummies off one another.
fn pad_tile(
    tree_index: usize,
    tile_id: i32,
    target_size: u32,
    nodes: &mut Vec<Node>,
    tile_id_of: &mut Vec<i32>,
) -> Result<(), CanopyError> {
    let mut members: Vec<usize> = (0..nodes.len()).filter(|&i| tile_id_of[i] == tile_id).collect();
    if members.len() == 1 && nodes[members[0]].is_leaf() {
        return Ok(());
    }

    while (members.len() as u32) < target_size {
        let candidate = members.iter().copied().find(|&idx| {
            let n = &nodes[idx];
            !n.is_leaf() && nodes[n.left.index()].is_leaf() && nodes[n.right.index()].is_leaf()
        });
        let candidate = candidate.ok_or_else(|| {
            CanopyError::invalid_model(tree_index, format!("tile {tile_id} has no dummy-padding candidate"))
        })?;

        let cand = nodes[candidate];
        let leaf_id = cand.left;
        let dummy_index = nodes.len();
        let mut dummy = Node::new_internal(cand.threshold, cand.feature_index);
        dummy.parent = NodeId::new(candidate);
        dummy.left = leaf_id;
        dummy.right = leaf_id;
        nodes.push(dummy);
        tile_id_of.push(tile_id);
        nodes[leaf_id.index()].parent = NodeId::new(dummy_index);
        nodes[candidate].left = NodeId::new(dummy_index);
        members.push(dummy_index);
    }
    Ok(())
}

fn validate(tree_index: usize, source_node_count: usize, target_size: u32, tiles: &[Tile]) -> Result<(), CanopyError> {
    let mut seen = vec![false; source_node_count.max(
        tiles
            .iter()
            .flat_map(|t| t.nodes.iter())
            .map(|n| n.index() + 1)
            .max()
            .unwrap_or(0),
    )];
    for tile in tiles {
        let size = tile.nodes.len() as u32;
        if size != 1 && size != target_size {
            return Err(CanopyError::invalid_model(
                tree_index,
                format!("tile {} has size {size}, expected 1 or {target_size}", tile.tile_index),
            ));
        }
        for &node_id in &tile.nodes {
            if node_id.index() < source_node_count {
                if seen[node_id.index()] {
                    return Err(CanopyError::invalid_model(
                        tree_index,
                        format!("node {} assigned to more than one tile", node_id.index()),
                    ));
                }
                seen[node_id.index()] = true;
            }
        }
    }
    if let Some(missing) = seen[..source_node_count].iter().position(|&s| !s) {
        return Err(CanopyError::invalid_node(tree_index, missing, "node not assigned to any tile"));
    }
    Ok(())
}
