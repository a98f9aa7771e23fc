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

//! Tile-id coloring (spec.md 4.2's "externally produced" input to the
//! tiled-tree builder). Uniform greedily groups a connected, top-down
//! run of T internal nodes per tile; probabilistic prefers higher-weight
//! children first so hot paths land in the same tile; hybrid falls back
//! to uniform wherever a tree has no profiled weights.
use forest::{NodeId, Tree, TilingDescriptor};
use fxhash::FxHashMap;
use std::collections::VecDeque;

pub trait TileColoring {
    fn color(&self, tree: &Tree) -> TilingDescriptor;
}

fn greedy_color(tree: &Tree, tile_size: u32, order_children: impl Fn(NodeId, NodeId, NodeId) -> [NodeId; 2]) -> TilingDescriptor {
    let mut tile_id_of = vec![-1i32; tree.len()];
    let mut next_tile_id = 0i32;
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    queue.push_back(tree.root());

    while let Some(start) = queue.pop_front() {
        if tile_id_of[start.index()] != -1 {
            continue;
        }
        let node = tree.node(start);
        if node.is_leaf() {
            tile_id_of[start.index()] = next_tile_id;
            next_tile_id += 1;
            continue;
        }

        let mut collected = Vec::new();
        let mut bfs = VecDeque::new();
        bfs.push_back(start);
        while let Some(n) = bfs.pop_front() {
            if tile_id_of[n.index()] != -1 {
                continue;
            }
            if collected.len() as u32 >= tile_size {
                queue.push_back(n);
                continue;
            }
            let nd = tree.node(n);
            if nd.is_leaf() {
                queue.push_back(n);
                continue;
            }
            collected.push(n);
            for child in order_children(n, nd.left, nd.right) {
                bfs.push_back(child);
            }
        }

        let tid = next_tile_id;
        next_tile_id += 1;
        for n in collected {
            tile_id_of[n.index()] = tid;
        }
    }

    TilingDescriptor {
        tile_id_of,
        max_tile_size: tile_size,
    }
}

/// `tilingType = uniform`: breadth-first, left-before-right.
pub struct UniformTiling {
    pub tile_size: u32,
}

impl TileColoring for UniformTiling {
    fn color(&self, tree: &Tree) -> TilingDescriptor {
        greedy_color(tree, self.tile_size, |_, left, right| [left, right])
    }
}

/// `tilingType = probabilistic`: visit counts loaded from
/// `statsProfileCSVPath`, keyed by node index within the tree. Nodes with
/// no recorded weight are treated as weight 0.
pub struct ProbabilisticTiling {
    pub tile_size: u32,
    pub node_weights: FxHashMap<usize, f64>,
}

impl TileColoring for ProbabilisticTiling {
    fn color(&self, tree: &Tree) -> TilingDescriptor {
        let weights = &self.node_weights;
        greedy_color(tree, self.tile_size, |_, left, right| {
            let wl = weights.get(&left.index()).copied().unwrap_or(0.0);
            let wr = weights.get(&right.index()).copied().unwrap_or(0.0);
            if wl >= wr {
                [left, right]
            } else {
                [right, left]
            }
        })
    }
}

/// `tilingType = hybrid`: use the profile where one exists for this tree,
/// otherwise fall back to plain uniform ordering.
pub struct HybridTiling {
    pub uniform: UniformTiling,
    pub probabilistic: ProbabilisticTiling,
}

impl TileColoring for HybridTiling {
    fn color(&self, tree: &Tree) -> TilingDescriptor {
        if self.probabilistic.node_weights.is_empty() {
            self.uniform.color(tree)
        } else {
            self.probabilistic.color(tree)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forest::{FeatureType, ForestBuilder, LEAF_FEATURE_INDEX};

    fn three_level_tree() -> Tree {
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
        b.persist().unwrap().trees.into_iter().next().unwrap()
    }

    #[test]
    fn uniform_groups_every_node_exactly_once() {
        let tree = three_level_tree();
        let coloring = UniformTiling { tile_size: 2 };
        let descriptor = coloring.color(&tree);
        assert_eq!(descriptor.tile_id_of.len(), tree.len());
        assert!(descriptor.tile_id_of.iter().all(|&id| id >= 0));
    }
}
