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

//! The whole-ensemble reduction step (spec.md 4.1, 8 scenario v): sums
//! each tree's `TargetProgram` output per class and applies the forest's
//! prediction transform, the lowered counterpart of `Forest::predict`.
use crate::target::{compile_tree, TargetProgram};
use forest::{Forest, PredictionTransform};
use ir::Representation;
use serialize::PackedModel;
use tiling::TiledTree;

pub struct CompiledForest {
    programs: Vec<TargetProgram>,
    class_of_tree: Vec<usize>,
    num_classes: usize,
    initial_offset: f64,
    prediction_transform: PredictionTransform,
}

impl CompiledForest {
    pub fn compile(representation: &dyn Representation, model: &PackedModel, tiled_trees: &[TiledTree], forest: &Forest) -> Self {
        let programs = tiled_trees
            .iter()
            .enumerate()
            .map(|(tree_index, tiled)| compile_tree(representation, model, tiled, tree_index))
            .collect();
        let class_of_tree = forest.trees.iter().map(|t| t.class_id.unwrap_or(0) as usize).collect();
        Self {
            programs,
            class_of_tree,
            num_classes: forest.num_classes,
            initial_offset: forest.initial_offset,
            prediction_transform: forest.prediction_transform,
        }
    }

    /// Reassembles a `CompiledForest` from its already-lowered pieces --
    /// the shape `run` reads back from a persisted `program.json`, with no
    /// source tree or tiling decision in sight.
    pub fn from_parts(
        programs: Vec<TargetProgram>,
        class_of_tree: Vec<usize>,
        num_classes: usize,
        initial_offset: f64,
        prediction_transform: PredictionTransform,
    ) -> Self {
        Self {
            programs,
            class_of_tree,
            num_classes,
            initial_offset,
            prediction_transform,
        }
    }

    pub fn programs(&self) -> &[TargetProgram] {
        &self.programs
    }

    pub fn class_of_tree(&self) -> &[usize] {
        &self.class_of_tree
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn initial_offset(&self) -> f64 {
        self.initial_offset
    }

    pub fn prediction_transform(&self) -> PredictionTransform {
        self.prediction_transform
    }

    pub fn predict(&self, representation: &dyn Representation, model: &PackedModel, row: &[f64]) -> Vec<f64> {
        if self.num_classes >= 2 {
            let mut class_sums = vec![0.0_f64; self.num_classes];
            for (program, &class) in self.programs.iter().zip(&self.class_of_tree) {
                class_sums[class] += program.execute(representation, model, row);
            }
            for sum in &mut class_sums {
                *sum += self.initial_offset;
            }
            match self.prediction_transform {
                PredictionTransform::Softmax => softmax(&class_sums),
                PredictionTransform::Identity => class_sums,
                PredictionTransform::Sigmoid => class_sums.into_iter().map(sigmoid).collect(),
            }
        } else {
            let mut sum = self.initial_offset;
            for program in &self.programs {
                sum += program.execute(representation, model, row);
            }
            vec![match self.prediction_transform {
                PredictionTransform::Identity => sum,
                PredictionTransform::Sigmoid => sigmoid(sum),
                PredictionTransform::Softmax => sum,
            }]
        }
    }

    pub fn argmax_class(&self, representation: &dyn Representation, model: &PackedModel, row: &[f64]) -> usize {
        self.predict(representation, model, row)
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).expect("NaN in prediction"))
            .map(|(i, _)| i)
            .expect("forest has at least one class")
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax(values: &[f64]) -> Vec<f64> {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use forest::{FeatureType, ForestBuilder, LEAF_FEATURE_INDEX, Reduction};
    use ir::for_layout;
    use serialize::{create, PackingParams};
    use tiling::{build_tiled_tree, TileColoring, UniformTiling};

    // Testable property 6 + end-to-end scenario (v): a 6-tree, 3-class
    // softmax ensemble, array vs sparse, must match `Forest::predict` and
    // agree on the argmax class, for every row.
    fn six_tree_three_class_forest() -> Forest {
        let mut b = ForestBuilder::new();
        b.add_feature("x", FeatureType::Numerical).unwrap();
        b.set_prediction_transform(PredictionTransform::Softmax).unwrap();
        b.set_reduction(Reduction::Sum).unwrap();
        b.set_num_classes(3).unwrap();
        b.set_initial_offset(0.1).unwrap();
        for class in 0..3u32 {
            for round in 0..2 {
                b.new_tree().unwrap();
                let bias = class as f64 - round as f64 * 0.5;
                let root = b.new_node(0.0, 0).unwrap();
                let l = b.new_node(bias - 1.0, LEAF_FEATURE_INDEX).unwrap();
                let r = b.new_node(bias + 1.0, LEAF_FEATURE_INDEX).unwrap();
                b.set_left_child(root, l).unwrap();
                b.set_right_child(root, r).unwrap();
                b.set_tree_class_id(class).unwrap();
                b.end_tree().unwrap();
            }
        }
        b.persist().unwrap()
    }

    #[test]
    fn compiled_forest_matches_reference_predict_across_layouts() {
        let forest = six_tree_three_class_forest();
        let tiled_trees: Vec<TiledTree> = forest
            .trees
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let coloring = UniformTiling { tile_size: 1 };
                let tiling = coloring.color(t);
                build_tiled_tree(i, t, &tiling).unwrap()
            })
            .collect();
        let params = PackingParams { tile_size: 1, threshold_width: 64, feature_index_width: 32 };

        for layout in ["array", "sparse"] {
            let serializer = create(layout).unwrap();
            let packed = serializer.serialize(&forest, &tiled_trees, &params).unwrap();
            let representation = for_layout(layout).unwrap();
            let compiled = CompiledForest::compile(representation.as_ref(), &packed, &tiled_trees, &forest);

            for x in [-2.0, -0.5, 0.5, 2.0] {
                let row = [x];
                let expected = forest.predict(&row);
                let actual = compiled.predict(representation.as_ref(), &packed, &row);
                assert_eq!(expected.len(), actual.len());
                for (e, a) in expected.iter().zip(actual.iter()) {
                    assert!((e - a).abs() < 1e-9, "layout={layout} x={x} expected={expected:?} actual={actual:?}");
                }
                assert_eq!(forest.argmax_class(&row), compiled.argmax_class(representation.as_ref(), &packed, &row));
            }
        }
    }

    // Two trees splitting on two different features: property 6 for the
    // reorg layout specifically requires each branch to read its own
    // feature index back out of the packed buffer, not just feature 0.
    fn two_feature_two_tree_forest() -> Forest {
        let mut b = ForestBuilder::new();
        b.add_feature("f0", FeatureType::Numerical).unwrap();
        b.add_feature("f1", FeatureType::Numerical).unwrap();
        b.new_tree().unwrap();
        let root = b.new_node(0.5, 0).unwrap();
        let l = b.new_node(1.0, LEAF_FEATURE_INDEX).unwrap();
        let r = b.new_node(2.0, LEAF_FEATURE_INDEX).unwrap();
        b.set_left_child(root, l).unwrap();
        b.set_right_child(root, r).unwrap();
        b.end_tree().unwrap();
        b.new_tree().unwrap();
        let root = b.new_node(0.5, 1).unwrap();
        let l = b.new_node(-0.5, LEAF_FEATURE_INDEX).unwrap();
        let r = b.new_node(1.5, LEAF_FEATURE_INDEX).unwrap();
        b.set_left_child(root, l).unwrap();
        b.set_right_child(root, r).unwrap();
        b.end_tree().unwrap();
        b.persist().unwrap()
    }

    #[test]
    fn compiled_forest_matches_reference_predict_across_layouts_including_reorg() {
        let forest = two_feature_two_tree_forest();
        let tiled_trees: Vec<TiledTree> = forest
            .trees
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let coloring = UniformTiling { tile_size: 1 };
                let tiling = coloring.color(t);
                build_tiled_tree(i, t, &tiling).unwrap()
            })
            .collect();
        let params = PackingParams { tile_size: 1, threshold_width: 64, feature_index_width: 32 };

        // Rows where swapping which feature is read changes the second
        // tree's branch: f1 alone decides it, f0 alone would decide the
        // opposite way.
        for layout in ["array", "sparse", "reorg"] {
            let serializer = create(layout).unwrap();
            let packed = serializer.serialize(&forest, &tiled_trees, &params).unwrap();
            let representation = for_layout(layout).unwrap();
            let compiled = CompiledForest::compile(representation.as_ref(), &packed, &tiled_trees, &forest);

            for row in [[2.0, -2.0], [-2.0, 2.0], [0.0, 0.0], [1.0, 1.0]] {
                let expected = forest.predict(&row);
                let actual = compiled.predict(representation.as_ref(), &packed, &row);
                assert_eq!(expected.len(), actual.len());
                for (e, a) in expected.iter().zip(actual.iter()) {
                    assert!((e - a).abs() < 1e-9, "layout={layout} row={row:?} expected={expected:?} actual={actual:?}");
                }
            }
        }
    }
}
