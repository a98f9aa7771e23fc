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

//! The `canopy` binary (spec.md 6): `compile` turns a forest description
//! into packed buffers plus a lowered target program; `run` loads them
//! back and predicts over a CSV of rows. Everything it calls lives in the
//! library crates; this file is just config parsing and file I/O.
mod model_spec;

use anyhow::{bail, Context, Result};
use forest::{CanopyError, Forest, ModelImporter, OnnxAttributes, OnnxTreeEnsembleImporter, PredictionTransform};
use fxhash::FxHashMap;
use lowering::{CompiledForest, TargetProgram};
use serde::{Deserialize, Serialize};
use serialize::{PackedModel, PackingParams};
use std::path::{Path, PathBuf};
use structopt::StructOpt;
use tiling::{build_tiled_tree, HybridTiling, ProbabilisticTiling, TileColoring, TiledTree, UniformTiling};
use tracelog::TraceLogOpts;
use tracing::info;

#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "canopy", about = "Compile decision-forest models into packed inference buffers, and run them.")]
struct Opt {
    #[structopt(flatten)]
    trace: TraceLogOpts,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Clone, Debug, StructOpt)]
enum Command {
    /// Tile, pack, and lower a forest description into an on-disk model.
    Compile(CompileOpt),
    /// Load a compiled model and predict over a CSV of feature rows.
    Run(RunOpt),
}

/// The config names spec.md 6 lists that this binary's pipeline actually
/// branches on. `nodeIndexTypeWidth`/`tileShapeBitWidth`/`childIndexBitWidth`
/// are recognized but fixed by the array/sparse serializers themselves
/// (see `serialize::Serializer::sidecar`); `makeAllLeavesSameDepth`,
/// `reorderTreesByDepth`, `pipelineSize`, `returnTypeWidth` are recognized
/// by the tiling/IR layers they configure (see DESIGN.md) but are not
/// re-exposed as top-level flags here.
#[derive(Clone, Debug, Serialize, Deserialize, StructOpt)]
pub struct CompilerOptions {
    /// Physical layout: array, sparse, or reorg (gpu_array/gpu_reorg reuse
    /// array/reorg packing).
    #[structopt(long, default_value = "array")]
    pub layout: String,

    /// `tileSize`: T, the number of non-leaf nodes grouped per tile.
    #[structopt(long, default_value = "1")]
    pub tile_size: u32,

    /// `thresholdTypeWidth` in {32, 64}.
    #[structopt(long, default_value = "64")]
    pub threshold_type_width: u32,

    /// `featureIndexTypeWidth` in {8, 16, 32}.
    #[structopt(long, default_value = "32")]
    pub feature_index_type_width: u32,

    /// `batchSize`: inference rows per call, recorded in the sidecar.
    #[structopt(long, default_value = "1")]
    pub batch_size: u32,

    /// `tilingType`: uniform, probabilistic, or hybrid.
    #[structopt(long, default_value = "uniform")]
    pub tiling_type: String,

    /// `statsProfileCSVPath`: required by probabilistic/hybrid tiling.
    /// Rows are `tree_index,node_index,weight`.
    #[structopt(long, parse(from_os_str))]
    pub stats_profile_csv_path: Option<PathBuf>,

    /// `numberOfCores`: CPU parallelism degree for the GPU backend's
    /// rayon fallback. 0 leaves rayon's global pool untouched.
    #[structopt(long, default_value = "0")]
    pub number_of_cores: usize,
}

#[derive(Clone, Debug, StructOpt)]
struct CompileOpt {
    /// Forest description, as JSON (see `model_spec::ForestSpec`).
    #[structopt(long, parse(from_os_str), conflicts_with = "onnx")]
    forest: Option<PathBuf>,

    /// Decoded ONNX TreeEnsemble attribute table, as JSON (see
    /// `forest::onnx::OnnxAttributes` -- no protobuf decoder lives here).
    #[structopt(long, parse(from_os_str))]
    onnx: Option<PathBuf>,

    /// Output path prefix: writes `<out>.json`, `<out>.bin`, `<out>.program.json`.
    #[structopt(long, parse(from_os_str))]
    out: PathBuf,

    #[structopt(flatten)]
    options: CompilerOptions,
}

#[derive(Clone, Debug, StructOpt)]
struct RunOpt {
    /// Path prefix a prior `compile` wrote to (same value as `--out`).
    #[structopt(parse(from_os_str))]
    model: PathBuf,

    /// CSV of feature rows, one row per prediction, no header.
    #[structopt(parse(from_os_str))]
    rows: PathBuf,
}

/// Everything a `compile` run produces beyond the sidecar + packed buffer:
/// the pieces `CompiledForest::from_parts` needs to predict without ever
/// re-deriving tiling decisions from the source forest.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct CompiledManifest {
    offsets: Vec<i32>,
    lengths: Vec<i32>,
    class_of_tree: Vec<usize>,
    num_classes: usize,
    initial_offset: f64,
    prediction_transform: PredictionTransform,
    programs: Vec<TargetProgram>,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    tracelog::init(&opt.trace)?;

    match opt.cmd {
        Command::Compile(compile_opt) => run_compile(compile_opt),
        Command::Run(run_opt) => run_predict(run_opt),
    }
}

fn run_compile(opt: CompileOpt) -> Result<()> {
    let forest = load_forest(&opt)?;
    info!(trees = forest.trees.len(), classes = forest.num_classes, "loaded forest");

    let stats_profile = match &opt.options.stats_profile_csv_path {
        Some(path) => load_stats_profile(path)?,
        None => FxHashMap::default(),
    };
    let tiled_trees: Vec<TiledTree> = forest
        .trees
        .iter()
        .enumerate()
        .map(|(i, tree)| {
            let coloring = build_tile_coloring(&opt.options, stats_profile.get(&i).cloned().unwrap_or_default())?;
            let tiling = coloring.color(tree);
            build_tiled_tree(i, tree, &tiling).map_err(anyhow::Error::from)
        })
        .collect::<Result<_>>()?;

    let params = PackingParams {
        tile_size: opt.options.tile_size,
        threshold_width: opt.options.threshold_type_width,
        feature_index_width: opt.options.feature_index_type_width,
    };
    let serializer = serialize::create(&opt.options.layout).ok_or_else(|| anyhow::anyhow!("unknown layout `{}`", opt.options.layout))?;
    let packed = serializer.serialize(&forest, &tiled_trees, &params).map_err(CanopyErrorContext)?;
    let sidecar = serializer.sidecar(&forest, &packed, opt.options.batch_size);

    let representation = ir::for_layout(&opt.options.layout).ok_or_else(|| anyhow::anyhow!("no representation for layout `{}`", opt.options.layout))?;
    let compiled = CompiledForest::compile(representation.as_ref(), &packed, &tiled_trees, &forest);

    let manifest = CompiledManifest {
        offsets: packed.offsets.clone(),
        lengths: packed.lengths.clone(),
        class_of_tree: compiled.class_of_tree().to_vec(),
        num_classes: compiled.num_classes(),
        initial_offset: compiled.initial_offset(),
        prediction_transform: compiled.prediction_transform(),
        programs: compiled.programs().to_vec(),
    };

    model_io::write_sidecar(&with_suffix(&opt.out, "json"), &sidecar)?;
    model_io::write_packed_buffer(&with_suffix(&opt.out, "bin"), &packed.model_bytes)?;
    let program_json = serde_json::to_string_pretty(&manifest).context("serializing compiled program manifest")?;
    std::fs::write(with_suffix(&opt.out, "program.json"), program_json).context("writing compiled program manifest")?;

    info!(out = %opt.out.display(), layout = %opt.options.layout, "compiled model");
    Ok(())
}

fn load_forest(opt: &CompileOpt) -> Result<Forest> {
    match (&opt.forest, &opt.onnx) {
        (Some(path), None) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading forest spec {}", path.display()))?;
            let spec: model_spec::ForestSpec = serde_json::from_str(&text).with_context(|| format!("parsing forest spec {}", path.display()))?;
            model_spec::build_forest(&spec).map_err(|e| CanopyErrorContext(e).into())
        }
        (None, Some(path)) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading onnx attributes {}", path.display()))?;
            let attrs: OnnxAttributes = serde_json::from_str(&text).with_context(|| format!("parsing onnx attributes {}", path.display()))?;
            OnnxTreeEnsembleImporter.import(&attrs).map_err(|e| CanopyErrorContext(e).into())
        }
        (Some(_), Some(_)) => bail!("pass exactly one of --forest or --onnx"),
        (None, None) => bail!("pass one of --forest or --onnx"),
    }
}

/// Builds the colorer for one tree. `node_weights` is already the sub-map
/// for this tree's index, so every tree in a multi-tree forest gets its own
/// profile instead of all of them sharing tree 0's.
fn build_tile_coloring(options: &CompilerOptions, node_weights: FxHashMap<usize, f64>) -> Result<Box<dyn TileColoring>> {
    match options.tiling_type.as_str() {
        "uniform" => Ok(Box::new(UniformTiling { tile_size: options.tile_size })),
        "probabilistic" => {
            if options.stats_profile_csv_path.is_none() {
                bail!("probabilistic tiling requires --stats-profile-csv-path");
            }
            Ok(Box::new(ProbabilisticTiling { tile_size: options.tile_size, node_weights }))
        }
        "hybrid" => Ok(Box::new(HybridTiling {
            uniform: UniformTiling { tile_size: options.tile_size },
            probabilistic: ProbabilisticTiling { tile_size: options.tile_size, node_weights },
        })),
        other => bail!("unknown tilingType `{other}`"),
    }
}

/// Parses `tree_index,node_index,weight` rows into a per-tree weight map.
fn load_stats_profile(path: &Path) -> Result<FxHashMap<usize, FxHashMap<usize, f64>>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path).with_context(|| format!("reading stats profile {}", path.display()))?;
    let mut by_tree: FxHashMap<usize, FxHashMap<usize, f64>> = FxHashMap::default();
    for record in reader.records() {
        let record = record?;
        let tree_index: usize = record.get(0).context("missing tree_index column")?.parse()?;
        let node_index: usize = record.get(1).context("missing node_index column")?.parse()?;
        let weight: f64 = record.get(2).context("missing weight column")?.parse()?;
        by_tree.entry(tree_index).or_default().insert(node_index, weight);
    }
    Ok(by_tree)
}

fn run_predict(opt: RunOpt) -> Result<()> {
    let sidecar = model_io::read_sidecar(&with_suffix(&opt.model, "json"))?;
    let model_bytes = model_io::read_packed_buffer(&with_suffix(&opt.model, "bin"))?;
    let manifest_text = std::fs::read_to_string(with_suffix(&opt.model, "program.json")).context("reading compiled program manifest")?;
    let manifest: CompiledManifest = serde_json::from_str(&manifest_text).context("parsing compiled program manifest")?;

    let layout = static_layout_name(&sidecar.layout)?;
    let packed = PackedModel {
        layout,
        params: PackingParams {
            tile_size: sidecar.tile_size,
            threshold_width: sidecar.threshold_type_width,
            feature_index_width: sidecar.feature_index_type_width,
        },
        model_bytes,
        offsets: manifest.offsets,
        lengths: manifest.lengths,
        class_ids: sidecar.class_ids.clone(),
    };
    let representation = ir::for_layout(layout).ok_or_else(|| anyhow::anyhow!("no representation for layout `{layout}`"))?;
    let compiled = CompiledForest::from_parts(manifest.programs, manifest.class_of_tree, manifest.num_classes, manifest.initial_offset, manifest.prediction_transform);

    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(&opt.rows).with_context(|| format!("reading rows {}", opt.rows.display()))?;
    for record in reader.records() {
        let record = record?;
        let row: Vec<f64> = record.iter().map(|field| field.parse::<f64>()).collect::<Result<_, _>>().context("parsing a CSV row as floats")?;
        if row.len() != sidecar.row_size as usize {
            bail!("row has {} fields, model expects {}", row.len(), sidecar.row_size);
        }
        let prediction = compiled.predict(representation.as_ref(), &packed, &row);
        if sidecar.number_of_classes >= 2 {
            let class = compiled.argmax_class(representation.as_ref(), &packed, &row);
            println!("{prediction:?} -> class {class}");
        } else {
            println!("{}", prediction[0]);
        }
    }
    Ok(())
}

fn static_layout_name(name: &str) -> Result<&'static str> {
    Ok(match name {
        "array" => "array",
        "sparse" => "sparse",
        "reorg" => "reorg",
        "gpu_array" => "gpu_array",
        "gpu_reorg" => "gpu_reorg",
        other => bail!("unknown layout `{other}` in sidecar"),
    })
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    prefix.with_file_name(name)
}

/// Wraps `CanopyError` so it can be converted into `anyhow::Error` at call
/// sites without an intermediate `.map_err(|e| anyhow!("{e}"))` everywhere.
struct CanopyErrorContext(CanopyError);

impl std::fmt::Debug for CanopyErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for CanopyErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for CanopyErrorContext {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn stats_profile_keeps_each_trees_weights_separate() {
        let path = std::env::temp_dir().join(format!("canopy-stats-test-{}.csv", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "0,0,1.0\n0,1,0.2\n1,0,5.0").unwrap();
        drop(file);

        let by_tree = load_stats_profile(&path).unwrap();
        assert_eq!(by_tree[&0][&0], 1.0);
        assert_eq!(by_tree[&0][&1], 0.2);
        assert_eq!(by_tree[&1][&0], 5.0);
        assert!(!by_tree.contains_key(&2));

        std::fs::remove_file(&path).ok();
    }
}
