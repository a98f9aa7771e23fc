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

//! The GPU-side runtime initializer functions (spec.md 4.6/5): for each,
//! outlines the WGSL kernel a real device would dispatch, and performs
//! the same disjoint per-record write with a `rayon`-parallel CPU
//! executor used when no `wgpu` adapter is available. Both write the
//! identical bytes because every record they touch is disjoint from
//! every other, so there is nothing for the two paths to race on.
use crate::kernel::{
    init_class_ids_kernel, init_feature_indices_kernel, init_lengths_kernel, init_model_kernel, init_offsets_kernel, init_thresholds_kernel,
    GpuKernelSource,
};
use gpu::Gpu;
use rayon::prelude::*;
use serialize::PackedModel;

/// Splits `src` and `dst` into `record_bytes`-sized chunks and copies each
/// chunk in parallel. `record_bytes` of 0 degenerates to a no-op, which
/// only happens for an empty model.
fn parallel_copy(dst: &mut [u8], src: &[u8], record_bytes: usize) {
    if record_bytes == 0 {
        return;
    }
    dst.par_chunks_mut(record_bytes).zip(src.par_chunks(record_bytes)).for_each(|(d, s)| d.copy_from_slice(s));
}

fn i32_bytes(values: &[i32]) -> Vec<u8> {
    values.par_iter().flat_map_iter(|v| v.to_le_bytes()).collect()
}

/// Owns the device-buffer allocations for one compiled model. Mirrors
/// `gpu::Gpu` directly; the extra layer exists so the `Init_*` functions
/// read naturally as one call each, the way spec.md 5 names them.
pub struct GpuRuntime {
    gpu: Gpu,
}

impl Default for GpuRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuRuntime {
    pub fn new() -> Self {
        Self { gpu: Gpu::new() }
    }

    pub fn init_model(&mut self, model: &PackedModel) -> GpuKernelSource {
        let record_bytes = model.params.tile_record_bytes().max(1);
        let tile_count = (model.model_bytes.len() / record_bytes) as u32;
        let kernel = init_model_kernel(record_bytes as u32, tile_count);
        let mut buffer = vec![0u8; model.model_bytes.len()];
        parallel_copy(&mut buffer, &model.model_bytes, record_bytes);
        self.gpu.alloc_buffer("model", buffer.len());
        *self.gpu.buffer("model").unwrap().write() = buffer;
        kernel
    }

    /// Reorg-layout thresholds, already the bytes the sidecar would carry.
    pub fn init_thresholds(&mut self, thresholds: &[u8], width_bytes: usize) -> GpuKernelSource {
        let count = (thresholds.len() / width_bytes.max(1)) as u32;
        let kernel = init_thresholds_kernel(count);
        let mut buffer = vec![0u8; thresholds.len()];
        parallel_copy(&mut buffer, thresholds, width_bytes);
        self.gpu.alloc_buffer("thresholds", buffer.len());
        *self.gpu.buffer("thresholds").unwrap().write() = buffer;
        kernel
    }

    pub fn init_feature_indices(&mut self, feature_indices: &[u8], width_bytes: usize) -> GpuKernelSource {
        let count = (feature_indices.len() / width_bytes.max(1)) as u32;
        let kernel = init_feature_indices_kernel(count);
        let mut buffer = vec![0u8; feature_indices.len()];
        parallel_copy(&mut buffer, feature_indices, width_bytes);
        self.gpu.alloc_buffer("feature_indices", buffer.len());
        *self.gpu.buffer("feature_indices").unwrap().write() = buffer;
        kernel
    }

    pub fn init_class_ids(&mut self, class_ids: &[i32]) -> GpuKernelSource {
        let kernel = init_class_ids_kernel(class_ids.len() as u32);
        let bytes = i32_bytes(class_ids);
        self.gpu.alloc_buffer("class_ids", bytes.len());
        *self.gpu.buffer("class_ids").unwrap().write() = bytes;
        kernel
    }

    pub fn init_offsets(&mut self, offsets: &[i32]) -> GpuKernelSource {
        let kernel = init_offsets_kernel(offsets.len() as u32);
        let bytes = i32_bytes(offsets);
        self.gpu.alloc_buffer("offsets", bytes.len());
        *self.gpu.buffer("offsets").unwrap().write() = bytes;
        kernel
    }

    pub fn init_lengths(&mut self, lengths: &[i32]) -> GpuKernelSource {
        let kernel = init_lengths_kernel(lengths.len() as u32);
        let bytes = i32_bytes(lengths);
        self.gpu.alloc_buffer("lengths", bytes.len());
        *self.gpu.buffer("lengths").unwrap().write() = bytes;
        kernel
    }

    /// `Dealloc_Buffers`: releases every device allocation this runtime owns.
    pub fn dealloc_buffers(&mut self) {
        self.gpu.dealloc_all();
    }

    pub fn buffer_bytes(&self, name: &str) -> Vec<u8> {
        self.gpu.buffer(name).expect("buffer must be initialized first").read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forest::{FeatureType, ForestBuilder, LEAF_FEATURE_INDEX};
    use serialize::{create, PackingParams};
    use tiling::{build_tiled_tree, TileColoring, UniformTiling};

    fn two_tree_forest() -> forest::Forest {
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
        let root = b.new_node(0.0, 1).unwrap();
        let l = b.new_node(-0.5, LEAF_FEATURE_INDEX).unwrap();
        let r = b.new_node(0.5, LEAF_FEATURE_INDEX).unwrap();
        b.set_left_child(root, l).unwrap();
        b.set_right_child(root, r).unwrap();
        b.end_tree().unwrap();
        b.persist().unwrap()
    }

    // Cross-check: the rayon fallback executor must write exactly the
    // bytes the sequential CPU-side packed buffer store holds, since
    // both read from the same `PackedModel` and every record they touch
    // is disjoint (spec.md 5).
    #[test]
    fn rayon_fallback_matches_sequential_packed_buffers() {
        let forest = two_tree_forest();
        let params = PackingParams {
            tile_size: 1,
            threshold_width: 64,
            feature_index_width: 32,
        };
        let tiled: Vec<_> = forest
            .trees
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let coloring = UniformTiling { tile_size: 1 };
                let tiling = coloring.color(t);
                build_tiled_tree(i, t, &tiling).unwrap()
            })
            .collect();
        let serializer = create("array").unwrap();
        let packed = serializer.serialize(&forest, &tiled, &params).unwrap();

        serialize::persist(&packed);
        let expected_model = serialize::initialize_buffer();
        let expected_offsets = serialize::initialize_offset_buffer();
        let expected_lengths = serialize::initialize_length_buffer();

        let mut runtime = GpuRuntime::new();
        let model_kernel = runtime.init_model(&packed);
        let offsets_kernel = runtime.init_offsets(&packed.offsets);
        let lengths_kernel = runtime.init_lengths(&packed.lengths);

        assert_eq!(runtime.buffer_bytes("model"), expected_model);
        let offset_words: Vec<i32> = runtime.buffer_bytes("offsets").chunks(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        assert_eq!(offset_words, expected_offsets);
        let length_words: Vec<i32> = runtime.buffer_bytes("lengths").chunks(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        assert_eq!(length_words, expected_lengths);

        for kernel in [model_kernel, offsets_kernel, lengths_kernel] {
            kernel.validate().unwrap();
        }

        runtime.dealloc_buffers();
        serialize::clear_all_data();
    }

    #[test]
    fn dealloc_clears_every_buffer() {
        let mut runtime = GpuRuntime::new();
        runtime.init_class_ids(&[0, 1]);
        runtime.dealloc_buffers();
        assert!(std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| runtime.buffer_bytes("class_ids"))).is_err());
    }
}
