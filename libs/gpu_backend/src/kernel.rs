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

//! Kernel outlining for the GPU target (spec.md 4.6): one compute shader
//! per `Init_*` function, each thread copying its own tile record (or
//! offset/length/class-id slot) from a staging buffer into the device
//! buffer the runtime initializer allocates. Threads never touch each
//! other's slots, the same disjointness spec.md 5 already requires of the
//! CPU initializers.
use forest::CanopyError;
use naga::valid::{Capabilities, ValidationFlags, Validator};

/// One outlined `Init_*` kernel: WGSL source text plus the workgroup count
/// a dispatch needs to cover every element.
#[derive(Clone, Debug)]
pub struct GpuKernelSource {
    pub entry_point: &'static str,
    pub source: String,
    pub element_count: u32,
}

const WORKGROUP_SIZE: u32 = 64;

fn workgroup_count(element_count: u32) -> u32 {
    element_count.div_ceil(WORKGROUP_SIZE).max(1)
}

/// Outlines a per-element byte copy kernel: `entry_point` reads one
/// `stride`-byte record per invocation from `src` and writes it to `dst`
/// at the same index, matching the `Init_Model`/`Init_Thresholds`/
/// `Init_FeatureIndices`/`Init_ClassIDs`/`Init_Offsets`/`Init_Lengths`
/// per-thread write spec.md 4.6 describes.
fn copy_kernel(entry_point: &'static str, element_count: u32, stride_words: u32) -> GpuKernelSource {
    let source = format!(
        "struct Record {{ words: array<u32, {stride_words}>, }}\n\
         @group(0) @binding(0) var<storage, read> src: array<Record>;\n\
         @group(0) @binding(1) var<storage, read_write> dst: array<Record>;\n\
         @compute @workgroup_size({WORKGROUP_SIZE})\n\
         fn {entry_point}(@builtin(global_invocation_id) gid: vec3<u32>) {{\n\
         \x20   let i = gid.x;\n\
         \x20   if (i >= arrayLength(&dst)) {{ return; }}\n\
         \x20   dst[i] = src[i];\n\
         }}\n"
    );
    GpuKernelSource {
        entry_point,
        source,
        element_count,
    }
}

pub fn init_model_kernel(tile_record_bytes: u32, tile_count: u32) -> GpuKernelSource {
    let stride_words = tile_record_bytes.div_ceil(4).max(1);
    copy_kernel("Init_Model", tile_count, stride_words)
}

pub fn init_thresholds_kernel(count: u32) -> GpuKernelSource {
    copy_kernel("Init_Thresholds", count, 1)
}

pub fn init_feature_indices_kernel(count: u32) -> GpuKernelSource {
    copy_kernel("Init_FeatureIndices", count, 1)
}

pub fn init_class_ids_kernel(count: u32) -> GpuKernelSource {
    copy_kernel("Init_ClassIDs", count, 1)
}

pub fn init_offsets_kernel(count: u32) -> GpuKernelSource {
    copy_kernel("Init_Offsets", count, 1)
}

pub fn init_lengths_kernel(count: u32) -> GpuKernelSource {
    copy_kernel("Init_Lengths", count, 1)
}

impl GpuKernelSource {
    pub fn dispatch_workgroups(&self) -> u32 {
        workgroup_count(self.element_count)
    }

    /// Parses and validates the kernel with `naga`'s WGSL front end; any
    /// malformed kernel text is a compiler bug, not a user-facing error,
    /// but we still report it through the shared error taxonomy.
    pub fn validate(&self) -> Result<(), CanopyError> {
        let module = naga::front::wgsl::parse_str(&self.source)
            .map_err(|e| CanopyError::LoweringFailure {
                pass: "gpu_kernel_outlining".to_string(),
                reason: e.to_string(),
            })?;
        let mut validator = Validator::new(ValidationFlags::all(), Capabilities::empty());
        validator.validate(&module).map_err(|e| CanopyError::LoweringFailure {
            pass: "gpu_kernel_outlining".to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_init_kernel_is_valid_wgsl() {
        for kernel in [
            init_model_kernel(12, 4),
            init_thresholds_kernel(4),
            init_feature_indices_kernel(4),
            init_class_ids_kernel(3),
            init_offsets_kernel(2),
            init_lengths_kernel(2),
        ] {
            kernel.validate().unwrap();
        }
    }

    #[test]
    fn dispatch_workgroups_covers_every_element() {
        let kernel = init_thresholds_kernel(200);
        assert_eq!(kernel.dispatch_workgroups(), 4);
    }
}
