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

//! The GPU target (C9): kernel outlining into validated WGSL plus a
//! `rayon`-parallel CPU fallback runtime that a caller with no `wgpu`
//! adapter uses instead. The two are checked against each other and
//! against the sequential CPU packed-buffer store in `init::tests`.
mod init;
mod kernel;

pub use init::GpuRuntime;
pub use kernel::{
    init_class_ids_kernel, init_feature_indices_kernel, init_lengths_kernel, init_model_kernel, init_offsets_kernel, init_thresholds_kernel,
    GpuKernelSource,
};
