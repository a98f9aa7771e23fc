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

//! Device/buffer plumbing for the GPU backend (C9). No real `wgpu` adapter
//! is assumed to be present; `Gpu` tracks named byte buffers the way the
//! original device held `wgpu::Buffer`s, and `UploadTracker` queues
//! buffer-to-buffer copies the same way, but both execute in-process
//! against plain `Vec<u8>`s rather than a physical device.
mod upload_tracker;

pub use upload_tracker::{BufferCopyDescriptor, UploadTracker};

use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no buffer named `{0}` has been allocated")]
    UnknownBuffer(String),
    #[error("buffer `{name}` is {actual} bytes, copy needs {needed}")]
    OutOfBounds {
        name: String,
        actual: usize,
        needed: usize,
    },
}

/// A single device-resident allocation, keyed by name so later kernels and
/// copy descriptors can find it without threading a handle through every
/// call site.
#[derive(Debug, Default)]
pub struct Gpu {
    buffers: HashMap<String, Arc<RwLock<Vec<u8>>>>,
}

impl Gpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Init_*` buffers: allocate `len` zeroed bytes under `name`.
    pub fn alloc_buffer(&mut self, name: impl Into<String>, len: usize) -> Arc<RwLock<Vec<u8>>> {
        let buffer = Arc::new(RwLock::new(vec![0u8; len]));
        self.buffers.insert(name.into(), buffer.clone());
        buffer
    }

    pub fn buffer(&self, name: &str) -> Result<Arc<RwLock<Vec<u8>>>, GpuError> {
        self.buffers
            .get(name)
            .cloned()
            .ok_or_else(|| GpuError::UnknownBuffer(name.to_string()))
    }

    /// `Dealloc_Buffers`: drop every tracked allocation for this compile.
    pub fn dealloc_all(&mut self) {
        self.buffers.clear();
    }

    pub fn buffer_names(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_then_dealloc_clears_buffers() {
        let mut gpu = Gpu::new();
        gpu.alloc_buffer("thresholds", 64);
        assert!(gpu.buffer("thresholds").is_ok());
        gpu.dealloc_all();
        assert!(matches!(gpu.buffer("thresholds"), Err(GpuError::UnknownBuffer(_))));
    }
}
