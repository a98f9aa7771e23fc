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
use crate::{Gpu, GpuError};

/// A queued buffer-to-buffer copy, named rather than handle-addressed so
/// it can be built up before any buffer actually exists (mirrors the
/// init-then-wire-copies order the packed buffer store uses).
#[derive(Debug, Clone)]
pub struct BufferCopyDescriptor {
    pub source: Vec<u8>,
    pub destination: String,
    pub destination_offset: usize,
}

impl BufferCopyDescriptor {
    pub fn new(source: Vec<u8>, destination: impl Into<String>, destination_offset: usize) -> Self {
        Self {
            source,
            destination: destination.into(),
            destination_offset,
        }
    }
}

/// Queues copies for later, disjoint dispatch. The spec's initialization
/// writes are disjoint by tile, so queued copies never need ordering
/// against each other -- only against the allocation they target.
#[derive(Debug, Default)]
pub struct UploadTracker {
    uploads: Vec<BufferCopyDescriptor>,
}

impl UploadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&mut self, desc: BufferCopyDescriptor) {
        self.uploads.push(desc);
    }

    pub fn dispatch(&mut self, gpu: &Gpu) -> Result<(), GpuError> {
        for desc in self.uploads.drain(..) {
            let buffer = gpu.buffer(&desc.destination)?;
            let mut bytes = buffer.write();
            let end = desc.destination_offset + desc.source.len();
            if end > bytes.len() {
                return Err(GpuError::OutOfBounds {
                    name: desc.destination,
                    actual: bytes.len(),
                    needed: end,
                });
            }
            bytes[desc.destination_offset..end].copy_from_slice(&desc.source);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_copy_lands_at_offset() {
        let mut gpu = Gpu::new();
        gpu.alloc_buffer("target", 8);
        let mut tracker = UploadTracker::new();
        tracker.queue(BufferCopyDescriptor::new(vec![1, 2, 3], "target", 4));
        tracker.dispatch(&gpu).unwrap();
        let buffer = gpu.buffer("target").unwrap();
        assert_eq!(&buffer.read()[4..7], &[1, 2, 3]);
    }

    #[test]
    fn copy_past_end_is_reported() {
        let mut gpu = Gpu::new();
        gpu.alloc_buffer("target", 4);
        let mut tracker = UploadTracker::new();
        tracker.queue(BufferCopyDescriptor::new(vec![1, 2, 3], "target", 3));
        assert!(matches!(tracker.dispatch(&gpu), Err(GpuError::OutOfBounds { .. })));
    }
}
