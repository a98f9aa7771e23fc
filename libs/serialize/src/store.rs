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

//! The per-process packed-buffer singleton (spec.md 5, DESIGN NOTES 9):
//! couples the compile and runtime phases while they share an address
//! space. Its only mutators are `persist`/`add_single_tree`/`clear_all`;
//! its only readers are the three `initialize_*` functions. Not
//! concurrent-safe across compilations from multiple threads -- callers
//! must serialize externally, same as the source.
use crate::pack::PackedModel;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

#[derive(Default)]
struct PackedBufferStore {
    model_bytes: Vec<u8>,
    offsets: Vec<i32>,
    lengths: Vec<i32>,
    class_ids: Vec<i32>,
}

static PACKED_STORE: Lazy<Mutex<PackedBufferStore>> = Lazy::new(|| Mutex::new(PackedBufferStore::default()));

/// Replaces the store's contents wholesale with a freshly serialized model.
pub fn persist(model: &PackedModel) {
    let mut store = PACKED_STORE.lock();
    store.model_bytes = model.model_bytes.clone();
    store.offsets = model.offsets.clone();
    store.lengths = model.lengths.clone();
    store.class_ids = model.class_ids.clone().unwrap_or_default();
}

/// Appends one additional tree's already-packed bytes to the store (used
/// when a forest grows incrementally, e.g. one boosting round at a time).
pub fn add_single_tree(tree_bytes: &[u8], offset: i32, length: i32, class_id: Option<i32>) {
    let mut store = PACKED_STORE.lock();
    store.model_bytes.extend_from_slice(tree_bytes);
    store.offsets.push(offset);
    store.lengths.push(length);
    if let Some(id) = class_id {
        store.class_ids.push(id);
    }
}

pub fn clear_all_data() {
    let mut store = PACKED_STORE.lock();
    *store = PackedBufferStore::default();
}

pub fn initialize_buffer() -> Vec<u8> {
    PACKED_STORE.lock().model_bytes.clone()
}

pub fn initialize_offset_buffer() -> Vec<i32> {
    PACKED_STORE.lock().offsets.clone()
}

pub fn initialize_length_buffer() -> Vec<i32> {
    PACKED_STORE.lock().lengths.clone()
}

pub fn initialize_class_id_buffer() -> Vec<i32> {
    PACKED_STORE.lock().class_ids.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PackingParams;

    fn sample_model() -> PackedModel {
        PackedModel {
            layout: "array",
            params: PackingParams {
                tile_size: 1,
                threshold_width: 32,
                feature_index_width: 16,
            },
            model_bytes: vec![1, 2, 3, 4, 5, 6],
            offsets: vec![0],
            lengths: vec![1],
            class_ids: None,
        }
    }

    #[test]
    fn persist_then_clear_round_trips() {
        clear_all_data();
        persist(&sample_model());
        assert_eq!(initialize_buffer(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(initialize_offset_buffer(), vec![0]);
        assert_eq!(initialize_length_buffer(), vec![1]);
        clear_all_data();
        assert!(initialize_buffer().is_empty());
    }
}
