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

//! The process-wide serializer registry (spec.md 4.3, 9): named factories
//! layouts register at process start, and the CLI/config picks one by
//! name. `gpu_array`/`gpu_reorg` reuse the host-side `array`/`reorg`
//! packing -- device residency is the `gpu_backend` crate's concern, not
//! the byte layout itself.
use crate::{array::ArraySerializer, reorg::ReorgSerializer, serializer::Serializer, sparse::SparseSerializer};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;

type Factory = fn() -> Box<dyn Serializer>;

static REGISTRY: Lazy<Mutex<HashMap<&'static str, Factory>>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, Factory> = HashMap::new();
    m.insert("array", || Box::new(ArraySerializer));
    m.insert("sparse", || Box::new(SparseSerializer));
    m.insert("reorg", || Box::new(ReorgSerializer));
    m.insert("gpu_array", || Box::new(ArraySerializer));
    m.insert("gpu_reorg", || Box::new(ReorgSerializer));
    Mutex::new(m)
});

pub fn register(name: &'static str, factory: Factory) {
    REGISTRY.lock().insert(name, factory);
}

pub fn create(name: &str) -> Option<Box<dyn Serializer>> {
    REGISTRY.lock().get(name).map(|factory| factory())
}
