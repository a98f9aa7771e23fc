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
use crate::params::PackingParams;

/// Sentinel feature index for an unoccupied heap slot (spec.md 4.2): must
/// never be read during a valid traversal.
pub const SENTINEL_FEATURE_INDEX: i32 = -1;

/// The packed output of one serializer run (spec.md 3 "Packed buffers").
#[derive(Clone, Debug)]
pub struct PackedModel {
    pub layout: &'static str,
    pub params: PackingParams,
    pub model_bytes: Vec<u8>,
    pub offsets: Vec<i32>,
    pub lengths: Vec<i32>,
    pub class_ids: Option<Vec<i32>>,
}

pub fn write_threshold_le(buf: &mut [u8], width: u32, value: f64) {
    match width {
        32 => buf[..4].copy_from_slice(&(value as f32).to_le_bytes()),
        64 => buf[..8].copy_from_slice(&value.to_le_bytes()),
        _ => unreachable!("PackingParams::validate rejects other widths"),
    }
}

pub fn read_threshold_le(buf: &[u8], width: u32) -> f64 {
    match width {
        32 => f32::from_le_bytes(buf[..4].try_into().unwrap()) as f64,
        64 => f64::from_le_bytes(buf[..8].try_into().unwrap()),
        _ => unreachable!("PackingParams::validate rejects other widths"),
    }
}

pub fn write_feature_index_le(buf: &mut [u8], width: u32, value: i32) {
    match width {
        8 => buf[0] = value as i8 as u8,
        16 => buf[..2].copy_from_slice(&(value as i16).to_le_bytes()),
        32 => buf[..4].copy_from_slice(&value.to_le_bytes()),
        _ => unreachable!("PackingParams::validate rejects other widths"),
    }
}

pub fn read_feature_index_le(buf: &[u8], width: u32) -> i32 {
    match width {
        8 => buf[0] as i8 as i32,
        16 => i16::from_le_bytes(buf[..2].try_into().unwrap()) as i32,
        32 => i32::from_le_bytes(buf[..4].try_into().unwrap()),
        _ => unreachable!("PackingParams::validate rejects other widths"),
    }
}

/// Writes one tile record (`threshold[T] ++ feature_index[T]`) at `buf[..]`.
/// `buf` must be exactly `params.tile_record_bytes()` long.
pub fn write_record(buf: &mut [u8], params: &PackingParams, thresholds: &[f64], feature_indices: &[i32]) {
    let wt = (params.threshold_width / 8) as usize;
    for (i, &t) in thresholds.iter().enumerate() {
        write_threshold_le(&mut buf[i * wt..], params.threshold_width, t);
    }
    let offset = params.feature_index_offset();
    let wi = (params.feature_index_width / 8) as usize;
    for (i, &f) in feature_indices.iter().enumerate() {
        write_feature_index_le(&mut buf[offset + i * wi..], params.feature_index_width, f);
    }
}

pub fn read_record(buf: &[u8], params: &PackingParams) -> (Vec<f64>, Vec<i32>) {
    let wt = (params.threshold_width / 8) as usize;
    let thresholds = (0..params.tile_size as usize)
        .map(|i| read_threshold_le(&buf[i * wt..], params.threshold_width))
        .collect();
    let offset = params.feature_index_offset();
    let wi = (params.feature_index_width / 8) as usize;
    let feature_indices = (0..params.tile_size as usize)
        .map(|i| read_feature_index_le(&buf[offset + i * wi..], params.feature_index_width))
        .collect();
    (thresholds, feature_indices)
}
