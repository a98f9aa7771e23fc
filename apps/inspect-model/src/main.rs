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
use anyhow::Result;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "inspect-model", about = "Show the contents of a compiled model.")]
struct Opt {
    /// Dump the packed buffer's raw bytes.
    #[structopt(short, long)]
    dump_bytes: bool,

    /// Model sidecar (JSON) to inspect; the packed buffer is expected
    /// alongside it with a `.bin` extension unless `--buffer` is given.
    #[structopt(parse(from_os_str))]
    sidecar: PathBuf,

    /// Packed buffer file, if it doesn't sit next to the sidecar.
    #[structopt(long, parse(from_os_str))]
    buffer: Option<PathBuf>,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    let sidecar = model_io::read_sidecar(&opt.sidecar)?;
    println!("layout: {}", sidecar.layout);
    println!("row size: {}", sidecar.row_size);
    println!("batch size: {}", sidecar.batch_size);
    println!("trees: {}", sidecar.number_of_trees);
    println!("classes: {}", sidecar.number_of_classes);
    println!("tile size: {}", sidecar.tile_size);
    println!(
        "threshold width: {} bits, feature index width: {} bits",
        sidecar.threshold_type_width, sidecar.feature_index_type_width
    );
    println!("node index width: {} bits", sidecar.node_index_type_width);
    println!("tile shape width: {} bits, child index width: {} bits", sidecar.tile_shape_bit_width, sidecar.child_index_bit_width);

    if let Some(thresholds) = &sidecar.thresholds {
        println!("inline thresholds: {} entries", thresholds.len());
    }
    if let Some(feature_indices) = &sidecar.feature_indices {
        println!("inline feature indices: {} entries", feature_indices.len());
    }
    if let Some(class_ids) = &sidecar.class_ids {
        println!("class ids: {:?}", class_ids);
    }

    let buffer_path = opt.buffer.unwrap_or_else(|| opt.sidecar.with_extension("bin"));
    match model_io::read_packed_buffer(&buffer_path) {
        Ok(bytes) => {
            println!("packed buffer: {} ({} bytes)", buffer_path.display(), bytes.len());
            if opt.dump_bytes {
                for chunk in bytes.chunks(16) {
                    let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
                    println!("  {}", hex.join(" "));
                }
            }
        }
        Err(model_io::ModelIoError::BufferMissing(path)) => {
            println!("packed buffer: {} (not found)", path.display());
        }
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
