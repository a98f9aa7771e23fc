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
use structopt::StructOpt;
use tracing_subscriber::{fmt, EnvFilter};

// Adapted from the original Nitrogen TraceLog extension (itself inspired by
// bevy_log), minus the nitrous/runtime ECS-resource plumbing: the compiler
// has no long-lived app loop to inject a resource into, so logging is just
// installed once at the top of `main`.
#[derive(Clone, Debug, StructOpt)]
pub struct TraceLogOpts {
    /// Increase log verbosity (-v, -vv, -vvv).
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u8,
}

pub fn init(opts: &TraceLogOpts) -> Result<()> {
    let default_level = match opts.verbose {
        0 => "canopy=info",
        1 => "canopy=debug",
        _ => "canopy=trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_target(false).try_init().ok();
    Ok(())
}
