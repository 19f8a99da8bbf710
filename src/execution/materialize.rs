//! Pulling every tile of a target.
//!
//! Tiles of one raster are read sequentially; independent rasters passed to
//! [`materialize_all`] are evaluated in parallel with rayon.

use crate::core::error::OperatorResult;
use crate::core::raster::{Band, Raster};
use crate::core::rect::TileGrid;
use crate::core::tile::Tile;
use crate::execution::progress::ProgressMonitor;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Summary of one materialization.
#[derive(Debug, Clone, Default)]
pub struct MaterializeStats {
    /// Number of bands read.
    pub bands: usize,
    /// Number of tiles read.
    pub tiles: usize,
    /// Wall time.
    pub duration: Duration,
}

/// Read every tile of every band of `raster`.
pub fn materialize(
    raster: &Raster,
    tile_width: u32,
    tile_height: u32,
    monitor: &ProgressMonitor,
) -> OperatorResult<MaterializeStats> {
    let grid = TileGrid::new(raster.width(), raster.height(), tile_width, tile_height);
    monitor.begin_task(
        format!("Materializing '{}'", raster.name()),
        (grid.tile_count() * raster.band_count()) as u64,
    );
    let stats = pull_all(raster, tile_width, tile_height, monitor)?;
    monitor.done();
    Ok(stats)
}

/// Materialize independent rasters in parallel.
///
/// Results are returned in input order. Cancelling `monitor` stops every
/// raster at its next tile.
pub fn materialize_all(
    rasters: &[Arc<Raster>],
    tile_width: u32,
    tile_height: u32,
    monitor: &ProgressMonitor,
) -> Vec<OperatorResult<MaterializeStats>> {
    let total: usize = rasters
        .iter()
        .map(|r| TileGrid::new(r.width(), r.height(), tile_width, tile_height).tile_count() * r.band_count())
        .sum();
    monitor.begin_task(format!("Materializing {} rasters", rasters.len()), total as u64);
    let results = rasters
        .par_iter()
        .map(|raster| pull_all(raster, tile_width, tile_height, monitor))
        .collect();
    monitor.done();
    results
}

fn pull_all(
    raster: &Raster,
    tile_width: u32,
    tile_height: u32,
    monitor: &ProgressMonitor,
) -> OperatorResult<MaterializeStats> {
    let start = Instant::now();
    let mut stats = MaterializeStats::default();
    for band in raster.bands() {
        for rect in TileGrid::new(raster.width(), raster.height(), tile_width, tile_height) {
            monitor.check_cancelled()?;
            band.read_tile_with(rect, monitor)?;
            monitor.worked(1);
            stats.tiles += 1;
        }
        stats.bands += 1;
    }
    stats.duration = start.elapsed();
    log::debug!(
        "Materialized '{}': {} tiles in {:?}",
        raster.name(),
        stats.tiles,
        stats.duration
    );
    Ok(stats)
}

/// Assemble the whole band from tiles of the given size.
pub fn read_band(
    band: &Band,
    tile_width: u32,
    tile_height: u32,
    monitor: &ProgressMonitor,
) -> OperatorResult<Tile> {
    let mut full = Tile::new(band.bounds(), band.pixel_type());
    for rect in TileGrid::new(band.width(), band.height(), tile_width, tile_height) {
        monitor.check_cancelled()?;
        let tile = band.read_tile_with(rect, monitor)?;
        full.copy_from(&tile);
    }
    Ok(full)
}
