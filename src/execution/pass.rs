//! One top-level tile read and everything it pulls.
//!
//! A [`ReadPass`] is created for every consumer read and handed down through
//! every nested source request. It carries the progress monitor and, for
//! contexts running with the tile cache disabled, a short-lived memo so the
//! same `(band, rectangle)` is computed at most once within the pass.

use crate::core::tile::Tile;
use crate::execution::cache::TileKey;
use crate::execution::progress::ProgressMonitor;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// State shared by all requests of one top-level read.
pub struct ReadPass<'a> {
    monitor: &'a ProgressMonitor,
    memo: Mutex<HashMap<TileKey, Arc<Tile>>>,
}

impl<'a> ReadPass<'a> {
    /// Start a pass reporting to `monitor`.
    pub fn new(monitor: &'a ProgressMonitor) -> Self {
        Self {
            monitor,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// The monitor of this pass.
    pub fn monitor(&self) -> &ProgressMonitor {
        self.monitor
    }

    pub(crate) fn recall(&self, key: &TileKey) -> Option<Arc<Tile>> {
        self.memo.lock().get(key).cloned()
    }

    pub(crate) fn remember(&self, key: TileKey, tile: Arc<Tile>) {
        self.memo.lock().insert(key, tile);
    }

    /// Number of tiles memoized in this pass.
    pub fn memoized(&self) -> usize {
        self.memo.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::raster::Raster;
    use crate::core::rect::Rectangle;
    use crate::core::types::PixelType;

    #[test]
    fn test_memo_is_per_pass() {
        let raster = Raster::new("r", "TEST", 8, 8);
        let band = raster.add_band("b1", PixelType::Int16).unwrap();
        let rect = Rectangle::new(0, 0, 4, 4);
        let key = TileKey::new(band.id(), rect);
        let monitor = ProgressMonitor::new();

        let pass = ReadPass::new(&monitor);
        assert!(pass.recall(&key).is_none());
        let tile = Arc::new(Tile::new(rect, PixelType::Int16));
        pass.remember(key, Arc::clone(&tile));
        pass.remember(TileKey::new(band.id(), Rectangle::new(4, 0, 4, 4)), Arc::clone(&tile));
        assert_eq!(pass.memoized(), 2);
        assert!(Arc::ptr_eq(&pass.recall(&key).unwrap(), &tile));

        let next = ReadPass::new(&monitor);
        assert_eq!(next.memoized(), 0);
        assert!(next.recall(&key).is_none());
    }
}
