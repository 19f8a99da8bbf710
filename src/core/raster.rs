//! Raster data model.
//!
//! A [`Raster`] is a named, fixed-size dataset with insertion-ordered,
//! uniquely named [`Band`]s and a metadata tree. Rasters and bands are shared
//! as `Arc`s; the engine compares them by identity, never by value.
//!
//! A band's samples come from exactly one source:
//! - an in-memory buffer covering the whole band
//! - an external [`SampleReader`] (format/storage layer)
//! - the [`OperatorContext`] that computes it on demand
//!
//! A band with no source yet is *unset*; when an operator initializes, the
//! engine attaches its context to every unset band of the target.

use crate::core::error::{BandId, OperatorError, OperatorResult, RasterId};
use crate::core::metadata::MetadataElement;
use crate::core::rect::Rectangle;
use crate::core::tile::{Tile, TileData};
use crate::core::types::PixelType;
use crate::execution::context::OperatorContext;
use crate::execution::pass::ReadPass;
use crate::execution::progress::ProgressMonitor;
use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Name of the root metadata element of every raster.
pub const METADATA_ROOT: &str = "metadata";

/// Synchronous access to samples held by a storage layer.
pub trait SampleReader: Send + Sync {
    /// Fill `tile` with the samples of `band` covering `tile.rectangle()`.
    fn read_samples(&self, band: &Band, tile: &mut Tile) -> OperatorResult<()>;
}

#[derive(Clone)]
enum BandSource {
    Unset,
    Memory(Arc<TileData>),
    Reader(Arc<dyn SampleReader>),
    Operator(Arc<OperatorContext>),
}

/// Kind of sample source currently attached to a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSourceKind {
    /// No samples yet
    Unset,
    /// Whole-band buffer in memory
    Memory,
    /// External storage reader
    Reader,
    /// Computed by an operator
    Operator,
}

/// One named, typed channel of a raster.
pub struct Band {
    id: BandId,
    name: String,
    pixel_type: PixelType,
    width: u32,
    height: u32,
    raster_name: String,
    source: RwLock<BandSource>,
}

impl Band {
    fn new(raster: &Raster, name: String, pixel_type: PixelType) -> Self {
        Self {
            id: BandId::new(),
            name,
            pixel_type,
            width: raster.width,
            height: raster.height,
            raster_name: raster.name.clone(),
            source: RwLock::new(BandSource::Unset),
        }
    }

    /// Band identity.
    pub fn id(&self) -> BandId {
        self.id
    }

    /// Band name, unique within its raster.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sample type.
    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    /// Width in pixels (same as the raster).
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels (same as the raster).
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Rectangle covering the whole band.
    pub fn bounds(&self) -> Rectangle {
        Rectangle::of_size(self.width, self.height)
    }

    /// Name of the raster this band belongs to.
    pub fn raster_name(&self) -> &str {
        &self.raster_name
    }

    /// Kind of sample source attached to this band.
    pub fn source_kind(&self) -> SampleSourceKind {
        match &*self.source.read() {
            BandSource::Unset => SampleSourceKind::Unset,
            BandSource::Memory(_) => SampleSourceKind::Memory,
            BandSource::Reader(_) => SampleSourceKind::Reader,
            BandSource::Operator(_) => SampleSourceKind::Operator,
        }
    }

    /// Whether samples can be read from this band.
    pub fn has_samples(&self) -> bool {
        self.source_kind() != SampleSourceKind::Unset
    }

    /// The operator context computing this band, if any.
    pub fn producer(&self) -> Option<Arc<OperatorContext>> {
        match &*self.source.read() {
            BandSource::Operator(ctx) => Some(Arc::clone(ctx)),
            _ => None,
        }
    }

    /// Attach a whole-band sample buffer.
    pub fn set_samples(&self, data: TileData) -> OperatorResult<()> {
        if data.pixel_type() != self.pixel_type {
            return Err(OperatorError::BufferMismatch(format!(
                "band '{}' is {}, samples are {}",
                self.name,
                self.pixel_type,
                data.pixel_type()
            )));
        }
        if data.len() as u64 != self.bounds().area() {
            return Err(OperatorError::BufferMismatch(format!(
                "band '{}' needs {} samples, got {}",
                self.name,
                self.bounds().area(),
                data.len()
            )));
        }
        *self.source.write() = BandSource::Memory(Arc::new(data));
        Ok(())
    }

    /// Attach a whole-band sample buffer given as `f64` values.
    pub fn set_samples_f64(&self, samples: &[f64]) -> OperatorResult<()> {
        self.set_samples(TileData::from_f64(self.pixel_type, samples))
    }

    /// Fill the band from a function of the pixel position.
    pub fn fill_with<F>(&self, f: F) -> OperatorResult<()>
    where
        F: Fn(u32, u32) -> f64,
    {
        let mut tile = Tile::new(self.bounds(), self.pixel_type);
        for (x, y) in tile.positions().collect::<Vec<_>>() {
            tile.set_sample_f64(x, y, f(x, y));
        }
        self.set_samples(tile.into_data())
    }

    /// Attach an external sample reader.
    pub fn set_reader(&self, reader: Arc<dyn SampleReader>) {
        *self.source.write() = BandSource::Reader(reader);
    }

    pub(crate) fn attach_operator(&self, context: Arc<OperatorContext>) {
        *self.source.write() = BandSource::Operator(context);
    }

    pub(crate) fn detach(&self) {
        *self.source.write() = BandSource::Unset;
    }

    /// Read a tile of this band as a top-level request.
    ///
    /// The rectangle is clamped to the band bounds.
    pub fn read_tile(&self, rect: Rectangle) -> OperatorResult<Arc<Tile>> {
        let monitor = ProgressMonitor::new();
        self.read_tile_with(rect, &monitor)
    }

    /// Read a tile of this band, reporting to and honouring cancellation of `monitor`.
    pub fn read_tile_with(
        &self,
        rect: Rectangle,
        monitor: &ProgressMonitor,
    ) -> OperatorResult<Arc<Tile>> {
        let pass = ReadPass::new(monitor);
        self.read_tile_in(rect, &pass)
    }

    /// Read samples covering `rect` as `f64`, row-major.
    pub fn read_samples_f64(&self, rect: Rectangle) -> OperatorResult<Vec<f64>> {
        Ok(self.read_tile(rect)?.samples_f64())
    }

    pub(crate) fn read_tile_in(&self, rect: Rectangle, pass: &ReadPass<'_>) -> OperatorResult<Arc<Tile>> {
        let clamped = rect.clamp_to(self.width, self.height);
        if clamped.is_empty() {
            return Err(OperatorError::InvalidRegion {
                band: self.name.clone(),
                rect,
            });
        }

        let source = self.source.read().clone();
        match source {
            BandSource::Unset => Err(OperatorError::NoSamples {
                band: self.name.clone(),
            }),
            BandSource::Memory(data) => {
                let mut tile = Tile::new(clamped, self.pixel_type);
                let stride = self.width as usize;
                tile.data_mut().copy_block(
                    clamped.width as usize,
                    0,
                    &data,
                    stride,
                    clamped.y as usize * stride + clamped.x as usize,
                    clamped.width as usize,
                    clamped.height as usize,
                );
                Ok(Arc::new(tile))
            }
            BandSource::Reader(reader) => {
                pass.monitor().check_cancelled()?;
                let mut tile = Tile::new(clamped, self.pixel_type);
                reader.read_samples(self, &mut tile)?;
                Ok(Arc::new(tile))
            }
            BandSource::Operator(context) => context.compute_tile(self, clamped, pass),
        }
    }
}

impl std::fmt::Debug for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Band")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("pixel_type", &self.pixel_type)
            .field("source", &self.source_kind())
            .finish()
    }
}

/// A named, fixed-size, multi-band raster dataset.
pub struct Raster {
    id: RasterId,
    name: String,
    raster_type: String,
    width: u32,
    height: u32,
    bands: RwLock<IndexMap<String, Arc<Band>>>,
    metadata: Mutex<MetadataElement>,
    file_location: RwLock<Option<PathBuf>>,
    producer: RwLock<Option<Arc<OperatorContext>>>,
    disposed: AtomicBool,
}

impl Raster {
    /// Create an empty raster.
    pub fn new(
        name: impl Into<String>,
        raster_type: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: RasterId::new(),
            name: name.into(),
            raster_type: raster_type.into(),
            width,
            height,
            bands: RwLock::new(IndexMap::new()),
            metadata: Mutex::new(MetadataElement::new(METADATA_ROOT)),
            file_location: RwLock::new(None),
            producer: RwLock::new(None),
            disposed: AtomicBool::new(false),
        })
    }

    /// Raster identity.
    pub fn id(&self) -> RasterId {
        self.id
    }

    /// Raster name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raster type string.
    pub fn raster_type(&self) -> &str {
        &self.raster_type
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Rectangle covering the whole raster.
    pub fn bounds(&self) -> Rectangle {
        Rectangle::of_size(self.width, self.height)
    }

    /// Add a band. Fails if a band with that name exists.
    pub fn add_band(&self, name: impl Into<String>, pixel_type: PixelType) -> OperatorResult<Arc<Band>> {
        let name = name.into();
        let mut bands = self.bands.write();
        if bands.contains_key(&name) {
            return Err(OperatorError::DuplicateBand {
                raster: self.name.clone(),
                band: name,
            });
        }
        let band = Arc::new(Band::new(self, name.clone(), pixel_type));
        bands.insert(name, Arc::clone(&band));
        Ok(band)
    }

    /// Look up a band by name.
    pub fn band(&self, name: &str) -> OperatorResult<Arc<Band>> {
        self.get_band(name).ok_or_else(|| OperatorError::BandNotFound {
            raster: self.name.clone(),
            band: name.to_string(),
        })
    }

    /// Look up a band by name, if present.
    pub fn get_band(&self, name: &str) -> Option<Arc<Band>> {
        self.bands.read().get(name).cloned()
    }

    /// Whether a band with that name exists.
    pub fn contains_band(&self, name: &str) -> bool {
        self.bands.read().contains_key(name)
    }

    /// Remove a band by name.
    pub fn remove_band(&self, name: &str) -> Option<Arc<Band>> {
        self.bands.write().shift_remove(name)
    }

    /// All bands in insertion order.
    pub fn bands(&self) -> Vec<Arc<Band>> {
        self.bands.read().values().cloned().collect()
    }

    /// Band names in insertion order.
    pub fn band_names(&self) -> Vec<String> {
        self.bands.read().keys().cloned().collect()
    }

    /// Number of bands.
    pub fn band_count(&self) -> usize {
        self.bands.read().len()
    }

    /// Locked access to the metadata tree.
    pub fn metadata(&self) -> MutexGuard<'_, MetadataElement> {
        self.metadata.lock()
    }

    /// Storage location, for rasters read from a file.
    pub fn file_location(&self) -> Option<PathBuf> {
        self.file_location.read().clone()
    }

    /// Set the storage location.
    pub fn set_file_location(&self, path: impl AsRef<Path>) {
        *self.file_location.write() = Some(path.as_ref().to_path_buf());
    }

    /// The operator context that built this raster as its target.
    ///
    /// The raster keeps its producer alive; the producer only refers back to
    /// the raster weakly.
    pub fn producer(&self) -> Option<Arc<OperatorContext>> {
        self.producer.read().clone()
    }

    pub(crate) fn set_producer(&self, context: &Arc<OperatorContext>) {
        *self.producer.write() = Some(Arc::clone(context));
    }

    /// Whether [`dispose`](Self::dispose) was called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Release this raster's resources.
    ///
    /// Disposes every operator context computing one of its bands, which
    /// releases their tile caches, then drops in-memory sample buffers.
    /// Sources of those operators are left untouched.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut contexts: Vec<Arc<OperatorContext>> = Vec::new();
        for band in self.bands() {
            if let Some(ctx) = band.producer() {
                if !contexts.iter().any(|c| Arc::ptr_eq(c, &ctx)) {
                    contexts.push(ctx);
                }
            }
        }
        for ctx in contexts {
            ctx.dispose();
        }
        for band in self.bands() {
            band.detach();
        }
        *self.producer.write() = None;
        log::debug!("Disposed raster '{}' ({})", self.name, self.id);
    }
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &self.raster_type)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bands", &self.band_names())
            .finish()
    }
}
