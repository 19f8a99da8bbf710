//! Runtime state of one operator instance.
//!
//! An [`OperatorContext`] wraps an [`Operator`] together with its bound
//! parameters and supplied sources. It initializes the operator lazily, on
//! the first request for the target raster or a target property, and from
//! then on answers tile requests for the bands it computes:
//!
//! ```text
//! Band::read_tile ──▶ OperatorContext::compute_tile
//!                        │ cache / pass memo hit ──▶ stored tile
//!                        │ miss
//!                        ▼
//!                     Operator::compute_tile(_stack)
//!                        │ ComputeContext::source_tile
//!                        ▼
//!                     upstream Band::read_tile_in ──▶ ...
//! ```
//!
//! Ownership runs downstream only: a target raster and its computed bands
//! hold their context, the context holds its sources, and the context refers
//! to its target weakly. Dropping the last handle to a target releases the
//! context, its tile cache and every upstream raster nothing else uses.

use crate::config::EngineConfig;
use crate::core::context::{ComputeContext, InitContext, ParameterSet};
use crate::core::error::{ContextId, OperatorError, OperatorResult};
use crate::core::node::{ComputeMode, Operator, OperatorDescriptor, TileStack};
use crate::core::raster::{Band, Raster, SampleSourceKind};
use crate::core::rect::Rectangle;
use crate::core::tile::Tile;
use crate::core::types::Value;
use crate::execution::binding::{bind_sources, BoundSources, Sources};
use crate::execution::cache::{CacheStats, TileCache, TileKey};
use crate::execution::pass::ReadPass;
use crate::execution::provenance;
use indexmap::IndexMap;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum InitState {
    Uninitialized,
    Initializing(ThreadId),
    Initialized,
    Failed(OperatorError),
}

/// What initialization produced.
///
/// The target stays `pending` until it is first handed out. Only then are
/// its computed bands attached to the context, so until that point the
/// target does not refer back to the context.
struct Initialized {
    target: Weak<Raster>,
    pending: Option<Arc<Raster>>,
    sources: BoundSources,
    pass_through: bool,
    properties: IndexMap<String, Value>,
    computed_bands: Vec<Weak<Band>>,
}

/// Tile keys being computed, with the thread computing each.
#[derive(Default)]
struct InFlightKeys {
    keys: Mutex<HashMap<TileKey, ThreadId>>,
    done: Condvar,
}

impl InFlightKeys {
    /// Claim `key` for the current thread.
    ///
    /// Blocks while another thread holds the key. Returns `None` if the
    /// current thread already holds it.
    fn claim(&self, key: TileKey) -> Option<InFlight<'_>> {
        let current = thread::current().id();
        let mut keys = self.keys.lock();
        loop {
            match keys.get(&key) {
                None => {
                    keys.insert(key, current);
                    return Some(InFlight { owner: self, key });
                }
                Some(owner) if *owner == current => return None,
                Some(_) => self.done.wait(&mut keys),
            }
        }
    }
}

/// A claimed tile key; released on drop, also when unwinding.
struct InFlight<'a> {
    owner: &'a InFlightKeys,
    key: TileKey,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.owner.keys.lock().remove(&self.key);
        self.owner.done.notify_all();
    }
}

/// Moves an initialization that did not return to `Failed`.
struct InitGuard<'a> {
    context: &'a OperatorContext,
    armed: bool,
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.context.state.lock();
        *state = InitState::Failed(OperatorError::config(
            self.context.operator_name(),
            "initialization panicked",
        ));
        self.context.init_done.notify_all();
    }
}

/// Runtime state of one operator instance.
pub struct OperatorContext {
    id: ContextId,
    descriptor: Arc<OperatorDescriptor>,
    operator: RwLock<Box<dyn Operator>>,
    parameters: RwLock<ParameterSet>,
    supplied: Mutex<Option<Sources>>,
    state: Mutex<InitState>,
    init_done: Condvar,
    inner: RwLock<Option<Initialized>>,
    cache: TileCache,
    cache_enabled: bool,
    in_flight: InFlightKeys,
    disposed: AtomicBool,
}

impl OperatorContext {
    /// Create an uninitialized context.
    ///
    /// Whether tiles are cached is decided here, from `config`, and never
    /// changes afterwards.
    pub fn new(
        descriptor: Arc<OperatorDescriptor>,
        operator: Box<dyn Operator>,
        parameters: ParameterSet,
        sources: Sources,
        config: &EngineConfig,
    ) -> Arc<Self> {
        let context = Arc::new(Self {
            id: ContextId::new(),
            descriptor,
            operator: RwLock::new(operator),
            parameters: RwLock::new(parameters),
            supplied: Mutex::new(Some(sources)),
            state: Mutex::new(InitState::Uninitialized),
            init_done: Condvar::new(),
            inner: RwLock::new(None),
            cache: TileCache::with_memory_limit(
                config.tile_cache_capacity,
                config.tile_cache_memory_mb,
            ),
            cache_enabled: !config.disable_tile_cache,
            in_flight: InFlightKeys::default(),
            disposed: AtomicBool::new(false),
        });
        log::debug!(
            "Created context {} for '{}' (tile cache {})",
            context.id,
            context.operator_name(),
            if context.cache_enabled { "on" } else { "off" }
        );
        context
    }

    /// Context identity, also used as the provenance node id.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Display name of the operator.
    pub fn operator_name(&self) -> &str {
        self.descriptor.display_name()
    }

    /// Descriptor of the operator type.
    pub fn descriptor(&self) -> &Arc<OperatorDescriptor> {
        &self.descriptor
    }

    /// Snapshot of the bound parameters.
    ///
    /// Changes made by the operator during initialization are visible once
    /// it has run.
    pub fn parameters(&self) -> ParameterSet {
        self.parameters.read().clone()
    }

    /// Value of one bound parameter.
    pub fn parameter(&self, name: &str) -> Option<Value> {
        self.parameters.read().get(name).cloned()
    }

    /// Whether initialization completed successfully.
    pub fn is_initialized(&self) -> bool {
        matches!(*self.state.lock(), InitState::Initialized)
    }

    /// Whether the target is one of the sources.
    ///
    /// `false` until initialized.
    pub fn is_pass_through(&self) -> bool {
        self.inner
            .read()
            .as_ref()
            .map(|i| i.pass_through)
            .unwrap_or(false)
    }

    /// Whether tiles computed by this context are cached.
    pub fn is_cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// Tile cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of tiles currently cached.
    pub fn cached_tiles(&self) -> usize {
        self.cache.len()
    }

    /// Whether [`dispose`](Self::dispose) was called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// The target raster, initializing the operator on first call.
    ///
    /// After the target has been handed out the context no longer keeps it
    /// alive. Once every handle to it has been dropped this fails with
    /// [`OperatorError::Disposed`].
    pub fn target_raster(self: &Arc<Self>) -> OperatorResult<Arc<Raster>> {
        self.ensure_initialized()?;
        let mut inner = self.inner.write();
        let inner = inner.as_mut().ok_or_else(|| self.disposed_error())?;
        if let Some(target) = inner.pending.take() {
            for band in inner.computed_bands.iter().filter_map(Weak::upgrade) {
                band.attach_operator(Arc::clone(self));
            }
            if !inner.pass_through {
                target.set_producer(self);
            }
            return Ok(target);
        }
        inner.target.upgrade().ok_or_else(|| self.disposed_error())
    }

    /// A target property by name or alias, initializing the operator on first call.
    ///
    /// Returns `Ok(None)` for a declared property the operator did not set.
    pub fn target_property(self: &Arc<Self>, name: &str) -> OperatorResult<Option<Value>> {
        let declared = self
            .descriptor
            .target_properties
            .iter()
            .find(|p| p.name == name || p.alias.as_deref() == Some(name))
            .ok_or_else(|| {
                OperatorError::config(
                    self.operator_name(),
                    format!("unknown target property '{}'", name),
                )
            })?;
        self.ensure_initialized()?;
        Ok(self
            .inner
            .read()
            .as_ref()
            .and_then(|i| i.properties.get(&declared.name).cloned()))
    }

    /// Run initialization if it has not run yet.
    ///
    /// A request from the thread that is currently initializing this context
    /// fails with [`OperatorError::SelfReference`]; other threads wait for
    /// the outcome. A failed initialization is reported again on every later
    /// request.
    pub fn ensure_initialized(self: &Arc<Self>) -> OperatorResult<()> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        let current = thread::current().id();
        {
            let mut state = self.state.lock();
            loop {
                match *state {
                    InitState::Initialized => return Ok(()),
                    InitState::Failed(ref err) => return Err(err.clone()),
                    InitState::Initializing(owner) if owner == current => {
                        return Err(OperatorError::SelfReference {
                            operator: self.operator_name().to_string(),
                        });
                    }
                    InitState::Initializing(_) => {}
                    InitState::Uninitialized => break,
                }
                self.init_done.wait(&mut state);
            }
            *state = InitState::Initializing(current);
        }

        let mut guard = InitGuard {
            context: self,
            armed: true,
        };
        let result = self.initialize();
        guard.armed = false;

        let mut state = self.state.lock();
        *state = match &result {
            Ok(()) => InitState::Initialized,
            Err(err) => {
                log::debug!("Initialization of '{}' failed: {}", self.operator_name(), err);
                InitState::Failed(err.clone())
            }
        };
        self.init_done.notify_all();
        result
    }

    fn initialize(&self) -> OperatorResult<()> {
        let start = Instant::now();
        let name = self.operator_name().to_string();
        self.check_target_properties()?;

        let supplied = self.supplied.lock().take().unwrap_or_default();
        let sources = bind_sources(&self.descriptor, &supplied)?;
        drop(supplied);
        let mut parameters = self.parameters.read().clone();

        let (target, properties) = {
            let mut ctx = InitContext::new(
                &name,
                &mut parameters,
                &sources,
                &self.descriptor.target_properties,
            );
            self.operator.write().initialize(&mut ctx)?;
            ctx.into_parts()
        };
        let target = target
            .ok_or_else(|| OperatorError::config(&name, "initialization did not set a target raster"))?;
        let pass_through = sources.contains(&target);

        let computed_bands: Vec<Arc<Band>> = target
            .bands()
            .into_iter()
            .filter(|band| band.source_kind() == SampleSourceKind::Unset)
            .collect();

        provenance::record(&target, self, &sources, &parameters);
        *self.parameters.write() = parameters;
        *self.inner.write() = Some(Initialized {
            target: Arc::downgrade(&target),
            pending: Some(Arc::clone(&target)),
            // A pass-through target is one of the sources; holding it would
            // let its computed bands keep themselves alive.
            sources: if pass_through {
                BoundSources::default()
            } else {
                sources
            },
            pass_through,
            properties,
            computed_bands: computed_bands.iter().map(Arc::downgrade).collect(),
        });

        log::debug!(
            "Initialized '{}' ({}): target '{}' {}x{}, {} bands{} in {:?}",
            name,
            self.id,
            target.name(),
            target.width(),
            target.height(),
            target.band_count(),
            if pass_through { ", pass-through" } else { "" },
            start.elapsed()
        );
        Ok(())
    }

    fn check_target_properties(&self) -> OperatorResult<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for property in &self.descriptor.target_properties {
            let names = std::iter::once(property.name.as_str()).chain(property.alias.as_deref());
            let mut own: HashSet<&str> = HashSet::new();
            for external in names {
                if own.insert(external) && !seen.insert(external) {
                    return Err(OperatorError::DuplicateTargetProperty {
                        operator: self.operator_name().to_string(),
                        property: external.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Bound sources and parameters, once initialized.
    pub(crate) fn lineage(&self) -> Option<(BoundSources, ParameterSet)> {
        let inner = self.inner.read();
        inner
            .as_ref()
            .map(|i| (i.sources.clone(), self.parameters.read().clone()))
    }

    /// Compute (or fetch) the tile of `band` covering `rect`.
    ///
    /// `rect` is already clamped to the band bounds.
    pub(crate) fn compute_tile(
        &self,
        band: &Band,
        rect: Rectangle,
        pass: &ReadPass<'_>,
    ) -> OperatorResult<Arc<Tile>> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        let key = TileKey::new(band.id(), rect);
        // Claimed before the lookup, so a thread that waited for another to
        // compute this key finds its tile.
        let _guard = self
            .in_flight
            .claim(key)
            .ok_or_else(|| OperatorError::CyclicRequest {
                operator: self.operator_name().to_string(),
                band: band.name().to_string(),
                rect,
            })?;
        if let Some(tile) = self.lookup(&key, pass) {
            log::trace!("Tile hit: '{}' {} on {}", band.name(), rect, self.id);
            return Ok(tile);
        }
        pass.monitor().check_cancelled()?;

        let start = Instant::now();
        let ctx = ComputeContext::new(self.operator_name(), pass);
        let operator = self.operator.read_recursive();
        let tile = match operator.compute_mode() {
            ComputeMode::Tile => {
                let mut tile = Tile::new(rect, band.pixel_type());
                operator
                    .compute_tile(&ctx, band, &mut tile)
                    .map_err(|e| self.attribute(e, band, rect))?;
                pass.monitor().check_cancelled()?;
                let tile = Arc::new(tile);
                self.store(key, Arc::clone(&tile), start.elapsed(), pass);
                tile
            }
            ComputeMode::TileStack => {
                let computed = self.computed_bands();
                let mut stack: TileStack = computed
                    .iter()
                    .map(|b| (b.name().to_string(), Tile::new(rect, b.pixel_type())))
                    .collect();
                operator
                    .compute_tile_stack(&ctx, rect, &mut stack)
                    .map_err(|e| self.attribute(e, band, rect))?;
                pass.monitor().check_cancelled()?;
                let elapsed = start.elapsed();
                let mut requested = None;
                for b in &computed {
                    if let Some(tile) = stack.swap_remove(b.name()) {
                        let tile = Arc::new(tile);
                        if b.id() == band.id() {
                            requested = Some(Arc::clone(&tile));
                        }
                        self.store(TileKey::new(b.id(), rect), tile, elapsed, pass);
                    }
                }
                requested.ok_or_else(|| {
                    ctx.error(band, rect, "tile stack did not contain the requested band")
                })?
            }
        };

        let elapsed = start.elapsed();
        pass.monitor()
            .tile_computed(self.operator_name(), band.name(), rect, elapsed.as_millis() as u64);
        log::trace!(
            "Computed '{}' {} on {} in {:?}",
            band.name(),
            rect,
            self.id,
            elapsed
        );
        Ok(tile)
    }

    fn lookup(&self, key: &TileKey, pass: &ReadPass<'_>) -> Option<Arc<Tile>> {
        if self.cache_enabled {
            self.cache.get(key)
        } else {
            pass.recall(key)
        }
    }

    fn store(&self, key: TileKey, tile: Arc<Tile>, elapsed: Duration, pass: &ReadPass<'_>) {
        if self.cache_enabled {
            self.cache.put(key, tile, elapsed);
        } else {
            pass.remember(key, tile);
        }
    }

    fn computed_bands(&self) -> Vec<Arc<Band>> {
        self.inner
            .read()
            .as_ref()
            .map(|i| i.computed_bands.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }

    /// Attribute an error raised without operator context to this operator.
    fn attribute(&self, err: OperatorError, band: &Band, rect: Rectangle) -> OperatorError {
        if err.is_cancelled() || err.operator().is_some() {
            err
        } else {
            OperatorError::computation(self.operator_name(), band.name(), rect, err.to_string())
        }
    }

    fn disposed_error(&self) -> OperatorError {
        OperatorError::Disposed {
            operator: self.operator_name().to_string(),
        }
    }

    /// Release the tile cache and operator resources.
    ///
    /// Bands computed by this context lose their sample source. For a
    /// pass-through context only the bands it added are affected; the source
    /// raster it aliases keeps its own samples.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cache.clear();
        self.operator.write().dispose();
        if let Some(inner) = self.inner.write().take() {
            for band in inner.computed_bands.iter().filter_map(Weak::upgrade) {
                band.detach();
            }
        }
        log::debug!("Disposed context {} ('{}')", self.id, self.operator_name());
    }
}

impl std::fmt::Debug for OperatorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorContext")
            .field("id", &self.id)
            .field("operator", &self.operator_name())
            .field("state", &*self.state.lock())
            .field("cache_enabled", &self.cache_enabled)
            .finish()
    }
}
