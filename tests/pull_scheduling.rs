//! End-to-end tests of lazy initialization, pull scheduling and tile caching.

use rastergraph::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Barrier, OnceLock, Weak};
use std::time::Duration;

// ============================================================================
// Test operators
// ============================================================================

#[derive(Clone, Default)]
struct Counters {
    inits: Arc<AtomicUsize>,
    computes: Arc<AtomicUsize>,
}

impl Counters {
    fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    fn computes(&self) -> usize {
        self.computes.load(Ordering::SeqCst)
    }
}

/// Doubles band "b1" of its source and counts every call.
struct Doubling {
    counters: Counters,
    source: Option<Arc<Band>>,
    delay: Duration,
}

impl Operator for Doubling {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> OperatorResult<()> {
        self.counters.inits.fetch_add(1, Ordering::SeqCst);
        let source = ctx.source("source")?;
        let band = source.band("b1")?;
        let target = Raster::new("doubled", source.raster_type(), source.width(), source.height());
        target.add_band("b1", PixelType::Float64)?;
        self.source = Some(band);
        ctx.set_target(target);
        Ok(())
    }

    fn compute_tile(&self, ctx: &ComputeContext<'_>, band: &Band, tile: &mut Tile) -> OperatorResult<()> {
        self.counters.computes.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| ctx.error(band, tile.rectangle(), "not initialized"))?;
        let src = ctx.source_tile(source, tile.rectangle())?;
        for i in 0..src.data().len() {
            tile.set_f64(i, src.get_f64(i) * 2.0);
        }
        Ok(())
    }
}

fn doubling_descriptor(counters: &Counters) -> OperatorDescriptor {
    doubling_descriptor_named("DoublingOp", "Twice", counters, Duration::ZERO)
}

fn doubling_descriptor_named(
    name: &str,
    alias: &str,
    counters: &Counters,
    delay: Duration,
) -> OperatorDescriptor {
    let counters = counters.clone();
    OperatorDescriptor::builder_with(name, move || {
        Box::new(Doubling {
            counters: counters.clone(),
            source: None,
            delay,
        })
    })
    .alias(alias)
    .description("Doubles band b1")
    .source(SourcePortDescriptor::single("source").with_alias("sourceProduct"))
    .build()
}

/// Grid raster whose band "b1" holds `y * width + x`.
fn grid(name: &str, width: u32, height: u32) -> Arc<Raster> {
    let raster = Raster::new(name, "TEST", width, height);
    raster
        .add_band("b1", PixelType::Float64)
        .unwrap()
        .fill_with(|x, y| (y * width + x) as f64)
        .unwrap();
    raster
}

fn engine_with(counters: &Counters, config: EngineConfig) -> Engine {
    let mut engine = Engine::with_builtins().with_config(config);
    engine.register_operator(doubling_descriptor(counters));
    engine
}

fn params(pairs: &[(&str, Value)]) -> ParameterMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// ============================================================================
// Scheduling
// ============================================================================

#[test]
fn test_tiles_are_memoized() {
    let counters = Counters::default();
    let engine = engine_with(&counters, EngineConfig::new());
    let context = engine
        .create_operator("Twice", ParameterMap::new(), Sources::from(grid("g", 8, 8)))
        .unwrap();
    let band = context.target_raster().unwrap().band("b1").unwrap();

    let rect = Rectangle::new(0, 0, 4, 4);
    let first = band.read_tile(rect).unwrap();
    let second = band.read_tile(rect).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(counters.computes(), 1);
    assert_eq!(context.cache_stats().hits, 1);

    band.read_tile(Rectangle::new(4, 4, 4, 4)).unwrap();
    assert_eq!(counters.computes(), 2);
    assert_eq!(context.cached_tiles(), 2);
    assert_eq!(first.sample_f64(1, 1), 18.0);
}

#[test]
fn test_initialization_is_lazy_and_runs_once() {
    let counters = Counters::default();
    let engine = engine_with(&counters, EngineConfig::new());
    let context = engine
        .create_operator("Twice", ParameterMap::new(), Sources::from(grid("g", 4, 4)))
        .unwrap();
    assert_eq!(counters.inits(), 0);
    assert!(!context.is_initialized());

    // Each thread holds its target until all of them have one.
    let barrier = Barrier::new(4);
    let (shared, barrier) = (&context, &barrier);
    let targets: Vec<Arc<Raster>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(move || {
                    let target = shared.target_raster().unwrap();
                    barrier.wait();
                    target
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(targets.iter().all(|t| Arc::ptr_eq(t, &targets[0])));
    assert_eq!(counters.inits(), 1);
    assert!(context.is_initialized());
    assert_eq!(counters.computes(), 0);
}

#[test]
fn test_pass_through_exposes_source() {
    let engine = Engine::with_builtins();
    let source = grid("g", 4, 4);
    let context = engine
        .create_operator("PassThrough", ParameterMap::new(), Sources::from(Arc::clone(&source)))
        .unwrap();
    let target = context.target_raster().unwrap();

    assert!(Arc::ptr_eq(&target, &source));
    assert!(context.is_pass_through());
    assert_eq!(
        target.band("b1").unwrap().read_samples_f64(Rectangle::new(1, 1, 2, 1)).unwrap(),
        vec![5.0, 6.0]
    );

    context.dispose();
    assert!(source.band("b1").unwrap().has_samples());
    assert!(source.producer().is_none());
}

#[test]
fn test_pass_through_added_band_is_computed() {
    let engine = Engine::with_builtins();
    let source = grid("g", 4, 4);
    let context = engine
        .create_operator(
            "PassThrough",
            params(&[("copy_band", Value::from("b1"))]),
            Sources::from(Arc::clone(&source)),
        )
        .unwrap();
    let target = context.target_raster().unwrap();
    let copy = target.band("b1_copy").unwrap();
    assert_eq!(copy.source_kind(), SampleSourceKind::Operator);
    assert_eq!(copy.read_samples_f64(Rectangle::new(3, 3, 1, 1)).unwrap(), vec![15.0]);

    context.dispose();
    assert_eq!(copy.source_kind(), SampleSourceKind::Unset);
    assert_eq!(source.band("b1").unwrap().source_kind(), SampleSourceKind::Memory);
}

#[test]
fn test_parameter_defaults() {
    let counters = Counters::default();
    let mut engine = engine_with(&counters, EngineConfig::new());
    let inner = counters.clone();
    engine.register_operator(
        OperatorDescriptor::builder_with("DefaultsOp", move || {
            Box::new(Doubling {
                counters: inner.clone(),
                source: None,
                delay: Duration::ZERO,
            })
        })
        .alias("Defaults")
        .source(SourcePortDescriptor::single("source"))
        .parameter(ParameterDescriptor::new("scale", ParamType::Float).with_default("1.5"))
        .parameter(
            ParameterDescriptor::new("levels", ParamType::array_of(ParamType::Integer))
                .with_default("1,2,3"),
        )
        .parameter(
            ParameterDescriptor::new("names", ParamType::array_of(ParamType::String))
                .with_default(""),
        )
        .parameter(ParameterDescriptor::new("label", ParamType::String))
        .build(),
    );

    let context = engine
        .create_operator(
            "Defaults",
            params(&[("scale", Value::Integer(3))]),
            Sources::from(grid("g", 2, 2)),
        )
        .unwrap();
    let parameters = context.parameters();
    assert_eq!(parameters.get_float("scale").unwrap(), 3.0);
    assert_eq!(parameters.get_integer_array("levels").unwrap(), vec![1, 2, 3]);
    assert!(parameters.get_string_array("names").unwrap().is_empty());
    assert!(!parameters.contains("label"));
}

#[test]
fn test_scaled_sum_of_constants() {
    let engine = Engine::with_builtins();
    let constant = |value: f64| {
        engine
            .create_product(
                "Constant",
                params(&[
                    ("value", Value::Float(value)),
                    ("width", Value::Integer(64)),
                    ("height", Value::Integer(32)),
                    ("pixel_type", Value::from("float64")),
                ]),
                Sources::new(),
            )
            .unwrap()
    };
    let sum = engine
        .create_product(
            "Add",
            ParameterMap::new(),
            Sources::positional([constant(5.2), constant(4.8)]),
        )
        .unwrap();
    let scaled = engine
        .create_product("Scale", params(&[("factor", Value::Float(2.5))]), Sources::from(sum))
        .unwrap();

    assert_eq!((scaled.width(), scaled.height()), (64, 32));
    let samples = scaled
        .band("band_1")
        .unwrap()
        .read_samples_f64(scaled.bounds())
        .unwrap();
    assert_eq!(samples.len(), 64 * 32);
    assert!(samples.iter().all(|v| (v - 25.0).abs() < 1e-9));
}

#[test]
fn test_missing_source_fails_before_compute() {
    let counters = Counters::default();
    let engine = engine_with(&counters, EngineConfig::new());
    let context = engine
        .create_operator("Twice", ParameterMap::new(), Sources::new())
        .unwrap();

    let err = context.target_raster().unwrap_err();
    assert!(matches!(err, OperatorError::InvalidSource { .. }));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(counters.inits(), 0);
    assert_eq!(counters.computes(), 0);

    // The failure is remembered.
    assert_eq!(context.target_raster().unwrap_err(), err);
}

#[test]
fn test_alias_resolution_and_removal() {
    let counters = Counters::default();
    let mut engine = engine_with(&counters, EngineConfig::new());

    let by_alias = engine.lookup_operator("Twice").unwrap();
    let by_class = engine.lookup_operator("DoublingOp").unwrap();
    assert!(Arc::ptr_eq(&by_alias, &by_class));

    assert!(engine.remove_operator("Twice").is_some());
    assert!(matches!(
        engine.lookup_operator("DoublingOp"),
        Err(OperatorError::NoSuchOperator { .. })
    ));
    assert!(engine
        .create_operator("Twice", ParameterMap::new(), Sources::new())
        .is_err());
}

#[test]
fn test_cache_toggle() {
    let counters = Counters::default();
    let mut engine = engine_with(&counters, EngineConfig::new().with_tile_cache_disabled(true));
    let context = engine
        .create_operator("Twice", ParameterMap::new(), Sources::from(grid("g", 8, 8)))
        .unwrap();
    let band = context.target_raster().unwrap().band("b1").unwrap();
    let rect = Rectangle::new(0, 0, 8, 8);

    band.read_tile(rect).unwrap();
    band.read_tile(rect).unwrap();
    assert!(!context.is_cache_enabled());
    assert_eq!(counters.computes(), 2);
    assert_eq!(context.cached_tiles(), 0);

    engine.set_tile_cache_disabled(false);
    let cached = engine
        .create_operator("Twice", ParameterMap::new(), Sources::from(grid("h", 8, 8)))
        .unwrap();
    let band = cached.target_raster().unwrap().band("b1").unwrap();
    band.read_tile(rect).unwrap();
    band.read_tile(rect).unwrap();
    assert!(cached.is_cache_enabled());
    assert_eq!(counters.computes(), 3);
    // The context created earlier keeps its setting.
    assert!(!context.is_cache_enabled());
}

#[test]
fn test_uncached_tiles_are_shared_within_one_read() {
    let counters = Counters::default();
    let engine = engine_with(&counters, EngineConfig::new().with_tile_cache_disabled(true));
    let doubled = engine
        .create_product("Twice", ParameterMap::new(), Sources::from(grid("g", 4, 4)))
        .unwrap();
    let scale = |factor: f64| {
        engine
            .create_product(
                "Scale",
                params(&[("factor", Value::Float(factor))]),
                Sources::from(Arc::clone(&doubled)),
            )
            .unwrap()
    };
    let sum = engine
        .create_product("Add", ParameterMap::new(), Sources::positional([scale(1.0), scale(2.0)]))
        .unwrap();

    let tile = sum.band("b1").unwrap().read_tile(Rectangle::new(0, 0, 4, 4)).unwrap();
    assert_eq!(tile.sample_f64(1, 0), 6.0);
    assert_eq!(counters.computes(), 1);
}

#[test]
fn test_shared_upstream_across_parallel_targets() {
    let counters = Counters::default();
    let mut engine = engine_with(&counters, EngineConfig::new());
    engine.register_operator(doubling_descriptor_named(
        "SlowDoublingOp",
        "SlowTwice",
        &counters,
        Duration::from_millis(20),
    ));
    let upstream = engine
        .create_product("SlowTwice", ParameterMap::new(), Sources::from(grid("g", 8, 8)))
        .unwrap();
    let scale = |factor: f64| {
        engine
            .create_product(
                "Scale",
                params(&[("factor", Value::Float(factor))]),
                Sources::from(Arc::clone(&upstream)),
            )
            .unwrap()
    };
    let targets = vec![scale(1.0), scale(3.0)];

    let monitor = ProgressMonitor::new();
    let results = materialize_all(&targets, 4, 4, &monitor);
    for result in &results {
        assert_eq!(result.as_ref().unwrap().tiles, 4);
    }
    // Both branches asked for the same four upstream tiles.
    assert_eq!(counters.computes(), 4);

    let rect = Rectangle::new(0, 0, 8, 8);
    let tripled = targets[1].band("b1").unwrap().read_samples_f64(rect).unwrap();
    assert_eq!(tripled[9], 54.0);
}

/// Pass-through that adds a copy of "b1" and counts computed tiles.
struct Relay {
    computes: Arc<AtomicUsize>,
    source: Option<Arc<Band>>,
}

impl Operator for Relay {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> OperatorResult<()> {
        let source = ctx.source("source")?;
        let band = source.band("b1")?;
        source.add_band("relayed", band.pixel_type())?;
        self.source = Some(band);
        ctx.set_target(source);
        Ok(())
    }

    fn compute_tile(&self, ctx: &ComputeContext<'_>, band: &Band, tile: &mut Tile) -> OperatorResult<()> {
        self.computes.fetch_add(1, Ordering::SeqCst);
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| ctx.error(band, tile.rectangle(), "not initialized"))?;
        let src = ctx.source_tile(source, tile.rectangle())?;
        tile.copy_from(&src);
        Ok(())
    }
}

#[test]
fn test_pass_through_existing_band_is_not_computed() {
    let computes = Arc::new(AtomicUsize::new(0));
    let mut engine = Engine::with_builtins();
    let factory_computes = Arc::clone(&computes);
    engine.register_operator(
        OperatorDescriptor::builder_with("RelayOp", move || {
            Box::new(Relay {
                computes: Arc::clone(&factory_computes),
                source: None,
            })
        })
        .source(SourcePortDescriptor::single("source"))
        .build(),
    );

    let source = grid("g", 4, 4);
    let context = engine
        .create_operator("RelayOp", ParameterMap::new(), Sources::from(Arc::clone(&source)))
        .unwrap();
    let target = context.target_raster().unwrap();
    assert!(context.is_pass_through());

    let rect = Rectangle::new(0, 0, 4, 4);
    let existing = target.band("b1").unwrap().read_samples_f64(rect).unwrap();
    assert_eq!(existing[5], 5.0);
    assert_eq!(computes.load(Ordering::SeqCst), 0);
    assert_eq!(context.cached_tiles(), 0);

    let relayed = target.band("relayed").unwrap().read_samples_f64(rect).unwrap();
    assert_eq!(relayed, existing);
    assert_eq!(computes.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Ownership
// ============================================================================

#[test]
fn test_dropping_product_releases_its_graph() {
    let counters = Counters::default();
    let engine = engine_with(&counters, EngineConfig::new());
    let upstream = engine
        .create_product("Twice", ParameterMap::new(), Sources::from(grid("g", 4, 4)))
        .unwrap();
    let scaled = engine
        .create_product(
            "Scale",
            params(&[("factor", Value::Float(2.0))]),
            Sources::from(Arc::clone(&upstream)),
        )
        .unwrap();
    let weak_upstream = Arc::downgrade(&upstream);
    let weak_upstream_context = Arc::downgrade(&upstream.producer().unwrap());
    let weak_scaled = Arc::downgrade(&scaled);
    let weak_scaled_context = Arc::downgrade(&scaled.producer().unwrap());
    drop(upstream);

    // Still reachable through the downstream operator.
    let samples = scaled.band("b1").unwrap().read_samples_f64(scaled.bounds()).unwrap();
    assert_eq!(samples[5], 20.0);
    assert!(weak_upstream.upgrade().is_some());

    drop(scaled);
    assert!(weak_scaled.upgrade().is_none());
    assert!(weak_scaled_context.upgrade().is_none());
    assert!(weak_upstream.upgrade().is_none());
    assert!(weak_upstream_context.upgrade().is_none());
}

#[test]
fn test_pass_through_context_released_with_source() {
    let engine = Engine::with_builtins();
    let source = grid("g", 4, 4);
    let context = engine
        .create_operator(
            "PassThrough",
            params(&[("copy_band", Value::from("b1"))]),
            Sources::from(Arc::clone(&source)),
        )
        .unwrap();
    let target = context.target_raster().unwrap();
    target.band("b1_copy").unwrap().read_tile(Rectangle::new(0, 0, 4, 4)).unwrap();

    let weak_context = Arc::downgrade(&context);
    let weak_source = Arc::downgrade(&source);
    drop(context);
    assert!(weak_context.upgrade().is_some(), "the added band keeps its context");

    drop(target);
    drop(source);
    assert!(weak_source.upgrade().is_none());
    assert!(weak_context.upgrade().is_none());
}

// ============================================================================
// Failures
// ============================================================================

/// Fails for tiles starting at `x >= 4`, cancels for tiles starting at `y >= 4`.
#[derive(Default)]
struct Faulty;

impl Operator for Faulty {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> OperatorResult<()> {
        let target = Raster::new("faulty", "TEST", 8, 8);
        target.add_band("b1", PixelType::Int16)?;
        ctx.set_target(target);
        Ok(())
    }

    fn compute_tile(&self, ctx: &ComputeContext<'_>, _band: &Band, tile: &mut Tile) -> OperatorResult<()> {
        let rect = tile.rectangle();
        if rect.x >= 4 {
            return Err(OperatorError::Other("sensor gap".to_string()));
        }
        if rect.y >= 4 {
            ctx.monitor().cancel();
        }
        tile.fill_f64(7.0);
        Ok(())
    }
}

fn faulty_engine() -> Engine {
    let mut engine = Engine::with_builtins();
    engine.register_operator(OperatorDescriptor::builder::<Faulty>().build());
    engine
}

#[test]
fn test_computation_error_keeps_other_tiles() {
    let engine = faulty_engine();
    let context = engine
        .create_operator("Faulty", ParameterMap::new(), Sources::new())
        .unwrap();
    let band = context.target_raster().unwrap().band("b1").unwrap();

    band.read_tile(Rectangle::new(0, 0, 4, 4)).unwrap();
    let err = band.read_tile(Rectangle::new(4, 0, 4, 4)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Computation);
    assert_eq!(err.operator(), Some("Faulty"));
    assert_eq!(err.band(), Some("b1"));
    assert_eq!(err.rectangle(), Some(Rectangle::new(4, 0, 4, 4)));
    assert_eq!(context.cached_tiles(), 1);
    assert!(band.read_tile(Rectangle::new(0, 0, 4, 4)).is_ok());
}

#[test]
fn test_cancelled_tile_is_not_cached() {
    let engine = faulty_engine();
    let context = engine
        .create_operator("Faulty", ParameterMap::new(), Sources::new())
        .unwrap();
    let band = context.target_raster().unwrap().band("b1").unwrap();

    let monitor = ProgressMonitor::new();
    let err = band.read_tile_with(Rectangle::new(0, 4, 4, 4), &monitor).unwrap_err();
    assert!(err.is_cancelled());
    assert!(err.is_recoverable());
    assert_eq!(context.cached_tiles(), 0);

    let monitor = ProgressMonitor::new();
    monitor.cancel();
    let err = band.read_tile_with(Rectangle::new(0, 0, 4, 4), &monitor).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancellation);
    assert_eq!(context.cached_tiles(), 0);
}

/// Requests its own target while initializing.
struct SelfReferencing {
    context: Arc<OnceLock<Weak<OperatorContext>>>,
    inits: Arc<AtomicUsize>,
}

impl Operator for SelfReferencing {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> OperatorResult<()> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        let context = self
            .context
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| ctx.error("context not wired"))?;
        let target = context.target_raster()?;
        ctx.set_target(target);
        Ok(())
    }
}

#[test]
fn test_self_reference_fails_fast() {
    let slot: Arc<OnceLock<Weak<OperatorContext>>> = Arc::new(OnceLock::new());
    let inits = Arc::new(AtomicUsize::new(0));
    let mut engine = Engine::with_builtins();
    let (factory_slot, factory_inits) = (Arc::clone(&slot), Arc::clone(&inits));
    engine.register_operator(
        OperatorDescriptor::builder_with("SelfReferencingOp", move || {
            Box::new(SelfReferencing {
                context: Arc::clone(&factory_slot),
                inits: Arc::clone(&factory_inits),
            })
        })
        .build(),
    );

    let context = engine
        .create_operator("SelfReferencingOp", ParameterMap::new(), Sources::new())
        .unwrap();
    slot.set(Arc::downgrade(&context)).unwrap();

    let err = context.target_raster().unwrap_err();
    assert!(matches!(err, OperatorError::SelfReference { .. }));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(context.target_raster().is_err());
    assert_eq!(inits.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Lineage and multi-band computation
// ============================================================================

#[test]
fn test_processing_graph_records_lineage() {
    let engine = Engine::with_builtins();
    let constant = engine
        .create_product(
            "Constant",
            params(&[("width", Value::Integer(8)), ("height", Value::Integer(8))]),
            Sources::new(),
        )
        .unwrap();
    let on_disk = Raster::new("scene", "TEST", 8, 8);
    on_disk.add_band("band_1", PixelType::Float32).unwrap().set_samples_f64(&[1.0; 64]).unwrap();
    on_disk.set_file_location("/data/scene.dim");
    let in_memory = Raster::new("scratch", "TEST", 8, 8);
    in_memory.add_band("band_1", PixelType::Float32).unwrap().set_samples_f64(&[2.0; 64]).unwrap();

    let mut sources = vec![constant.clone(), on_disk, in_memory];
    sources.extend((0..8).map(|i| {
        let extra = Raster::new(format!("extra{}", i), "TEST", 8, 8);
        extra
            .add_band("band_1", PixelType::Float32)
            .unwrap()
            .set_samples_f64(&[0.0; 64])
            .unwrap();
        extra
    }));
    let context = engine
        .create_operator("Add", ParameterMap::new(), Sources::positional(sources))
        .unwrap();
    let target = context.target_raster().unwrap();

    let graph = processing_graph(&target).unwrap();
    assert_eq!(graph.name(), PROCESSING_GRAPH);
    assert_eq!(graph.element_count(), 2);

    let node = graph.element("node.0").unwrap();
    assert_eq!(node.attribute_string("operator").as_deref(), Some("Add"));
    assert_eq!(node.attribute_string("id"), Some(context.id().to_string()));
    assert!(node.attribute("processingTime").is_some());
    assert_eq!(node.attribute_string("authors").as_deref(), Some("Rastergraph"));

    let sources = node.element("sources").unwrap();
    let names = sources.attribute_names();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
    assert_eq!(names[0], "sourceProduct.1");
    assert_eq!(names[1], "sourceProduct.10");

    let upstream = graph.element("node.1").unwrap();
    assert_eq!(upstream.attribute_string("operator").as_deref(), Some("Constant"));
    assert_eq!(
        sources.attribute_string("sourceProduct.1"),
        upstream.attribute_string("id")
    );
    assert_eq!(
        sources.attribute_string("sourceProduct.2").as_deref(),
        Some("file:/data/scene.dim")
    );
    assert_eq!(
        sources.attribute_string("sourceProduct.3").as_deref(),
        Some("product:scratch")
    );

    let parameters = node.element("parameters").unwrap();
    assert_eq!(parameters.attribute_string("raster_name").as_deref(), Some("sum"));
}

#[test]
fn test_tile_stack_fills_every_band_at_once() {
    let engine = Engine::with_builtins();
    let source = Raster::new("scene", "TEST", 4, 4);
    source.add_band("nir", PixelType::Float32).unwrap().set_samples_f64(&[4.0; 16]).unwrap();
    source.add_band("red", PixelType::Float32).unwrap().set_samples_f64(&[2.0; 16]).unwrap();

    let context = engine
        .create_operator(
            "NDI",
            params(&[("a_band", Value::from("nir")), ("b_band", Value::from("red"))]),
            Sources::from(source),
        )
        .unwrap();
    let target = context.target_raster().unwrap();
    let rect = Rectangle::new(0, 0, 4, 4);

    let ndi = target.band("ndi").unwrap().read_tile(rect).unwrap();
    assert_eq!(context.cached_tiles(), 2);
    assert!((ndi.sample_f64(0, 0) - 1.0 / 3.0).abs() < 1e-6);

    let flags = target.band("ndi_flags").unwrap().read_tile(rect).unwrap();
    assert_eq!(flags.sample_f64(0, 0), 0.0);
    assert_eq!(context.cache_stats().hits, 1);
    assert_eq!(context.cache_stats().misses, 1);
}

#[test]
fn test_disposed_target_stops_serving_tiles() {
    let engine = Engine::with_builtins();
    let context = engine
        .create_operator(
            "Constant",
            params(&[("width", Value::Integer(4)), ("height", Value::Integer(4))]),
            Sources::new(),
        )
        .unwrap();
    let target = context.target_raster().unwrap();
    let band = target.band("band_1").unwrap();
    band.read_tile(Rectangle::new(0, 0, 4, 4)).unwrap();

    target.dispose();
    assert!(context.is_disposed());
    assert_eq!(context.cached_tiles(), 0);
    assert!(matches!(
        band.read_tile(Rectangle::new(0, 0, 4, 4)),
        Err(OperatorError::NoSamples { .. })
    ));
    assert!(matches!(context.target_raster(), Err(OperatorError::Disposed { .. })));
}
