//! Rastergraph CLI - Lazy Tile-based Raster Operators
//!
//! This is a demonstration CLI for the Rastergraph library.

use anyhow::{bail, Context, Result};
use rastergraph::prelude::*;

fn main() {
    env_logger::init();

    println!("🛰️  Rastergraph - Lazy Tile-based Raster Operators v{}", rastergraph::VERSION);
    println!();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        return;
    }

    let result = match args[1].as_str() {
        "list" => {
            list_operators();
            Ok(())
        }
        "info" => {
            if args.len() < 3 {
                eprintln!("Error: Please specify an operator name");
                return;
            }
            operator_info(&args[2])
        }
        "demo" => run_demo(&args[2..]),
        "help" | "--help" | "-h" => {
            print_usage(&args[0]);
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_usage(&args[0]);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  list                List all registered operators");
    println!("  info <operator>     Show detailed info about an operator");
    println!("  demo [options]      Build and evaluate a small operator graph");
    println!("  help                Show this help message");
    println!();
    println!("Demo options:");
    println!("  --no-cache          Disable tile caching");
    println!("  --config <path>     Load engine configuration from a TOML file");
    println!();
    println!("Environment:");
    println!("  RUST_LOG                          Log filter (e.g., rastergraph=debug)");
    println!("  RASTERGRAPH_DISABLE_TILE_CACHE    Disable tile caching (true/false)");
    println!("  RASTERGRAPH_TILE_SIZE             Default tile size (e.g., 256 or 512x256)");
}

fn list_operators() {
    let registry = OperatorRegistry::with_builtins();
    let grouped = registry.grouped_by_category();

    println!("Available operators ({} total):", registry.len());
    println!();

    for (category, descriptors) in grouped {
        println!("  📁 {}", category.display_name());
        for descriptor in descriptors {
            println!("      • {} - {}", descriptor.display_name(), descriptor.description);
        }
        println!();
    }
}

fn operator_info(name: &str) -> Result<()> {
    let registry = OperatorRegistry::with_builtins();
    let Some(descriptor) = registry.lookup(name) else {
        eprintln!("Operator not found: {}", name);
        eprintln!("Use 'list' to see available operators.");
        return Ok(());
    };

    println!("Operator: {}", descriptor.display_name());
    println!("Class: {}", descriptor.name);
    if descriptor.aliases.len() > 1 {
        println!("Aliases: {}", descriptor.aliases.join(", "));
    }
    println!("Category: {}", descriptor.category.display_name());
    println!("Version: {}", descriptor.version);
    println!("Authors: {}", descriptor.authors);
    println!();
    println!("Description:");
    println!("  {}", descriptor.description);
    println!();

    if !descriptor.source_ports.is_empty() {
        println!("Sources:");
        for port in &descriptor.source_ports {
            let optional = if port.optional { " (optional)" } else { "" };
            let kind = match port.kind {
                SourceKind::Single => "single".to_string(),
                SourceKind::List { count: Some(n) } => format!("list of {}", n),
                SourceKind::List { count: None } => "list".to_string(),
                SourceKind::Variadic => "variadic".to_string(),
            };
            println!("  • {} [{}]{}", port.name, kind, optional);
            if !port.description.is_empty() {
                println!("    {}", port.description);
            }
        }
        println!();
    }

    if !descriptor.parameters.is_empty() {
        println!("Parameters:");
        for param in &descriptor.parameters {
            let default = param.default_literal.as_deref().unwrap_or("-");
            let required = if param.required { " (required)" } else { "" };
            println!("  • {} [{}] = {}{}", param.name, param.param_type, default, required);
            if !param.description.is_empty() {
                println!("    {}", param.description);
            }
        }
        println!();
    }

    if !descriptor.target_properties.is_empty() {
        println!("Target properties:");
        for property in &descriptor.target_properties {
            println!("  • {}", property.external_name());
            if !property.description.is_empty() {
                println!("    {}", property.description);
            }
        }
    }

    Ok(())
}

fn run_demo(args: &[String]) -> Result<()> {
    let mut config = EngineConfig::from_env().context("reading engine configuration")?;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--no-cache" => {
                config = config.with_tile_cache_disabled(true);
                i += 1;
            }
            "--config" if i + 1 < args.len() => {
                config = EngineConfig::load(&args[i + 1])
                    .and_then(EngineConfig::apply_env)
                    .with_context(|| format!("loading {}", args[i + 1]))?;
                i += 2;
            }
            other => bail!("unknown option: {}", other),
        }
    }

    let engine = Engine::with_builtins().with_config(config);
    let (tile_width, tile_height) = (engine.config().tile_width, engine.config().tile_height);

    println!("⚙️  Building graph: Scale(2.5) <- Add <- [Constant(5.2), Constant(4.8)]");
    let a = constant(&engine, "a", 5.2)?;
    let b = constant(&engine, "b", 4.8)?;

    let add = engine.create_operator("Add", ParameterMap::new(), Sources::positional([a, b]))?;
    let sum = add.target_raster()?;

    let mut params = ParameterMap::new();
    params.insert("factor".to_string(), Value::Float(2.5));
    let scale = engine.create_operator("Scale", params, Sources::from(sum))?;
    let target = scale.target_raster()?;

    println!(
        "   • Target '{}' {}x{} with bands [{}]",
        target.name(),
        target.width(),
        target.height(),
        target.band_names().join(", ")
    );

    let monitor = ProgressMonitor::new();
    let stats = materialize(&target, tile_width, tile_height, &monitor)?;
    println!(
        "✅ Computed {} tiles over {} band(s) in {}ms",
        stats.tiles,
        stats.bands,
        stats.duration.as_millis()
    );

    let sample = target
        .band("band_1")?
        .read_samples_f64(Rectangle::new(0, 0, 1, 1))?;
    println!("   • Sample (0, 0) = {:.1}", sample[0]);

    // Second pass is served from the caches when enabled.
    materialize(&target, tile_width, tile_height, &monitor)?;
    for (label, context) in [("Add", &add), ("Scale", &scale)] {
        let cache = context.cache_stats();
        println!(
            "   • {} cache: {} hits, {} misses, {} tiles{}",
            label,
            cache.hits,
            cache.misses,
            context.cached_tiles(),
            if context.is_cache_enabled() { "" } else { " (disabled)" }
        );
    }

    if let Some(graph) = processing_graph(&target) {
        println!();
        println!("📜 {}:", PROCESSING_GRAPH);
        println!("{}", graph.to_json()?);
    }

    scale.dispose();
    add.dispose();
    Ok(())
}

fn constant(engine: &Engine, name: &str, value: f64) -> Result<Arc<Raster>> {
    let mut params = ParameterMap::new();
    params.insert("value".to_string(), Value::Float(value));
    params.insert("width".to_string(), Value::Integer(1024));
    params.insert("height".to_string(), Value::Integer(1024));
    params.insert("raster_name".to_string(), Value::from(name));
    Ok(engine.create_product("Constant", params, Sources::new())?)
}
