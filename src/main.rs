use clap::Parser;
use drivestream::{
    config::WorldConfig,
    mesh::MeshBuffers,
    timing::FixedTimestep,
    world::{Observer, World},
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Frame time the headless driver feeds the fixed-step clock
const SIMULATED_FRAME: f32 = 1.0 / 30.0;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless endless-road world streamer", long_about = None)]
struct Args {
    /// Path to a drivestream.toml configuration file
    #[arg(short, long, default_value = "./drivestream.toml")]
    config: String,

    /// Override log level (trace|debug|info|warn|error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Override the world seed
    #[arg(short, long)]
    seed: Option<u32>,

    /// Metres to drive before stopping
    #[arg(short, long, default_value_t = 2000.0)]
    distance: f32,

    /// Observer speed in metres per second
    #[arg(long, default_value_t = 30.0)]
    speed: f32,

    /// Write road.obj and terrain.obj into this directory at the end
    #[arg(long)]
    export_obj: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = WorldConfig::load(&args.config);
    let mut config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => WorldConfig::default(),
    };

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    info!("Starting drivestream v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) => info!("Configuration loaded from: {}", args.config),
        Err(e) => warn!("Failed to load config {}: {}, using defaults", args.config, e),
    }

    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if args.speed <= 0.0 {
        return Err(format!("speed must be positive, got {}", args.speed).into());
    }

    let mut world = World::new(&config);
    let mut clock = FixedTimestep::default();
    let mut observer = world.observer_at(0.0).unwrap_or_default();
    let mut next_report = 0.0;

    info!(
        "Driving {:.0}m at {:.1}m/s (seed {})",
        args.distance,
        args.speed,
        world.seed()
    );

    while observer.distance_along_path < args.distance {
        let ticks = clock.advance(SIMULATED_FRAME);
        for _ in 0..ticks {
            let distance = observer.distance_along_path + args.speed * clock.step();
            observer = world
                .observer_at(distance)
                .unwrap_or(Observer::new(observer.position, distance));

            let report = world.tick(clock.step(), &observer);
            if let Some(terrain) = &report.terrain {
                if !terrain.is_empty() {
                    debug!(
                        "Tick {}: terrain +{} -{}",
                        world.ticks(),
                        terrain.created.len(),
                        terrain.evicted.len()
                    );
                }
            }
        }

        if observer.distance_along_path >= next_report {
            let stats = world.stats();
            // Where a renderer would draw the observer between fixed ticks
            let shown = observer.distance_along_path + args.speed * clock.step() * clock.alpha();
            info!(
                "{:.0}m: {} segments, {} chunks, {} trees, {} rocks, {} posts, {} cars",
                shown,
                stats.road_segments,
                stats.terrain_chunks,
                stats.trees_visible,
                stats.rocks_visible,
                stats.railings_visible,
                stats.traffic_visible
            );
            next_report += 250.0;
        }
    }

    if let Some(dir) = &args.export_obj {
        export_meshes(&world, dir)?;
    }

    let stats = world.stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);

    world.dispose();
    info!("Done after {} ticks", stats.ticks);
    Ok(())
}

fn export_meshes(world: &World, dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;

    let road = world.road().mesh();
    let road_path = dir.join("road.obj");
    fs::write(&road_path, road.export_obj("road"))?;

    let mut terrain = MeshBuffers::default();
    for key in world.terrain().keys() {
        if let Some(chunk) = world.terrain().chunk(key) {
            terrain.append(&chunk.mesh);
        }
    }
    let terrain_path = dir.join("terrain.obj");
    fs::write(&terrain_path, terrain.export_obj("terrain"))?;

    info!(
        "Exported {} and {} ({} terrain triangles)",
        road_path.display(),
        terrain_path.display(),
        terrain.triangle_count()
    );
    for (name, mesh) in [("road", road), ("terrain", &terrain)] {
        if let Some((min, max)) = mesh.bounds() {
            info!("{} bounds: {:?} .. {:?}", name, min, max);
        }
    }
    Ok(())
}
