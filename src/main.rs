use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use cave_builder::config::CaveConfig;
use cave_builder::geometry::Vector3i;
use cave_builder::heightmap::HeightMap;
use cave_builder::noise_field::WaterLevel;
use cave_builder::pipeline::{CaveGenerator, Stage};
use cave_builder::prefab::{PrefabCatalog, WorldLayout};
use cave_builder::region::CaveChunksProvider;
use cave_builder::seeds::CaveSeeds;

#[derive(Parser, Debug)]
#[command(name = "cave_builder")]
#[command(about = "Generate underground cave networks between prefabs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate caves and write region files
    Generate(GenerateArgs),
    /// Query an existing output directory
    Query(QueryArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Random seed (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// World size in blocks, a multiple of 32 (overrides the config file)
    #[arg(short = 'w', long)]
    world_size: Option<i32>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Prefab catalog (JSON)
    #[arg(long)]
    catalog: PathBuf,

    /// World layout with surface prefabs and street tiles (JSON)
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Grayscale PNG heightmap (synthetic terrain if neither heightmap option is given)
    #[arg(long, conflicts_with = "heightmap_raw")]
    heightmap: Option<PathBuf>,

    /// Raw little-endian u16 heightmap, world_size x world_size samples
    #[arg(long)]
    heightmap_raw: Option<PathBuf>,

    /// Height of the brightest heightmap pixel
    #[arg(long, default_value = "255")]
    max_height: f32,

    /// Flood low tunnel sections
    #[arg(long)]
    water: bool,

    /// How much of the network to flood when water is enabled
    #[arg(long, value_enum)]
    water_level: Option<WaterLevel>,

    /// Output directory for region files
    #[arg(short, long, default_value = "caves")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Output directory of a previous generation
    #[arg(short, long, default_value = "caves")]
    output: PathBuf,

    /// Check whether a runtime position is cave
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    is_cave: Option<Vec<i32>>,

    /// List the cave blocks of a runtime chunk
    #[arg(long, num_args = 2, value_names = ["CX", "CZ"], allow_negative_numbers = true)]
    chunk: Option<Vec<i32>>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Generate(args) => generate(args),
        Command::Query(args) => query(args),
    }
}

fn generate(args: GenerateArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => CaveConfig::from_file(path)?,
        None => CaveConfig::default(),
    };
    if let Some(world_size) = args.world_size {
        config.world_size = world_size;
    }
    if args.water {
        config.generate_water = true;
    }
    if let Some(level) = args.water_level {
        config.water_level = level;
    }
    config.validate()?;

    let seed = args.seed.unwrap_or_else(rand::random);
    let seeds = CaveSeeds::from_master(seed);

    println!("Generating caves with seed: {}", seed);
    println!("World size: {}x{}", config.world_size, config.world_size);

    let heightmap = if let Some(path) = &args.heightmap {
        HeightMap::from_png(path, args.max_height)?
    } else if let Some(path) = &args.heightmap_raw {
        HeightMap::from_raw(path, config.world_size, args.max_height / u16::MAX as f32)?
    } else {
        println!("No heightmap given, using synthetic terrain");
        HeightMap::synthetic(config.world_size, CaveSeeds::noise_seed(seeds.terrain))
    };

    let catalog = PrefabCatalog::load(&args.catalog)?;
    let layout = match &args.layout {
        Some(path) => WorldLayout::load(path)?,
        None => WorldLayout::default(),
    };

    let generator = CaveGenerator::new(config, seeds, heightmap, catalog)?.with_layout(layout);

    let mut current = None;
    let world = generator.generate_into(&args.output, |stage: Stage, _done| {
        if current != Some(stage) {
            println!("{}...", stage);
            current = Some(stage);
        }
    })?;

    println!("{}", world.stats);
    println!("Caves written to {}", args.output.display());
    Ok(())
}

fn query(args: QueryArgs) -> Result<(), Box<dyn Error>> {
    let provider = CaveChunksProvider::open(&args.output)?;

    if let Some(position) = args.is_cave.as_deref() {
        let [x, y, z] = position else {
            return Err("--is-cave takes three coordinates".into());
        };
        let water = if provider.is_water(*x, *y, *z) { " (water)" } else { "" };
        println!("{} is cave: {}{}", Vector3i::new(*x, *y, *z), provider.is_cave(*x, *y, *z), water);
    }

    if let Some(chunk) = args.chunk.as_deref() {
        let [cx, cz] = chunk else {
            return Err("--chunk takes two coordinates".into());
        };
        let blocks = provider.cave_blocks(*cx, *cz);
        println!("Chunk ({}, {}): {} cave blocks", cx, cz, blocks.len());
        for block in blocks {
            println!("  {} flags {:#04x}", block.position(), block.flags);
        }
    }

    Ok(())
}
