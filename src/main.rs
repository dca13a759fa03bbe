use clap::Parser;

use city_generator::export::export_world_map;
use city_generator::geom::{Rect, Vec2};
use city_generator::pipeline::{generate_with, WorldParams};

#[derive(Parser, Debug)]
#[command(name = "city_generator")]
#[command(about = "Generate a transportation-puzzle world: rivers, streets, villages and stations")]
struct Args {
    /// Random seed (uses a random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Side length of the square world, in world units
    #[arg(short = 'w', long, default_value = "32000")]
    world_size: f64,

    /// Number of rivers to generate
    #[arg(short, long, default_value = "2")]
    rivers: usize,

    /// Output PNG path
    #[arg(short, long, default_value = "world.png")]
    out: String,

    /// Side length of the output image in pixels
    #[arg(long, default_value = "1024")]
    image_size: u32,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let args = Args::parse();

    let seed = args.seed.unwrap_or_else(rand::random);
    let params = WorldParams {
        seed,
        world: Rect::new(Vec2::ZERO, Vec2::splat(args.world_size)),
        river_count: args.rivers,
        ..WorldParams::default()
    };

    println!("Generating world with seed: {}", seed);

    // progress labels repeat with live counts; only print stage changes
    let mut last_stage = String::new();
    let world = generate_with(params, |label| {
        let stage = label.split(" (").next().unwrap_or(label);
        if !args.quiet && stage != last_stage {
            println!("{}", stage);
            stage.clone_into(&mut last_stage);
        }
    });

    println!(
        "Generated {} rivers, {} street segments",
        world.terrain.rivers.len(),
        world.streets.len()
    );

    println!("Found {} villages:", world.villages.len());
    for village in &world.villages {
        println!(
            "  {} (population {}, {} streets)",
            village.name,
            village.population,
            village.segments.len()
        );
    }

    println!("Placed {} stations", world.stations.len());
    println!(
        "Optimal network: {} edges, total price {}",
        world.mst.edges().len(),
        world.mst.total_price()
    );
    println!("Player budget: {}", world.budget);
    println!("RNG check value: {}", world.rng_check);

    match export_world_map(&world, &args.out, args.image_size) {
        Ok(()) => println!("Exported map to: {}", args.out),
        Err(e) => eprintln!("Failed to export map: {}", e),
    }
}
