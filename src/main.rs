use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{ error, info, LevelFilter };

use ray_engine::consts::{ CANVAS_HEIGHT, CANVAS_WIDTH, OUT_FILE };
use ray_engine::error::Result;
use ray_engine::renderer::Renderer;
use ray_engine::scene::load_scene;

/// Renders a JSON scene description to a PPM image.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Scene description to render.
    scene: PathBuf,

    /// Where to write the image.
    #[clap(short, long, default_value = OUT_FILE)]
    output: PathBuf,

    #[clap(long, default_value_t = CANVAS_WIDTH)]
    width: usize,

    #[clap(long, default_value_t = CANVAS_HEIGHT)]
    height: usize,

    /// Log the intersection counters after rendering.
    #[clap(long)]
    stats: bool,
}

fn run(args: &Args) -> Result<()> {
    let scene = load_scene(&args.scene)?;

    let mut renderer = Renderer::new();
    renderer.initialize();
    renderer.setup(scene)?;

    let image = renderer.render(args.width, args.height)?;
    image.save(&args.output)?;
    info!("wrote {}x{} image to {}", args.width, args.height, args.output.display());

    if args.stats {
        info!("render statistics\n{}", renderer.stats());
    }

    renderer.close();
    Ok(())
}

fn main() {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        error!("{}", e);
        process::exit(1);
    }
}
