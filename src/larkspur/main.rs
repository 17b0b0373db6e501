use anyhow::{Context, Result};
use clap::Parser;
use cslmap::terrain::Raster;
use cslmap::{MapConfig, SaveFile, build_map};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about = "Render a city save into a transit map scene", long_about = None)]
struct Args {
    /// Save file exported from the game
    save: PathBuf,
    /// Directory for scene.json and the background rasters
    #[arg(short, long, default_value = "map_output")]
    output: PathBuf,
    /// RON file overriding map constants
    #[arg(short, long, env = "LARKSPUR_CONFIG")]
    config: Option<PathBuf>,
    /// Skip baking terrain and forest rasters
    #[arg(long)]
    skip_rasters: bool,
}

fn load_config(path: Option<&Path>) -> Result<MapConfig> {
    let Some(path) = path else {
        return Ok(MapConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    MapConfig::from_ron_str(&text).with_context(|| format!("Invalid config {}", path.display()))
}

fn write_raster(dir: &Path, name: &str, raster: &Raster) -> Result<()> {
    let file_path = dir.join(format!("{}.rgba.zlib", name));
    let file = File::create(&file_path)
        .with_context(|| format!("Failed to create {}", file_path.display()))?;
    let mut encoder =
        flate2::write::ZlibEncoder::new(BufWriter::new(file), flate2::Compression::default());
    encoder.write_all(&raster.rgba)?;
    encoder.finish()?.flush()?;
    info!("Wrote {} ({}x{})", file_path.display(), raster.side, raster.side);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let text = std::fs::read_to_string(&args.save)
        .with_context(|| format!("Failed to read save {}", args.save.display()))?;
    let save = SaveFile::parse(&text)
        .with_context(|| format!("Failed to parse save {}", args.save.display()))?;

    let scene = build_map(save, config, !args.skip_rasters)
        .await
        .context("Failed to build map")?;

    std::fs::create_dir_all(&args.output).context("Failed to create output dir")?;

    let scene_path = args.output.join("scene.json");
    let file = File::create(&scene_path)
        .with_context(|| format!("Failed to create {}", scene_path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &scene)?;
    writer.flush()?;
    info!("Wrote {}", scene_path.display());

    if let Some(terrain) = &scene.background.terrain {
        write_raster(&args.output, "terrain", terrain)?;
    }
    if let Some(forests) = &scene.background.forests {
        write_raster(&args.output, "forests", forests)?;
    }

    println!(
        "{}: {} routes, {} stop labels",
        scene.city_name.as_deref().unwrap_or("Unnamed city"),
        scene.route_toggles.len(),
        scene.stops.len()
    );

    Ok(())
}
