//! Zenbake command line tool - loads a level description and reports what
//! the preparation pipeline produced.
//!
//! Usage: cargo run --release -- --level <FILE> [OPTIONS]
//!
//! Options:
//!   --level <FILE>      Level description (JSON)
//!   --config <FILE>     Bake configuration (JSON, default settings if absent)
//!   --textures <DIR>    Texture directory (solid placeholders if absent)
//!   --camera <X,Y,Z>    Camera position for a draw list (default: level center)
//!   --look <X,Y,Z>      Camera target (default: camera + forward)
//!   --upload            Upload all batches to the GPU

use std::collections::BTreeSet;
use std::time::Instant;

use glam::Vec3;

use zenbake::batch::{ImageTextureSource, MemoryTextureSource, TextureData, TextureSource};
use zenbake::core::{logging, BakeConfig, Camera};
use zenbake::gpu::{GpuBatch, GpuContext};
use zenbake::mesh::PassthroughOptimizer;
use zenbake::world::input::SubMeshInput;
use zenbake::{Error, LevelInput, LevelSession};

const PLACEHOLDER_SIZE: u32 = 16;

fn main() {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<(), Error> {
    let Some(level_path) = parse_str_arg(args, "--level") else {
        return Err(Error::Config("missing --level <FILE>".into()));
    };
    let config = match parse_str_arg(args, "--config") {
        Some(path) => BakeConfig::load(&path)?,
        None => BakeConfig::default(),
    };

    let level = LevelInput::load(&level_path)?;
    let source: Box<dyn TextureSource> = match parse_str_arg(args, "--textures") {
        Some(dir) => Box::new(ImageTextureSource::new(dir)?),
        None => Box::new(placeholder_textures(&level)?),
    };

    let mut session = LevelSession::load(level, config, source, &PassthroughOptimizer)?;
    print_stats(&session);

    let center = session.grid().bounds().center();
    let position = parse_vec3_arg(args, "--camera").unwrap_or(center);
    let target = parse_vec3_arg(args, "--look").unwrap_or(position + Vec3::NEG_Z);
    session.update_camera(&Camera::look_at(position, target, Vec3::Y));

    let start = Instant::now();
    let list = session.draw_list();
    println!(
        "Draw list from {:?}: {} calls, {} batches drawn, {} culled, {} elements ({:.2}ms)",
        position,
        list.draw_calls,
        list.batches_drawn,
        list.batches_culled,
        list.element_count(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    if args.iter().any(|a| a == "--upload") {
        upload(&session)?;
    }
    Ok(())
}

/// Solid textures for every texture the level names
fn placeholder_textures(level: &LevelInput) -> Result<MemoryTextureSource, Error> {
    let submeshes = level
        .world
        .submeshes
        .iter()
        .chain(level.meshes.values().flat_map(|m| m.submeshes.iter()));
    let names: BTreeSet<String> = submeshes.map(|s: &SubMeshInput| s.material.texture.to_uppercase()).collect();

    let mut source = MemoryTextureSource::new();
    for name in &names {
        source.insert(TextureData::solid(name, PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, [128, 128, 128, 255])?);
    }
    log::info!("No texture directory given, using {} placeholder textures", source.len());
    Ok(source)
}

fn print_stats(session: &LevelSession) {
    let stats = session.stats();
    println!("Level loaded in {:.1}ms", stats.load_ms);
    println!("  World triangles:   {}", stats.world_triangles);
    println!("  Materials:         {}", stats.materials);
    println!("  Lights:            {} ({} static)", stats.lights, stats.static_lights);
    println!(
        "  Instances:         {} ({} lit, {} sunlit, {} skipped)",
        stats.instances, stats.lit_instances, stats.sunlit_instances, stats.skipped_instances
    );
    println!("  Grid cells in use: {}", stats.cells_in_use);
    println!("  World batches:     {}", stats.world_batches);
    println!("  Instance batches:  {}", stats.instance_batches);
    for batch in session.world_batches().iter().chain(session.instance_batches()) {
        println!(
            "    {:>8} {:?}: {} verts, {} indices (+{} reduced), {} layers, {} cells",
            batch.strategy().name(),
            batch.blend,
            batch.vertex_count(),
            batch.index_count(),
            batch.lod_index_count(),
            batch.textures.len(),
            batch.chunk_count()
        );
    }
}

fn upload(session: &LevelSession) -> Result<(), Error> {
    let ctx = pollster::block_on(GpuContext::new_headless())?;
    let start = Instant::now();
    let mut uploaded = Vec::new();
    for batch in session.world_batches().iter().chain(session.instance_batches()) {
        uploaded.push(GpuBatch::upload(&ctx.device, &ctx.queue, batch)?);
    }
    ctx.queue.submit(std::iter::empty());
    println!("Uploaded {} batches in {:.1}ms", uploaded.len(), start.elapsed().as_secs_f64() * 1000.0);
    Ok(())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_vec3_arg(args: &[String], flag: &str) -> Option<Vec3> {
    let value = parse_str_arg(args, flag)?;
    let parts: Vec<f32> = value.split(',').filter_map(|s| s.trim().parse().ok()).collect();
    match parts.as_slice() {
        [x, y, z] => Some(Vec3::new(*x, *y, *z)),
        _ => {
            log::warn!("Ignoring {} {}: expected x,y,z", flag, value);
            None
        }
    }
}
