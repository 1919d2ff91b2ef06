mod manifest;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec3;
use scenekit_common::{ObjectId, ResourceId, Transform};
use scenekit_events::{Bus, Event, channels, listener};
use scenekit_resources::loaders::register_default_loaders;
use scenekit_resources::{
    CacheConfig, FsSource, LoadStatus, ManagerConfig, PreloadRequest, ResourceManager,
};
use scenekit_scene::{
    CollisionDetector, CollisionHandler, FrameConfig, FrameLoop, LinearMover, Rotator, Scene,
};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;

use crate::manifest::Manifest;

#[derive(Parser)]
#[command(name = "scenekit-cli", about = "CLI tool for scenekit resources and scenes")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate info and the built-in resource kinds
    Info,
    /// Preload every resource listed in a JSON manifest
    Preload {
        /// Directory resource urls are resolved against
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
        /// Manifest file: {"resources": [{"kind", "url", "persistent", "tags"}]}
        #[arg(short, long)]
        manifest: PathBuf,
        /// Progress report interval in milliseconds
        #[arg(long, default_value = "100")]
        poll_ms: u64,
        /// Idle time in seconds before unreferenced entries are swept
        #[arg(long, default_value = "300")]
        max_idle_secs: u64,
    },
    /// Run a headless scene with rotating and colliding objects
    Demo {
        /// Number of frames to run
        #[arg(short, long, default_value = "180")]
        frames: u64,
        /// Target frames per second
        #[arg(long, default_value = "60")]
        fps: u32,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building runtime")?;
    let local = LocalSet::new();

    match cli.command {
        Commands::Info => {
            println!("scenekit-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", scenekit_common::crate_info());
            println!("events: {}", scenekit_events::crate_info());
            println!("resources: {}", scenekit_resources::crate_info());
            println!("scene: {}", scenekit_scene::crate_info());
            let manager = ResourceManager::new(
                Rc::new(Bus::new()),
                CacheConfig::default(),
                ManagerConfig::default(),
            );
            register_default_loaders(&manager, Rc::new(FsSource::new(".")));
            println!("kinds: {}", manager.kinds().join(", "));
            Ok(())
        }
        Commands::Preload {
            root,
            manifest,
            poll_ms,
            max_idle_secs,
        } => {
            let cache = CacheConfig {
                max_idle: Duration::from_secs(max_idle_secs),
                ..CacheConfig::default()
            };
            let config = ManagerConfig {
                progress_poll_interval: Duration::from_millis(poll_ms.max(1)),
            };
            local.block_on(&runtime, preload(root, manifest, cache, config))
        }
        Commands::Demo { frames, fps } => local.block_on(&runtime, demo(frames, fps)),
    }
}

/// Log every resource lifecycle event published on `bus`.
fn trace_resource_events(bus: &Bus) {
    let log = listener(|event: &Event| match event.resource_id() {
        Some(id) => tracing::debug!(channel = event.channel(), %id, "resource event"),
        None => tracing::debug!(channel = event.channel(), "resource event"),
    });
    for channel in [
        channels::RESOURCE_REGISTERED,
        channels::RESOURCE_LOADING,
        channels::RESOURCE_LOADED,
        channels::RESOURCE_ERROR,
        channels::RESOURCE_CACHED,
        channels::RESOURCE_REMOVED,
        channels::RESOURCE_CLEAR,
    ] {
        bus.on(channel, log.clone());
    }
}

async fn preload(
    root: PathBuf,
    manifest: PathBuf,
    cache: CacheConfig,
    config: ManagerConfig,
) -> anyhow::Result<()> {
    let requests = Manifest::from_path(&manifest)?.into_requests();
    println!(
        "Preloading {} resources from {}",
        requests.len(),
        root.display()
    );

    let bus = Rc::new(Bus::new());
    trace_resource_events(&bus);
    let manager = ResourceManager::new(bus, cache, config);
    register_default_loaders(&manager, Rc::new(FsSource::new(root)));
    let sweeper = manager.cache().spawn_sweeper();

    let ids: Vec<ResourceId> = requests.iter().map(PreloadRequest::id).collect();
    let mut report = |p: f32| println!("progress: {:>5.1}%", p * 100.0);
    let result = manager
        .preload_resources(requests, Some(&mut report as &mut dyn FnMut(f32)))
        .await;

    for id in &ids {
        match manager.progress(id) {
            Some(p) if p.status == LoadStatus::Error => {
                let reason = p.error.map(|e| e.to_string()).unwrap_or_default();
                println!("  error     {id}: {reason}");
            }
            Some(p) => println!("  {:<9} {id}", format!("{:?}", p.status).to_lowercase()),
            None => println!("  unknown   {id}"),
        }
    }

    let stats = manager.cache().stats();
    println!(
        "Cache: entries={}, persistent={}, approx_bytes={}",
        stats.entries, stats.persistent, stats.total_size
    );
    for (kind, count) in &stats.by_kind {
        println!("  {kind}: {count}");
    }

    sweeper.abort();
    result.context("preload failed")
}

async fn demo(frames: u64, fps: u32) -> anyhow::Result<()> {
    let bus = Rc::new(Bus::new());
    let collisions = Rc::new(Cell::new(0u32));
    let counter = collisions.clone();
    bus.on(
        channels::COLLISION,
        listener(move |event: &Event| {
            if let Event::Collision { a, b } = event {
                counter.set(counter.get() + 1);
                tracing::info!(%a, %b, "collision");
            }
        }),
    );

    let mut scene = Scene::new(bus);
    scene
        .spawn("spinner")?
        .add_component(Rotator::new(Vec3::Y, std::f32::consts::FRAC_PI_2));
    scene
        .spawn_at("moon", Transform::from_position(Vec3::new(2.0, 0.0, 0.0)))?
        .add_component(Rotator::new(Vec3::Z, 1.0));
    scene.set_parent(&ObjectId::from("moon"), &ObjectId::from("spinner"))?;

    for (name, x, vx) in [("left", -5.0, 2.0), ("right", 5.0, -2.0)] {
        scene
            .spawn_at(name, Transform::from_position(Vec3::new(x, 0.0, 0.0)))?
            .add_component(LinearMover {
                velocity: Vec3::new(vx, 0.0, 0.0),
            })
            .add_component(CollisionDetector::new(0.5))
            .add_component(CollisionHandler::new());
    }

    for i in 0..4 {
        let angle = i as f32 * std::f32::consts::FRAC_PI_2;
        let position = Vec3::new(3.0 * angle.cos(), 3.0, 3.0 * angle.sin());
        scene
            .spawn_anonymous(Transform::from_position(position))?
            .add_component(Rotator::new(Vec3::Y, 0.5));
    }

    println!("Demo: {} objects, {frames} frames at {fps} fps", scene.len());
    let mut frame_loop = FrameLoop::new(FrameConfig {
        target_fps: fps,
        max_frames: Some(frames),
        ..FrameConfig::default()
    });
    let stats = frame_loop.run(&mut scene).await;

    for id in scene.ids() {
        if let Some(pos) = scene.world_position(id) {
            println!("  {id}: ({:.2}, {:.2}, {:.2})", pos.x, pos.y, pos.z);
        }
    }
    println!(
        "Frames: {}, simulated {:.2}s, avg update {:?}, max update {:?}, collisions {}",
        stats.frames,
        stats.elapsed,
        stats.avg_update,
        stats.max_update,
        collisions.get()
    );
    Ok(())
}
