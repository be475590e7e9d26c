use std::{fs, path::Path};

use anyhow::Result;
use clap::Parser;

use matchmove_core::{NullProgress, UndoJournal};
use matchmove_solver::{solve, BackendKind};

mod scene_file;

use scene_file::SceneFile;

/// Match-move solver: fit scene attributes to 2D tracks.
#[derive(Debug, Parser)]
#[command(author, version, about = "Match-move bundle adjustment solver")]
struct Args {
    /// Path to a JSON scene file.
    #[arg(long)]
    scene: String,

    /// Override the backend from the scene file ("dense" or "sparse").
    #[arg(long)]
    backend: Option<String>,
}

fn load_scene_file(path: &Path) -> Result<SceneFile> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

fn run_solve_from_file(scene_path: &str, backend: Option<&str>) -> Result<String> {
    let file = load_scene_file(Path::new(scene_path))?;
    let (mut scene, mut request) = file.build()?;
    if let Some(name) = backend {
        request.options.backend = BackendKind::parse_lossy(name);
    }

    let mut journal = UndoJournal::new();
    let outcome = solve(&mut scene, &mut NullProgress, &mut journal, &request)?;
    Ok(serde_json::to_string_pretty(&outcome)?)
}

fn main() {
    env_logger::init();
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let json = run_solve_from_file(&args.scene, args.backend.as_deref())?;
    println!("{json}");
    Ok(())
}
