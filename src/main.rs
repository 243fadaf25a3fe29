mod app;
mod color;
mod extract;
mod graph;
mod journal;
mod physics;
mod util;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::app::{IdeaGraphApp, JournalSource};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Journal JSON file (array of idea records); falls back to demo data.
    #[arg(long)]
    journal: Option<PathBuf>,

    /// Use the built-in demo journal.
    #[arg(long)]
    demo: bool,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let source = match (args.demo, args.journal) {
        (false, Some(path)) => JournalSource::File(path),
        _ => JournalSource::Demo,
    };

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "idea-graph",
        options,
        Box::new(move |cc| Ok(Box::new(IdeaGraphApp::new(cc, source.clone())))),
    )
}
