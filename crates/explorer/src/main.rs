mod render;

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use entity_tree::dispatch::{MemoryDispatcher, MemoryWorld};
use entity_tree::layout::tree_height;
use entity_tree::tree::Tree;
use entity_tree::{TreeController, TreeEvent, TreeOptions};
use log::info;

/// One step requested on the command line, applied in order
enum Action {
    Select(String),
    Deselect,
    Toggle(String),
    CollapseAll,
    Refresh,
}

const USAGE: &str = "usage: explorer <world.json> [--options <options.json>] \
[--select <path>] [--deselect] [--toggle <path>] [--collapse] [--refresh]";

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let mut world_path = None;
    let mut options_path = None;
    let mut actions = Vec::new();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--options" => options_path = Some(args.next().context(USAGE)?),
            "--select" => actions.push(Action::Select(args.next().context(USAGE)?)),
            "--deselect" => actions.push(Action::Deselect),
            "--toggle" => actions.push(Action::Toggle(args.next().context(USAGE)?)),
            "--collapse" => actions.push(Action::CollapseAll),
            "--refresh" => actions.push(Action::Refresh),
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(());
            }
            _ if world_path.is_none() => world_path = Some(arg),
            _ => bail!("unexpected argument {}\n{}", arg, USAGE),
        }
    }

    let world_path = world_path.context(USAGE)?;
    let world: MemoryWorld = load_json(Path::new(&world_path))?;
    let options: TreeOptions = match options_path {
        Some(path) => load_json(Path::new(&path))?,
        None => TreeOptions::default(),
    };

    let mut controller = TreeController::new(MemoryDispatcher::new(world), options);
    controller.open()?;
    controller.poll_replies();

    for action in actions {
        match action {
            Action::Select(path) => controller.select(Some(path.as_str()))?,
            Action::Deselect => controller.select(None)?,
            Action::Toggle(path) => {
                let id = controller
                    .tree()
                    .find_visible(&path)
                    .with_context(|| format!("No visible entity at {}", path))?;
                controller.toggle(id)?;
            }
            Action::CollapseAll => controller.collapse_all()?,
            Action::Refresh => controller.refresh_open_subtree()?,
        }
        controller.poll_replies();
        report_events(&mut controller);
    }

    print!("{}", render::render_outline(&controller));
    info!(
        "{} nodes, tree height {}px",
        controller.tree().node_count(),
        tree_height(controller.tree(), controller.options())
    );
    Ok(())
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn report_events(controller: &mut TreeController<MemoryDispatcher>) {
    for event in controller.drain_events() {
        match event {
            TreeEvent::Select(Some(id)) => {
                let path = controller.tree().path(id).unwrap_or_default();
                eprintln!("selected {}", path);
            }
            TreeEvent::Select(None) => eprintln!("selection cleared"),
            TreeEvent::Toggle(id) => {
                let path = controller.tree().path(id).unwrap_or_default();
                let state = if controller.tree().is_expanded(id) {
                    "expanded"
                } else {
                    "collapsed"
                };
                eprintln!("{} {}", state, path);
            }
            TreeEvent::SelectQuery(path) => eprintln!("query {}", path),
            TreeEvent::PanelUpdate => {}
        }
    }
}
