//! Command line front end: `inspect`, `eval` and `run` over a graph file.

use std::path::Path;
use std::sync::Arc;

use log::{error, info};
use uuid::Uuid;

use crate::channel::LocalTransport;
use crate::config::{EngineConfig, load_config};
use crate::editor::Editor;
use crate::error::LibraryError;
use crate::model::graph::read_graph;
use crate::model::graph_analysis::topological_sort;
use crate::model::port::Port;
use crate::util::timing::ScopedTimer;

const USAGE: &str = "usage: nodeflow <inspect|eval|run> <graph.json> [node-id] [input-key]";

pub fn run(args: Vec<String>) -> Result<(), LibraryError> {
    let config = load_config();
    init_logger(&config);

    let command = args.get(1).map(String::as_str);
    let path = args.get(2).map(Path::new);
    let (Some(command), Some(path)) = (command, path) else {
        return Err(LibraryError::invalid(USAGE));
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let transport = Arc::new(LocalTransport::with_echo(config.channel_capacity));
    let editor = Editor::with_builtin_nodes(config).with_transport(transport);
    let report = editor.load_file(path)?;
    for (id, reason) in &report.skipped_nodes {
        error!("Skipped node {}: {}", id, reason);
    }
    for (id, reason) in &report.skipped_connections {
        error!("Skipped connection {}: {}", id, reason);
    }

    match command {
        "inspect" => inspect(&editor),
        "eval" => runtime.block_on(eval(&editor)),
        "run" => {
            let node_id = args
                .get(3)
                .ok_or_else(|| LibraryError::invalid(USAGE))
                .and_then(|s| {
                    Uuid::parse_str(s).map_err(|e| LibraryError::invalid(format!("Bad node id '{}': {}", s, e)))
                })?;
            let input = args.get(4).map(String::as_str);
            runtime.block_on(run_chain(&editor, node_id, input))
        }
        other => Err(LibraryError::invalid(format!("Unknown command '{}'. {}", other, USAGE))),
    }
}

fn init_logger(config: &EngineConfig) {
    let env = env_logger::Env::default().default_filter_or(config.log_filter.as_str());
    // Fails only when a logger is already installed.
    let _ = env_logger::Builder::from_env(env).try_init();
}

fn describe_port(port: &Port) -> String {
    let kind = match port.socket.schema() {
        Some(schema) => schema.to_string(),
        None => "exec".to_string(),
    };
    format!("{}: {}", port.key, kind)
}

fn inspect(editor: &Editor) -> Result<(), LibraryError> {
    let graph = read_graph(editor.graph())?;
    for entry in graph.nodes() {
        let core = &entry.core;
        println!("{} [{}] at ({}, {})", core.id, core.type_id, core.position.x, core.position.y);
        for port in core.inputs.iter() {
            println!("  in  {}", describe_port(port));
        }
        for port in core.outputs.iter() {
            println!("  out {}", describe_port(port));
        }
        for (key, value) in core.control_values() {
            println!("  ctl {} = {}", key, value);
        }
    }
    for conn in graph.connections() {
        println!(
            "{}.{} -> {}.{}",
            conn.from.node_id, conn.from.key, conn.to.node_id, conn.to.key
        );
    }
    for group in graph.groups() {
        println!("group '{}' ({} nodes)", group.text, group.links.len());
    }
    Ok(())
}

async fn eval(editor: &Editor) -> Result<(), LibraryError> {
    let timer = ScopedTimer::info("Graph evaluation");
    let order = {
        let graph = read_graph(editor.graph())?;
        topological_sort(&graph)?
    };
    let count = order.len();
    for id in order {
        let outputs = editor.fetch_outputs(id).await?;
        let type_id = editor.with_node(id, |entry| entry.core.type_id.clone())?;
        println!("{} [{}]", id, type_id);
        for (key, value) in outputs.iter() {
            println!("  {} = {}", key, value);
        }
    }
    if let Some(micros) = timer.elapsed_micros() {
        println!("evaluated {} nodes in {} us", count, micros);
    }
    Ok(())
}

async fn run_chain(editor: &Editor, node_id: Uuid, input: Option<&str>) -> Result<(), LibraryError> {
    let report = editor.execute(node_id, input).await?;
    info!(
        "Executed {} nodes ({} ignored, {} cancelled)",
        report.executed.len(),
        report.ignored.len(),
        report.cancelled.len()
    );
    for id in editor.node_ids()? {
        let (type_id, status) = editor.with_node(id, |entry| (entry.core.type_id.clone(), entry.status.get()))?;
        println!("{} [{}] {:?}", id, type_id, status);
    }
    Ok(())
}
