//! Text tree and Graphviz rendering of a dependency graph.

use crate::model::{DependencyGraph, PackageName};
use std::collections::HashSet;
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

const BRANCH: char = '├';
const LAST: char = '└';
const PIPE: char = '│';
const TRUNCATED: &str = "....";

/// Root node shape in DOT output.
pub const ROOT_SHAPE: &str = "doubleoctagon";
/// Shape of every other node.
pub const NODE_SHAPE: &str = "box";

/// Renders the graph as an indented tree rooted at `graph.root`.
///
/// A name already printed anywhere earlier in the tree is shown once more
/// with a `....` marker and not expanded again. This keeps cyclic graphs
/// finite; it also truncates shared dependencies on later branches.
pub fn render_tree(graph: &DependencyGraph) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_tree(&mut out, graph);
    out
}

/// Writes the tree produced by [`render_tree`] into `out`.
pub fn write_tree<W: fmt::Write>(out: &mut W, graph: &DependencyGraph) -> fmt::Result {
    let mut history = HashSet::new();
    write_node(out, graph, &graph.root, "", &mut history)
}

fn write_node<'g, W: fmt::Write>(
    out: &mut W,
    graph: &'g DependencyGraph,
    name: &'g PackageName,
    margin: &str,
    history: &mut HashSet<&'g PackageName>,
) -> fmt::Result {
    writeln!(out, "{margin}{name}")?;

    // Connectors of this line become continuation columns for the next.
    let indent: String = margin
        .chars()
        .map(|c| match c {
            LAST => ' ',
            BRANCH => PIPE,
            other => other,
        })
        .collect();

    if !history.insert(name) {
        return writeln!(out, "{indent}{LAST}{TRUNCATED}");
    }

    let Some(deps) = graph.dependencies(name) else {
        return Ok(());
    };

    for (i, dep) in deps.iter().enumerate() {
        let connector = if i + 1 == deps.len() { LAST } else { BRANCH };
        write_node(out, graph, dep, &format!("{indent}{connector}"), history)?;
    }
    Ok(())
}

/// Builds the Graphviz DOT description of the graph.
pub fn to_dot(graph: &DependencyGraph) -> String {
    let mut dot = String::new();
    let _ = write_dot(&mut dot, graph);
    dot
}

fn write_dot(out: &mut String, graph: &DependencyGraph) -> fmt::Result {
    writeln!(out, "digraph {} {{", quote(&graph.root))?;
    writeln!(out, "    {} [shape={ROOT_SHAPE}];", quote(&graph.root))?;

    let mut declared = HashSet::from([&graph.root]);
    let others = graph
        .visited
        .iter()
        .chain(graph.edge_pairs().map(|(_, dep)| dep));
    for name in others {
        if declared.insert(name) {
            writeln!(out, "    {} [shape={NODE_SHAPE}];", quote(name))?;
        }
    }

    for (name, dep) in graph.edge_pairs() {
        writeln!(out, "    {} -> {};", quote(name), quote(dep))?;
    }
    writeln!(out, "}}")
}

fn quote(name: &PackageName) -> String {
    format!("\"{}\"", name.as_str().replace('"', "\\\""))
}

/// Errors from writing or rendering the graph description.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to write graph description: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not run '{tool}': {source}")]
    BackendUnavailable {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{tool}' exited with {status}")]
    BackendFailed { tool: String, status: String },
}

/// Writes `<root>.gv` and optionally lays it out with Graphviz `dot`.
#[derive(Debug, Clone)]
pub struct GraphRenderer {
    output_dir: PathBuf,
    format: Option<String>,
    view: bool,
}

impl GraphRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            format: None,
            view: false,
        }
    }

    /// Output format passed to `dot -T` (e.g., `pdf`, `svg`, `png`).
    pub fn with_format(mut self, format: Option<String>) -> Self {
        self.format = format;
        self
    }

    /// Open the rendered file with the platform viewer.
    pub fn with_view(mut self, view: bool) -> Self {
        self.view = view;
        self
    }

    pub fn source_path(&self, graph: &DependencyGraph) -> PathBuf {
        self.output_dir.join(format!("{}.gv", graph.root))
    }

    /// Writes the DOT file and, when a format is set, renders it.
    ///
    /// Returns the path of the most finished artifact: the rendered file when
    /// a format is set, otherwise the DOT source.
    pub async fn render(&self, graph: &DependencyGraph) -> Result<PathBuf, RenderError> {
        let source = self.source_path(graph);
        tokio::fs::write(&source, to_dot(graph)).await?;
        info!(path = %source.display(), "Graph description written");

        let Some(format) = &self.format else {
            return Ok(source);
        };

        let rendered = run_dot(&source, format).await?;
        info!(path = %rendered.display(), "Graph rendered");

        if self.view {
            open_viewer(&rendered).await?;
        }
        Ok(rendered)
    }
}

async fn run_dot(source: &Path, format: &str) -> Result<PathBuf, RenderError> {
    let status = Command::new("dot")
        .arg(format!("-T{format}"))
        .arg("-O")
        .arg(source)
        .status()
        .await
        .map_err(|source| RenderError::BackendUnavailable {
            tool: "dot".to_string(),
            source,
        })?;

    if !status.success() {
        return Err(RenderError::BackendFailed {
            tool: "dot".to_string(),
            status: status.to_string(),
        });
    }

    // `-O` appends the format to the input file name.
    let mut name = source.as_os_str().to_os_string();
    name.push(".");
    name.push(format);
    Ok(PathBuf::from(name))
}

async fn open_viewer(path: &Path) -> Result<(), RenderError> {
    let (tool, mut command) = if cfg!(target_os = "macos") {
        ("open", Command::new("open"))
    } else if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", ""]);
        ("cmd", cmd)
    } else {
        ("xdg-open", Command::new("xdg-open"))
    };

    debug!(tool, path = %path.display(), "Opening viewer");
    command
        .arg(path)
        .spawn()
        .map_err(|source| RenderError::BackendUnavailable {
            tool: tool.to_string(),
            source,
        })?;
    Ok(())
}
