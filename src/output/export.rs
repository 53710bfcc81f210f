//! JSON export of the finished graph, for external visualization tools

use crate::graph::SiteGraph;
use crate::output::OutputResult;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes the graph as pretty-printed JSON
pub fn write_graph_json(graph: &SiteGraph, output_path: &Path) -> OutputResult<()> {
    let mut writer = BufWriter::new(File::create(output_path)?);
    serde_json::to_writer_pretty(&mut writer, graph)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    tracing::info!(
        "Wrote graph with {} nodes and {} edges to {}",
        graph.nodes.len(),
        graph.edges.len(),
        output_path.display()
    );
    Ok(())
}
