//! File sinks for rendered documents and mermaid diagrams.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::graph::NodeName;

pub fn ensure_artifacts_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

/// Writes the static orchestration topology diagram.
pub fn write_mermaid_topology(dir: &Path, content: &str) -> io::Result<PathBuf> {
    ensure_artifacts_dir(dir)?;
    let path = dir.join("graph_sop_builder.mmd");
    fs::write(&path, content)?;
    Ok(path)
}

/// Writes a trace diagram connecting consecutively visited nodes for one
/// thread.
pub fn write_mermaid_trace(
    dir: &Path,
    thread_id: &str,
    visited_nodes: &[NodeName],
) -> io::Result<PathBuf> {
    ensure_artifacts_dir(dir)?;
    let mut lines = vec!["graph TD".to_string()];
    for pair in visited_nodes.windows(2) {
        if let [from, to] = pair {
            lines.push(format!("    {from} --> {to}"));
        }
    }
    let path = dir.join(format!("{thread_id}_trace.mmd"));
    fs::write(&path, lines.join("\n"))?;
    Ok(path)
}

/// Writes one rendered document, named by document id, version, and format
/// extension.
pub fn write_rendered_document(
    dir: &Path,
    document_id: &str,
    version: i64,
    extension: &str,
    content: &str,
) -> io::Result<PathBuf> {
    ensure_artifacts_dir(dir)?;
    let path = dir.join(format!("document_{document_id}_v{version}.{extension}"));
    fs::write(&path, content)?;
    Ok(path)
}

/// Transcription is an external concern; the stub accepts the payload and
/// yields no text.
pub fn transcribe_audio_stub(_audio_b64: Option<&str>) -> String {
    String::new()
}
