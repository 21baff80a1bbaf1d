//! `nova docs`: Document index management.

use crate::runtime::Runtime;
use nova_core::retrieval::DocumentIndex;
use nova_memory::DocumentStore;
use std::path::{Path, PathBuf};

pub async fn add(files: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;

    let mut failed = 0;
    for path in files {
        match ingest_file(runtime.documents.as_ref(), path).await {
            Ok(chunks) => println!("  Indexed {}: {chunks} chunks", path.display()),
            Err(e) => {
                eprintln!("  Skipped {}: {e}", path.display());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(format!("{failed} of {} files could not be indexed", files.len()).into());
    }
    Ok(())
}

/// Index one plain-text file under its file name.
pub async fn ingest_file(
    documents: &dyn DocumentStore,
    path: &Path,
) -> Result<usize, Box<dyn std::error::Error>> {
    let text = tokio::fs::read_to_string(path).await?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(documents.ingest(&source, &text).await?)
}

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;
    let sources = runtime.documents.sources().await?;

    if sources.is_empty() {
        println!("  No documents indexed. Add some with: nova docs add <FILE>");
    }
    for (source, chunks) in sources {
        println!("  {source:<40} {chunks:>5} chunks");
    }
    Ok(())
}

pub async fn count() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;
    println!("{}", runtime.index.count().await?);
    Ok(())
}

pub async fn clear() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;
    runtime.documents.clear().await?;
    println!("  All documents removed.");
    Ok(())
}
