use std::path::PathBuf;

use super::{error::PipelineError, files::FileProvider};

/// A declared source path together with its physical location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub relative: String,
    pub path: PathBuf,
}

/// Resolve every declared source, failing on the first one that is missing.
pub async fn resolve_sources(
    files: &dyn FileProvider,
    sources: &[String],
) -> Result<Vec<ResolvedSource>, PipelineError> {
    let mut resolved = Vec::with_capacity(sources.len());
    for relative in sources {
        let path = files
            .resolve(relative)
            .await
            .ok_or_else(|| PipelineError::SourceFileMissing {
                path: relative.clone(),
            })?;
        resolved.push(ResolvedSource {
            relative: relative.clone(),
            path,
        });
    }
    Ok(resolved)
}

/// Concatenate the sources in order, terminating each one with a newline.
///
/// Any unreadable source aborts the whole assembly.
pub async fn assemble(sources: &[ResolvedSource]) -> Result<String, PipelineError> {
    let mut content = String::new();
    for source in sources {
        let text = tokio::fs::read_to_string(&source.path)
            .await
            .map_err(|err| PipelineError::io(source.relative.clone(), err))?;
        content.push_str(&text);
        content.push('\n');
    }
    Ok(content)
}
