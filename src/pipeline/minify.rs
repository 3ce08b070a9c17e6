use super::{error::ProcessorError, transform::AssetKind};

/// A pluggable minifier applied as the last step of a transform.
///
/// The algorithm itself lives outside this crate; closures with the
/// matching signature implement the trait directly.
pub trait Minifier: Send + Sync {
    fn minify(&self, kind: &AssetKind, source: &str) -> Result<String, ProcessorError>;
}

impl<F> Minifier for F
where
    F: Fn(&AssetKind, &str) -> Result<String, ProcessorError> + Send + Sync,
{
    fn minify(&self, kind: &AssetKind, source: &str) -> Result<String, ProcessorError> {
        self(kind, source)
    }
}
