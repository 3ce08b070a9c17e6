//! Bundle definitions and the request-scoped processing pipeline.
//!
//! A [`Transform`] describes one bundle: the route it is served from, its
//! content type, the ordered source files that are concatenated, and the
//! ordered steps applied to the concatenated text. Transforms are declared
//! on [`BundleOptions`] at startup and never change afterwards.

mod assemble;
mod chain;
mod context;
mod error;
mod files;
mod localize;
mod minify;
mod options;
mod transform;

pub use assemble::{ResolvedSource, assemble, resolve_sources};
pub use chain::{KeyContributor, PostProcessor, run_chain};
pub use context::AssetContext;
pub use error::{ConfigurationError, PipelineError, ProcessorError};
pub use files::{FileProvider, WebRootProvider};
pub use localize::{
    AcceptLanguageResolver, CULTURE_FRAGMENT, CultureResolver, StaticStrings, StringProvider,
    localize_text,
};
pub use minify::Minifier;
pub use options::BundleOptions;
pub use transform::{AssetKind, Transform};
