use std::{fmt, sync::Arc};

use axum::http::request::Parts;
use tracing::trace;

use crate::cache::CacheKeyFragments;

use super::{context::AssetContext, error::ProcessorError};

type ProcessFn = dyn Fn(&mut AssetContext<'_>) -> Result<String, ProcessorError> + Send + Sync;
type ContributeFn = dyn Fn(&Parts, &mut CacheKeyFragments) + Send + Sync;

/// A named content step: receives the request context, returns the new content.
#[derive(Clone)]
pub struct PostProcessor {
    name: &'static str,
    run: Arc<ProcessFn>,
}

impl PostProcessor {
    pub fn new<F>(name: &'static str, run: F) -> Self
    where
        F: Fn(&mut AssetContext<'_>) -> Result<String, ProcessorError> + Send + Sync + 'static,
    {
        Self {
            name,
            run: Arc::new(run),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for PostProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostProcessor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A named, request-only step that records cache-key fragments.
///
/// Contributors never see the bundle content, so they can run before the
/// cache lookup.
#[derive(Clone)]
pub struct KeyContributor {
    name: &'static str,
    run: Arc<ContributeFn>,
}

impl KeyContributor {
    pub fn new<F>(name: &'static str, run: F) -> Self
    where
        F: Fn(&Parts, &mut CacheKeyFragments) + Send + Sync + 'static,
    {
        Self {
            name,
            run: Arc::new(run),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn contribute(&self, request: &Parts, fragments: &mut CacheKeyFragments) {
        (self.run)(request, fragments);
    }
}

impl fmt::Debug for KeyContributor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyContributor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Apply every step in order, each one replacing the content buffer.
///
/// Stops at the first failing step; the buffer then holds the output of the
/// last successful step and must not be served.
pub fn run_chain(
    processors: &[PostProcessor],
    ctx: &mut AssetContext<'_>,
) -> Result<(), ProcessorError> {
    for processor in processors {
        let next = (processor.run)(ctx)?;
        trace!(
            step = processor.name,
            bytes_in = ctx.content().len(),
            bytes_out = next.len(),
            "post-processor applied"
        );
        ctx.set_content(next);
    }
    Ok(())
}
