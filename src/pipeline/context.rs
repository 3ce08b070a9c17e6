use std::collections::HashMap;

use axum::http::request::Parts;
use bytes::Bytes;

use crate::cache::CacheKeyFragments;

use super::transform::Transform;

/// Per-request state threaded through a transform's steps.
///
/// Lives for one render only; nothing in it is shared between requests.
#[derive(Debug)]
pub struct AssetContext<'a> {
    request: &'a Parts,
    transform: &'a Transform,
    content: String,
    scratch: HashMap<String, Bytes>,
    fragments: CacheKeyFragments,
}

impl<'a> AssetContext<'a> {
    pub fn new(request: &'a Parts, transform: &'a Transform, content: String) -> Self {
        Self {
            request,
            transform,
            content,
            scratch: HashMap::new(),
            fragments: CacheKeyFragments::new(),
        }
    }

    /// Seed the context with fragments contributed before the cache lookup.
    pub fn with_fragments(mut self, fragments: CacheKeyFragments) -> Self {
        self.fragments = fragments;
        self
    }

    pub fn request(&self) -> &'a Parts {
        self.request
    }

    pub fn transform(&self) -> &'a Transform {
        self.transform
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub(crate) fn set_content(&mut self, content: String) {
        self.content = content;
    }

    /// Consume the context, returning the final content and fragments.
    pub fn finish(self) -> (String, CacheKeyFragments) {
        (self.content, self.fragments)
    }

    pub fn scratch(&self) -> &HashMap<String, Bytes> {
        &self.scratch
    }

    pub fn scratch_mut(&mut self) -> &mut HashMap<String, Bytes> {
        &mut self.scratch
    }

    pub fn fragments(&self) -> &CacheKeyFragments {
        &self.fragments
    }

    pub fn fragments_mut(&mut self) -> &mut CacheKeyFragments {
        &mut self.fragments
    }
}
