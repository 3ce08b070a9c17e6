use std::{collections::BTreeMap, sync::Arc};

use axum::http::{header::ACCEPT_LANGUAGE, request::Parts};

use super::{error::ProcessorError, transform::AssetKind, transform::Transform};

/// Cache-key fragment holding the culture a bundle was localized for.
pub const CULTURE_FRAGMENT: &str = "culture";

/// Looks up a localized string for a culture.
pub trait StringProvider: Send + Sync {
    fn lookup(&self, culture: &str, key: &str) -> Option<String>;
}

/// Picks the culture a request should be served in.
pub trait CultureResolver: Send + Sync {
    fn resolve(&self, request: &Parts) -> String;
}

impl<F> CultureResolver for F
where
    F: Fn(&Parts) -> String + Send + Sync,
{
    fn resolve(&self, request: &Parts) -> String {
        self(request)
    }
}

/// In-memory string table keyed by culture, then by string key.
#[derive(Debug, Clone, Default)]
pub struct StaticStrings {
    cultures: BTreeMap<String, BTreeMap<String, String>>,
}

impl StaticStrings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        culture: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.cultures
            .entry(culture.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Cultures with at least one string.
    pub fn cultures(&self) -> impl Iterator<Item = &str> {
        self.cultures.keys().map(String::as_str)
    }
}

impl From<BTreeMap<String, BTreeMap<String, String>>> for StaticStrings {
    fn from(cultures: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        Self { cultures }
    }
}

impl StringProvider for StaticStrings {
    fn lookup(&self, culture: &str, key: &str) -> Option<String> {
        self.cultures
            .get(culture)
            .and_then(|strings| strings.get(key))
            .cloned()
    }
}

/// Resolves the culture from the `Accept-Language` header.
///
/// Tags are tried in quality order; a tag matches a supported culture
/// exactly or by its primary language subtag (`de-AT` matches `de`).
#[derive(Debug, Clone)]
pub struct AcceptLanguageResolver {
    default_culture: String,
    supported: Vec<String>,
}

impl AcceptLanguageResolver {
    pub fn new<I, S>(default_culture: impl Into<String>, supported: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            default_culture: default_culture.into(),
            supported: supported.into_iter().map(Into::into).collect(),
        }
    }

    fn best_match(&self, header: &str) -> Option<&str> {
        let mut tags: Vec<(&str, f32)> = header
            .split(',')
            .filter_map(|entry| {
                let mut parts = entry.split(';');
                let tag = parts.next()?.trim();
                if tag.is_empty() || tag == "*" {
                    return None;
                }
                let quality = parts
                    .find_map(|param| param.trim().strip_prefix("q="))
                    .and_then(|q| q.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                (quality > 0.0).then_some((tag, quality))
            })
            .collect();
        // Stable sort keeps header order among equal qualities.
        tags.sort_by(|a, b| b.1.total_cmp(&a.1));

        tags.into_iter().find_map(|(tag, _)| self.supported_culture(tag))
    }

    fn supported_culture(&self, tag: &str) -> Option<&str> {
        if let Some(exact) = self
            .supported
            .iter()
            .find(|culture| culture.eq_ignore_ascii_case(tag))
        {
            return Some(exact);
        }
        let primary = tag.split('-').next().unwrap_or(tag);
        self.supported
            .iter()
            .find(|culture| culture.eq_ignore_ascii_case(primary))
            .map(String::as_str)
    }
}

impl CultureResolver for AcceptLanguageResolver {
    fn resolve(&self, request: &Parts) -> String {
        request
            .headers
            .get(ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok())
            .and_then(|header| self.best_match(header))
            .unwrap_or(self.default_culture.as_str())
            .to_string()
    }
}

pub(super) fn attach(
    transform: &mut Transform,
    provider: Arc<dyn StringProvider>,
    resolver: Arc<dyn CultureResolver>,
) {
    transform.add_key_contributor("localize.culture", move |request, fragments| {
        fragments.insert(CULTURE_FRAGMENT, resolver.resolve(request));
    });
    transform.add_post_processor("localize", move |ctx| {
        let culture = ctx.fragments().get(CULTURE_FRAGMENT).ok_or_else(|| {
            ProcessorError::new("localize", "no culture was resolved for the request")
        })?;
        Ok(localize_text(
            ctx.content(),
            culture,
            provider.as_ref(),
            ctx.transform().kind(),
        ))
    });
}

/// Replace every `{{key}}` token that the provider knows for `culture`.
///
/// Unknown keys are left untouched. Values are escaped so they can sit
/// inside a quoted string literal of the bundle's language.
pub fn localize_text(
    content: &str,
    culture: &str,
    provider: &dyn StringProvider,
    kind: &AssetKind,
) -> String {
    let mut output = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            output.push_str(&rest[start..]);
            return output;
        };

        let token = &rest[start..start + 2 + end + 2];
        let key = after_open[..end].trim();
        let value = is_token_key(key)
            .then(|| provider.lookup(culture, key))
            .flatten();
        match value {
            Some(value) => output.push_str(&escape_for(kind, &value)),
            None => output.push_str(token),
        }
        rest = &after_open[end + 2..];
    }

    output.push_str(rest);
    output
}

fn is_token_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn escape_for(kind: &AssetKind, value: &str) -> String {
    match kind {
        AssetKind::JavaScript => escape_javascript(value),
        AssetKind::Css => escape_css(value),
        AssetKind::Generic { .. } => value.to_string(),
    }
}

fn escape_javascript(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\'' => escaped.push_str("\\'"),
            '`' => escaped.push_str("\\`"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            '<' if chars.peek() == Some(&'/') => escaped.push_str("<\\"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn escape_css(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\A "),
            other => escaped.push(other),
        }
    }
    escaped
}
