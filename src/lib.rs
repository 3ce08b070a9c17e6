//! On-demand asset bundling for axum services.
//!
//! Bundles are declared once at startup through [`pipeline::BundleOptions`],
//! validated into an [`infra::http::AssetPipeline`], and served by the
//! [`infra::http::asset_pipeline_layer`] middleware. Rendered bundles are
//! cached in memory and re-rendered whenever one of their source files
//! changes on disk.

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;
pub mod pipeline;
