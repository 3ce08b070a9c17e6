use std::{future::IntoFuture, process, sync::Arc};

use axum::http::{Request, header::ACCEPT_LANGUAGE};
use bundler::{
    application::error::AppError,
    cache::{AssetCache, CacheConfig, MemoryAssetCache},
    config,
    infra::{
        error::InfraError,
        http::{self, AssetPipeline},
        telemetry,
    },
    pipeline::{BundleOptions, FileProvider, WebRootProvider},
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let pipeline = Arc::new(build_pipeline(&settings)?);

    match command {
        config::Command::Serve(_) => serve_http(&settings, pipeline).await,
        config::Command::Render(args) => run_render(pipeline, args).await,
    }
}

fn build_pipeline(settings: &config::Settings) -> Result<AssetPipeline, AppError> {
    if !settings.assets.web_root.is_dir() {
        warn!(
            web_root = %settings.assets.web_root.display(),
            "web root does not exist; every bundle will fail until it is created"
        );
    }

    let options = BundleOptions::from_settings(&settings.bundles, &settings.localization);
    let files: Arc<dyn FileProvider> =
        Arc::new(WebRootProvider::new(settings.assets.web_root.clone()));
    let cache_config = CacheConfig::from(&settings.cache);
    let store: Arc<dyn AssetCache> = Arc::new(MemoryAssetCache::new(&cache_config));

    Ok(AssetPipeline::new(options, files, store, cache_config)?)
}

async fn run_render(
    pipeline: Arc<AssetPipeline>,
    args: config::RenderArgs,
) -> Result<(), AppError> {
    let transform = pipeline
        .match_route(&args.route)
        .ok_or_else(|| AppError::not_found(format!("no bundle is served from `{}`", args.route)))?;

    let mut builder = Request::get(args.route.as_str());
    if let Some(culture) = args.culture.as_deref() {
        builder = builder.header(ACCEPT_LANGUAGE, culture);
    }
    let (parts, _) = builder
        .body(())
        .map_err(|err| AppError::unexpected(format!("invalid route `{}`: {err}", args.route)))?
        .into_parts();

    let entry = pipeline.render(transform, &parts).await?;

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, &entry.body)
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            info!(
                route = transform.route(),
                output = %path.display(),
                bytes = entry.body.len(),
                "bundle written"
            );
        }
        None => {
            use tokio::io::AsyncWriteExt;

            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(&entry.body)
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            stdout
                .flush()
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
        }
    }

    Ok(())
}

async fn serve_http(
    settings: &config::Settings,
    pipeline: Arc<AssetPipeline>,
) -> Result<(), AppError> {
    let router = http::build_router(pipeline);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = shutdown_signal() => {
            let grace = settings.server.graceful_shutdown;
            info!(grace_seconds = grace.as_secs(), "shutdown requested, draining connections");
            match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => {
                    result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?
                }
                Err(_) => warn!("graceful shutdown timed out; dropping open connections"),
            }
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
