use std::io::Write;

use super::*;

fn bundle(route: &str, files: &[&str]) -> RawBundleSettings {
    RawBundleSettings {
        route: route.to_string(),
        files: files.iter().map(|file| file.to_string()).collect(),
        ..Default::default()
    }
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.cache.enable_cache = Some(true);

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        cache_enable: Some(false),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert!(!settings.cache.enable_cache);
}

#[test]
fn defaults_are_applied() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.assets.web_root, PathBuf::from(DEFAULT_WEB_ROOT));
    assert!(settings.cache.enable_cache);
    assert_eq!(settings.cache.entry_limit, DEFAULT_CACHE_ENTRY_LIMIT);
    assert_eq!(settings.cache.max_age_seconds, 0);
    assert_eq!(settings.localization.default_culture, DEFAULT_CULTURE);
    assert!(settings.bundles.is_empty());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn web_root_override_applies_to_render() {
    let mut raw = RawSettings::default();
    raw.apply_asset_overrides(&AssetOverrides {
        web_root: Some(PathBuf::from("/srv/site")),
    });
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.assets.web_root, PathBuf::from("/srv/site"));
}

#[test]
fn zero_entry_limit_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.entry_limit = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero limit must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.entry_limit",
            ..
        }
    ));
}

#[test]
fn bundle_kind_is_inferred_from_route() {
    let mut raw = RawSettings::default();
    raw.bundles = vec![
        bundle("/app.js", &["js/a.js"]),
        bundle("/site.css", &["css/site.css"]),
        bundle("/data.json", &["data/a.json"]),
    ];

    let settings = Settings::from_raw(raw).expect("valid settings");
    let kinds: Vec<_> = settings.bundles.iter().map(|b| b.kind.clone()).collect();
    assert_eq!(
        kinds,
        [
            AssetKind::JavaScript,
            AssetKind::Css,
            AssetKind::Generic {
                content_type: "application/json".to_string()
            },
        ]
    );
}

#[test]
fn explicit_kind_and_content_type_win() {
    let mut raw = RawSettings::default();
    let mut entry = bundle("/feed", &["feed.xml"]);
    entry.kind = Some("Generic".to_string());
    entry.content_type = Some("application/atom+xml".to_string());
    raw.bundles = vec![entry];

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.bundles[0].kind,
        AssetKind::Generic {
            content_type: "application/atom+xml".to_string()
        }
    );
}

#[test]
fn unknown_bundle_kind_is_rejected() {
    let mut raw = RawSettings::default();
    let mut entry = bundle("/app.js", &["a.js"]);
    entry.kind = Some("typescript".to_string());
    raw.bundles = vec![entry];

    let err = Settings::from_raw(raw).expect_err("unknown kind must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "bundles.kind",
            ..
        }
    ));
}

#[test]
fn duplicate_and_empty_bundles_are_rejected() {
    let mut raw = RawSettings::default();
    raw.bundles = vec![bundle("/app.js", &["a.js"]), bundle("/app.js", &["b.js"])];
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "bundles.route",
            ..
        })
    ));

    let mut raw = RawSettings::default();
    raw.bundles = vec![bundle("/app.js", &[])];
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "bundles.files",
            ..
        })
    ));
}

#[test]
fn config_file_declares_bundles() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    writeln!(
        file,
        r#"
[assets]
web_root = "site"

[cache]
max_age_seconds = 60

[localization]
default_culture = "fr"

[localization.strings.fr]
greeting = "Bonjour"

[[bundles]]
route = "/app.js"
files = ["js/a.js", "js/b.js"]
localize = true
"#
    )
    .expect("write config");

    let args = CliArgs::parse_from([
        "bundler",
        "--config-file",
        file.path().to_str().expect("utf-8 path"),
        "render",
        "/app.js",
    ]);
    let settings = load(&args).expect("load settings");

    assert_eq!(settings.assets.web_root, PathBuf::from("site"));
    assert_eq!(settings.cache.max_age_seconds, 60);
    assert_eq!(settings.localization.default_culture, "fr");
    assert_eq!(
        settings.localization.strings["fr"]["greeting"],
        "Bonjour".to_string()
    );
    assert_eq!(settings.bundles.len(), 1);
    assert_eq!(settings.bundles[0].files, ["js/a.js", "js/b.js"]);
    assert!(settings.bundles[0].localize);
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["bundler"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_render_arguments() {
    let args = CliArgs::parse_from([
        "bundler",
        "render",
        "/app.js",
        "--culture",
        "fr",
        "--output",
        "dist/app.js",
        "--assets-web-root",
        "site",
    ]);

    match args.command.expect("render command") {
        Command::Render(render) => {
            assert_eq!(render.route, "/app.js");
            assert_eq!(render.culture.as_deref(), Some("fr"));
            assert_eq!(render.output, Some(PathBuf::from("dist/app.js")));
            assert_eq!(render.assets.web_root, Some(PathBuf::from("site")));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "bundler",
        "serve",
        "--server-port",
        "8080",
        "--cache-entry-limit",
        "16",
        "--cache-max-age-seconds",
        "300",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_port, Some(8080));
            assert_eq!(serve.overrides.cache_entry_limit, Some(16));
            assert_eq!(serve.overrides.cache_max_age_seconds, Some(300));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}
