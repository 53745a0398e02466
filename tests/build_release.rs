//! End-to-end release building scenarios.

mod common;

use common::{tiny_png, write_archive};
use stagepack::archive::{Archive, Constraint, find_best_archive};
use stagepack::bundle::{
    Builder, BundleConfig, PipelineOptions, compose, provenance, release_id, whitespace_minifier,
};
use stagepack::error::BuildError;
use tempfile::TempDir;

fn base_entries<'a>() -> Vec<(&'a str, &'a [u8])> {
    vec![
        ("web.bundle.json", b"{}".as_slice()),
        (
            "app.core/config.json",
            br#"{"description":"Core services"}"#.as_slice(),
        ),
        ("app.ui/config.json", br#"{"depends":["app.core"]}"#.as_slice()),
    ]
}

#[tokio::test]
async fn end_to_end_release_layout() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let logo = [7u8; 50];
    let mut entries = base_entries();
    entries.push(("app.ui/public/logo.png", logo.as_slice()));
    let archive_path = write_archive(home.path(), "app", "1.0.0", &entries);

    let releases = stagepack::build(&archive_path, out.path()).await.unwrap();
    assert_eq!(releases.len(), 1);
    let release = &releases[0];

    // Loader + metadata in 0/, assets under the module ordinal (app.core=1,
    // app.ui=2 in sorted name order).
    assert!(release.join("0/main.js").is_file());
    assert!(release.join("0/main.json").is_file());
    assert!(release.join("2/logo.png").is_file());
    assert_eq!(std::fs::read(release.join("2/logo.png")).unwrap(), logo);

    let metadata: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(release.join("0/main.json")).unwrap())
            .unwrap();
    let modules = &metadata["_"];
    assert_eq!(modules["app.core"]["ordinal"], 1);
    assert_eq!(modules["app.core"]["description"], "Core services");
    assert_eq!(modules["app.ui"]["ordinal"], 2);
    assert_eq!(modules["app.ui"]["archive"]["name"], "app");
    assert_eq!(modules["app.ui"]["archive"]["version"], "1.0.0");

    // The 50-byte png is in the inline set and under the limit: datafied.
    let logo_entry = &modules["app.ui"]["publishes"]["logo.png"];
    assert_eq!(logo_entry["size"], 50);
    let data64 = logo_entry["data64"].as_str().unwrap();
    assert!(data64.starts_with("data:image/png;base64,"));

    // The loader embeds the same provenance-derived tables.
    let loader = std::fs::read_to_string(release.join("0/main.js")).unwrap();
    assert!(loader.starts_with("'web'.bundle({"));
    assert!(loader.contains("bundle.modules={'app.core':'app/1.0.0','app.ui':'app/1.0.0'}"));
    assert!(loader.contains("bundle.archives={'app':'1.0.0'}"));
    assert!(loader.contains("'logo.png':{size:50,data64:'data:image/png;base64,"));
}

#[tokio::test]
async fn second_build_is_a_no_op() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let archive_path = write_archive(home.path(), "app", "1.0.0", &base_entries());

    let first = stagepack::build(&archive_path, out.path()).await.unwrap();
    // Drop a sentinel inside the published release; a rebuild must not touch
    // the directory.
    let sentinel = first[0].join("sentinel.txt");
    std::fs::write(&sentinel, "untouched").unwrap();

    let second = stagepack::build(&archive_path, out.path()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(std::fs::read_to_string(&sentinel).unwrap(), "untouched");
}

#[tokio::test]
async fn release_id_ignores_discovery_order() {
    let home = TempDir::new().unwrap();
    let out_a = TempDir::new().unwrap();
    let out_b = TempDir::new().unwrap();

    // Same logical content, entries written in different orders.
    let mut entries = base_entries();
    let archive_path = write_archive(home.path(), "app", "1.0.0", &entries);
    let first = stagepack::build(&archive_path, out_a.path()).await.unwrap();

    entries.reverse();
    let archive_path = write_archive(home.path(), "app", "1.0.0", &entries);
    let second = stagepack::build(&archive_path, out_b.path()).await.unwrap();

    assert_eq!(
        first[0].file_name().unwrap(),
        second[0].file_name().unwrap()
    );
}

#[tokio::test]
async fn module_conflict_names_both_archives() {
    let home = TempDir::new().unwrap();
    let main_path = write_archive(
        home.path(),
        "app",
        "1.0.0",
        &[
            ("web.bundle.json", br#"{"versions":{"lib":"1.x"}}"#.as_slice()),
            ("shared.util/config.json", b"{}".as_slice()),
        ],
    );
    write_archive(
        home.path(),
        "lib",
        "1.0.0",
        &[("shared.util/config.json", b"{}".as_slice())],
    );

    let main = Archive::open(&main_path).await.unwrap();
    let config: BundleConfig =
        serde_json::from_str(r#"{"versions":{"lib":"1.x"},"includes":["shared"]}"#).unwrap();
    let err = compose(main, "web", &config, home.path()).await.unwrap_err();
    match err {
        BuildError::ModuleConflict {
            module,
            first,
            second,
            ..
        } => {
            assert_eq!(module, "shared.util");
            let both = format!("{first} {second}");
            assert!(both.contains("app/1.0.0"));
            assert!(both.contains("lib/1.0.0"));
        }
        other => panic!("expected module conflict, got {other}"),
    }
}

#[tokio::test]
async fn version_resolution_prefers_best_match() {
    let home = TempDir::new().unwrap();
    for version in ["1.0.0", "1.2.0", "2.0.0"] {
        write_archive(
            home.path(),
            "lib",
            version,
            &[("lib.core/config.json", b"{}".as_slice())],
        );
    }

    let best = find_best_archive(home.path(), "lib", &Constraint::new("1.x"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(best.version().as_str(), "1.2.0");

    let none = find_best_archive(home.path(), "lib", &Constraint::new("3.x"))
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn unmet_constraint_is_a_missing_archive_error() {
    let home = TempDir::new().unwrap();
    let main_path = write_archive(
        home.path(),
        "app",
        "1.0.0",
        &[
            ("web.bundle.json", br#"{"versions":{"ghost":"1.x"}}"#.as_slice()),
            ("app.core/config.json", b"{}".as_slice()),
        ],
    );

    let main = Archive::open(&main_path).await.unwrap();
    let config: BundleConfig = serde_json::from_str(r#"{"versions":{"ghost":"1.x"}}"#).unwrap();
    let err = compose(main, "web", &config, home.path()).await.unwrap_err();
    match err {
        BuildError::MissingArchive {
            bundle,
            archive,
            constraint,
        } => {
            assert_eq!(bundle, "web");
            assert_eq!(archive, "ghost");
            assert_eq!(constraint, "1.x");
        }
        other => panic!("expected missing archive, got {other}"),
    }
}

#[tokio::test]
async fn second_boot_module_is_a_conflict() {
    let home = TempDir::new().unwrap();
    let main_path = write_archive(
        home.path(),
        "app",
        "1.0.0",
        &[
            ("app.a/config.json", b"{}".as_slice()),
            ("app.a/boot.js", b"function(b,m){}".as_slice()),
            ("app.b/config.json", b"{}".as_slice()),
            ("app.b/boot.js", b"function(b,m){}".as_slice()),
        ],
    );

    let main = Archive::open(&main_path).await.unwrap();
    let config = BundleConfig::default();
    let err = compose(main, "web", &config, home.path()).await.unwrap_err();
    match err {
        BuildError::BootConflict { first, second, .. } => {
            assert_eq!(first, "app.a");
            assert_eq!(second, "app.b");
        }
        other => panic!("expected boot conflict, got {other}"),
    }
}

#[tokio::test]
async fn boot_module_shapes_the_loader_prologue() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let archive_path = write_archive(
        home.path(),
        "app",
        "1.0.0",
        &[
            ("web.bundle.json", b"{}".as_slice()),
            ("app.core/config.json", b"{}".as_slice()),
            (
                "app.core/boot.js",
                b"function(bundle,module){return load(bundle,module);}".as_slice(),
            ),
        ],
    );

    let releases = stagepack::build(&archive_path, out.path()).await.unwrap();
    let loader = std::fs::read_to_string(releases[0].join("0/main.js")).unwrap();
    assert!(loader.starts_with(
        "(function(bundle,module){return load(bundle,module);}('web','app.core')).bundle("
    ));
}

#[tokio::test]
async fn missing_primary_config_fails_the_bundle() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let archive_path = write_archive(
        home.path(),
        "app",
        "1.0.0",
        &[
            ("web.bundle.json", b"{}".as_slice()),
            ("app.core/class/Widget.js", b"subclass({})".as_slice()),
        ],
    );

    let err = stagepack::build(&archive_path, out.path()).await.unwrap_err();
    assert!(matches!(err, BuildError::BundlesFailed { .. }));
    // No partial release may survive a failed bundle.
    let bundle_dir = out.path().join("web");
    if bundle_dir.exists() {
        let leftovers: Vec<_> = std::fs::read_dir(&bundle_dir).unwrap().collect();
        assert!(leftovers.is_empty(), "partial release left behind");
    }
}

#[tokio::test]
async fn external_modules_merge_with_provenance() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let main_path = write_archive(
        home.path(),
        "app",
        "1.0.0",
        &[
            ("web.bundle.json", br#"{"versions":{"lib":"1.x"}}"#.as_slice()),
            ("app.core/config.json", b"{}".as_slice()),
        ],
    );
    write_archive(
        home.path(),
        "lib",
        "1.0.0",
        &[("lib.text/config.json", b"{}".as_slice())],
    );
    write_archive(
        home.path(),
        "lib",
        "1.4.0",
        &[("lib.text/config.json", b"{}".as_slice())],
    );

    let releases = stagepack::build(&main_path, out.path()).await.unwrap();
    let metadata: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(releases[0].join("0/main.json")).unwrap())
            .unwrap();
    assert_eq!(metadata["_"]["lib.text"]["archive"]["version"], "1.4.0");

    let loader = std::fs::read_to_string(releases[0].join("0/main.js")).unwrap();
    assert!(loader.contains("'lib.text':'lib/1.4.0'"));
    assert!(loader.contains("bundle.archives={'app':'1.0.0','lib':'1.4.0'}"));

    // The release id matches the provenance of the exact resolved set.
    let main = Archive::open(&main_path).await.unwrap();
    let config: BundleConfig = serde_json::from_str(r#"{"versions":{"lib":"1.x"}}"#).unwrap();
    let composition = compose(main, "web", &config, home.path()).await.unwrap();
    let main = Archive::open(&main_path).await.unwrap();
    let expected = release_id(&provenance(&main, &composition.modules));
    assert_eq!(releases[0].file_name().unwrap().to_str().unwrap(), expected);
}

#[tokio::test]
async fn large_graphics_get_dimension_annotations() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let png = tiny_png();
    let archive_path = write_archive(
        home.path(),
        "app",
        "1.0.0",
        &[
            ("web.bundle.json", b"{}".as_slice()),
            ("app.ui/config.json", b"{}".as_slice()),
            ("app.ui/public/pixel.png", png.as_slice()),
        ],
    );

    // Force the png over the inline limit so it is probed, not datafied.
    let options = PipelineOptions {
        inline_limit: 4,
        ..PipelineOptions::default()
    };
    let releases = Builder::new(out.path())
        .with_options(options)
        .build(&archive_path)
        .await
        .unwrap();

    let metadata: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(releases[0].join("0/main.json")).unwrap())
            .unwrap();
    let entry = &metadata["_"]["app.ui"]["publishes"]["pixel.png"];
    assert_eq!(entry["pixel"]["width"], 1);
    assert_eq!(entry["pixel"]["height"], 1);
    assert!(entry.get("data64").is_none());
}

#[tokio::test]
async fn minification_stage_publishes_siblings() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let archive_path = write_archive(
        home.path(),
        "app",
        "1.0.0",
        &[
            ("web.bundle.json", b"{}".as_slice()),
            ("app.ui/config.json", b"{}".as_slice()),
            (
                "app.ui/public/widget.js",
                b"var  a = 1; // comment\nvar b = 2;".as_slice(),
            ),
        ],
    );

    let options = PipelineOptions {
        minifier: Some(whitespace_minifier()),
        ..PipelineOptions::default()
    };
    let releases = Builder::new(out.path())
        .with_options(options)
        .build(&archive_path)
        .await
        .unwrap();
    let release = &releases[0];

    assert!(release.join("0/main.min.js").is_file());
    assert!(release.join("1/widget.js").is_file());
    let minified = std::fs::read_to_string(release.join("1/widget.min.js")).unwrap();
    assert_eq!(minified, "var a=1;var b=2;");

    let metadata: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(release.join("0/main.json")).unwrap())
            .unwrap();
    assert_eq!(
        metadata["_"]["app.ui"]["publishes"]["widget.min.js"],
        minified.len() as u64
    );
}

#[tokio::test]
async fn secondary_configs_merge_in_path_order() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let archive_path = write_archive(
        home.path(),
        "app",
        "1.0.0",
        &[
            ("web.bundle.json", b"{}".as_slice()),
            (
                "app.core/config.json",
                br#"{"description":"primary"}"#.as_slice(),
            ),
            (
                "app.core/config/10-env.json",
                br#"{"description":"env"}"#.as_slice(),
            ),
            (
                "app.core/config/20-site.json",
                br#"{"description":"site"}"#.as_slice(),
            ),
        ],
    );

    let releases = stagepack::build(&archive_path, out.path()).await.unwrap();
    let metadata: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(releases[0].join("0/main.json")).unwrap())
            .unwrap();
    // Last document in ascending path order wins the merge.
    assert_eq!(metadata["_"]["app.core"]["description"], "site");

    let loader = std::fs::read_to_string(releases[0].join("0/main.js")).unwrap();
    let env = loader.find(r#"{"description":"env"}"#).unwrap();
    let site = loader.find(r#"{"description":"site"}"#).unwrap();
    assert!(env < site, "secondary config sources out of order");
}
