//! Integration tests: build real `.var` archives on disk and index them
//! through the public `PackageManager` API.

use std::fs;
use std::io::Write;
use std::path::Path;

use zip::write::SimpleFileOptions;

fn build_var(dir: &Path, name: &str, meta_json: &str) {
    let path = dir.join(name);
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("meta.json", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(meta_json.as_bytes()).unwrap();
    zip.finish().unwrap();
}

fn build_var_text_only(dir: &Path, name: &str, entry_name: &str, content: &str) {
    let path = dir.join(name);
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file(entry_name, SimpleFileOptions::default())
        .unwrap();
    zip.write_all(content.as_bytes()).unwrap();
    zip.finish().unwrap();
}

#[test]
fn indexes_nested_directories_and_resolves_latest() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("Custom")).unwrap();
    build_var(
        dir.path(),
        "Alice.Scene.1.var",
        r#"{"dependencies": {"Bob.Asset.latest": "x"}}"#,
    );
    build_var(
        dir.path().join("Custom").as_path(),
        "Bob.Asset.1.var",
        r#"{"dependencies": {}}"#,
    );
    build_var(
        dir.path().join("Custom").as_path(),
        "Bob.Asset.3.var",
        r#"{"dependencies": {}}"#,
    );

    let mut manager = vam_pkg_core::PackageManager::new(dir.path(), None).unwrap();
    assert_eq!(manager.resolve("Bob.Asset.latest"), "Bob.Asset.3");

    let info = manager.package_info("Alice.Scene.1").unwrap();
    assert!(info.direct_deps.contains("Bob.Asset.3"));
    assert!(!info.direct_deps.contains("Bob.Asset.latest"));
    assert!(info.missing_deps.is_empty());
}

#[test]
fn falls_back_to_text_scraping_without_manifest() {
    let dir = tempfile::tempdir().unwrap();
    build_var_text_only(
        dir.path(),
        "Alice.Scene.1.var",
        "scene.json",
        "ref=Bob.Asset.2:/Custom/thing.vap",
    );
    build_var(dir.path(), "Bob.Asset.2.var", r#"{"dependencies": {}}"#);

    let mut manager = vam_pkg_core::PackageManager::new(dir.path(), None).unwrap();
    let info = manager.package_info("Alice.Scene.1").unwrap();
    assert!(info.direct_deps.contains("Bob.Asset.2"));
}

#[test]
fn reports_missing_transitive_dependency_and_orphans() {
    let dir = tempfile::tempdir().unwrap();
    build_var(
        dir.path(),
        "Alice.Scene.1.var",
        r#"{"dependencies": {"Bob.Asset.1": "x"}}"#,
    );
    build_var(
        dir.path(),
        "Bob.Asset.1.var",
        r#"{"dependencies": {"Ghost.Missing.1": "x"}}"#,
    );
    build_var(dir.path(), "Carl.Standalone.1.var", r#"{"dependencies": {}}"#);

    let manager = vam_pkg_core::PackageManager::new(dir.path(), None).unwrap();

    let missing = manager.find_missing();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].0, "Ghost.Missing.1");

    let orphans = manager.find_orphans();
    let ids: Vec<&str> = orphans.iter().map(|(id, _)| id.as_str()).collect();
    assert!(ids.contains(&"Alice.Scene.1"));
    assert!(ids.contains(&"Carl.Standalone.1"));
    assert!(!ids.contains(&"Bob.Asset.1"));
}
