use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

use sitewatch::models::load_sites;
use sitewatch::AppError;

fn site_json(name: &str) -> String {
    format!(
        r#"{{
            "name": "{name}",
            "url": "https://shop.example.com/{name}",
            "elementXPath": "//div[@id='stock']",
            "testType": "element_does_not_contain_text",
            "compareValue": "Out of Stock",
            "sendTo": [{{ "emailAddress": "me@example.com", "displayName": "Me" }}],
            "reloadTime": 120,
            "waitTime": 15
        }}"#
    )
}

fn write(dir: &Path, file: &str, contents: &str) {
    fs::write(dir.join(file), contents).unwrap();
}

#[test]
fn test_sites_load_in_file_name_order() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "20-monitor.json", &site_json("monitor"));
    write(dir.path(), "10-gpu.json", &site_json("gpu"));
    write(dir.path(), "notes.txt", "not a site");

    let sites = load_sites(dir.path()).unwrap();
    let names: Vec<&str> = sites.targets.iter().map(|t| t.name.as_str()).collect();

    assert_eq!(names, vec!["gpu", "monitor"]);
    assert!(sites.skipped.is_empty());

    let gpu = &sites.targets[0];
    assert_eq!(gpu.poll_interval, Duration::from_secs(120));
    assert_eq!(gpu.element_wait, Duration::from_secs(15));
    assert_eq!(gpu.recipients[0].display_name, "Me");
    assert_eq!(gpu.notify_url, None);
}

#[test]
fn test_bad_site_file_is_skipped() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.json", &site_json("gpu"));
    write(dir.path(), "b.json", "{ \"name\": \"broken\"");
    write(dir.path(), "c.json", &site_json(""));

    let sites = load_sites(dir.path()).unwrap();

    assert_eq!(sites.targets.len(), 1);
    assert_eq!(sites.skipped.len(), 2);
    assert!(sites.skipped[0].path.ends_with("b.json"));
    assert!(sites.skipped[1].path.ends_with("c.json"));
}

#[test]
fn test_empty_send_url_site_still_loads() {
    let dir = TempDir::new().unwrap();
    let contents = site_json("gpu").replace(
        r#""reloadTime": 120"#,
        r#""sendURL": "", "reloadTime": 120"#,
    );
    write(dir.path(), "gpu.json", &contents);

    let sites = load_sites(dir.path()).unwrap();

    assert!(sites.skipped.is_empty());
    assert_eq!(sites.targets.len(), 1);
    assert_eq!(sites.targets[0].notify_url, None);
}

#[test]
fn test_missing_sites_dir_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = load_sites(&dir.path().join("missing"));
    assert!(matches!(result, Err(AppError::Validation(_))));
}
