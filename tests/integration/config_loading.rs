//! Layered configuration loading: global file, explicit file, environment.

use splitflap::cli::RunContext;
use splitflap::config::{global_config_path, ConfigLoader};
use splitflap::source::PriorityClass;
use std::fs;
use tempfile::TempDir;

use crate::integration::with_xdg_env;

const GLOBAL: &str = r#"
[providers.local]
provider_type = "scripted"
model = "replay"
responses = ["GOOD MORNING"]

[failover]
preferred = "local"

[timeouts]
aux_secs = 2

[sources.morning]
display_name = "Morning greeting"
[sources.morning.generator]
type = "prompt"
system_prompt = "You greet people."
user_prompt = "Greet everyone on {date}."
"#;

fn write_global(dir: &TempDir, contents: &str) {
    let config_dir = dir.path().join("splitflap");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), contents).unwrap();
}

#[test]
fn test_global_path_follows_xdg() {
    let dir = TempDir::new().unwrap();
    with_xdg_env(&dir, || {
        assert_eq!(
            global_config_path().unwrap(),
            dir.path().join("splitflap").join("config.toml")
        );
    });
}

#[test]
fn test_global_file_loaded() {
    let dir = TempDir::new().unwrap();
    write_global(&dir, GLOBAL);
    let config = with_xdg_env(&dir, || ConfigLoader::new().without_env().load(None).unwrap());
    assert_eq!(config.failover.preferred.as_deref(), Some("local"));
    assert_eq!(config.timeouts.aux_secs, 2);
    assert_eq!(config.timeouts.request_secs, 60);
    assert_eq!(config.sources["morning"].priority, PriorityClass::Normal);
}

#[test]
fn test_explicit_file_overrides_global() {
    let dir = TempDir::new().unwrap();
    write_global(&dir, GLOBAL);
    let explicit = dir.path().join("override.toml");
    fs::write(&explicit, "[timeouts]\naux_secs = 9\n").unwrap();

    let config = with_xdg_env(&dir, || {
        ConfigLoader::new()
            .without_env()
            .load(Some(&explicit))
            .unwrap()
    });
    assert_eq!(config.timeouts.aux_secs, 9);
    assert_eq!(config.failover.preferred.as_deref(), Some("local"));
}

#[test]
fn test_environment_overrides_files() {
    let dir = TempDir::new().unwrap();
    write_global(&dir, GLOBAL);
    let config = with_xdg_env(&dir, || {
        std::env::set_var("SPLITFLAP__VALIDATION__MAX_ATTEMPTS", "5");
        let loaded = ConfigLoader::new().load(None);
        std::env::remove_var("SPLITFLAP__VALIDATION__MAX_ATTEMPTS");
        loaded.unwrap()
    });
    assert_eq!(config.validation.max_attempts, 5);
}

#[tokio::test]
async fn test_scripted_provider_cycle_from_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("splitflap.toml");
    let records = dir.path().join("records.jsonl");
    fs::write(
        &path,
        format!(
            "{}\n[persistence]\nrecords_path = {:?}\n",
            GLOBAL,
            records.to_string_lossy()
        ),
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();
    let context = RunContext::from_config(config).unwrap();
    assert_eq!(context.registry().len(), 1);

    let output = context
        .execute(&splitflap::cli::Commands::Cycle {
            source: None,
            minor: false,
            dry_run: true,
            event: None,
            seed: Some(3),
        })
        .await
        .unwrap();
    assert!(output.contains("GOOD MORNING"));
    assert!(output.contains("Model: local/replay"));

    let written = fs::read_to_string(&records).unwrap();
    assert_eq!(written.lines().count(), 1);
    assert!(written.contains("\"source_id\":\"morning\""));
}
