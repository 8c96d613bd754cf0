use drivestream::config::{ConfigError, CorridorMode, WorldConfig};
use drivestream::world::World;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_from_file() {
    let file = write_config(
        r#"
seed = 1234

[road]
max_segments = 32
corridor = "centerline"

[rocks]
capacity = 10

[railings]
enabled = false

[traffic]
max_cars = 4
"#,
    );

    let config = WorldConfig::load(file.path()).unwrap();
    assert_eq!(config.seed, Some(1234));
    assert_eq!(config.road.max_segments, 32);
    assert_eq!(config.road.corridor, CorridorMode::Centerline);
    assert_eq!(config.rocks.capacity, 10);
    assert_eq!(config.rocks.cell_size, 20.0);
    assert_eq!(config.trees.capacity, 200);
    assert!(!config.railings.enabled);
    assert_eq!(config.traffic.max_cars, 4);
    assert_eq!(config.traffic.lane_width, 2.5);

    let world = World::new(&config);
    assert_eq!(world.seed(), 1234);
    assert_eq!(world.road().len(), 32);
    assert_eq!(world.traffic().cars().len(), 4);
}

#[test]
fn test_shipped_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/drivestream.toml");
    let config = WorldConfig::load(path).unwrap();
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_values_rejected() {
    let file = write_config(
        r#"
[trees]
accept_probability = 1.5
"#,
    );
    assert!(matches!(WorldConfig::load(file.path()), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_malformed_file_rejected() {
    let file = write_config("[road\nmax_segments = ");
    assert!(matches!(WorldConfig::load(file.path()), Err(ConfigError::Parse(_))));
}

#[test]
fn test_missing_file_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    assert!(matches!(WorldConfig::load(&missing), Err(ConfigError::Io(_))));
    let config = WorldConfig::load_or_default(&missing);
    assert_eq!(config.road.max_segments, 256);
}
