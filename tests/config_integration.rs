//! Integration tests for configuration loading
//!
//! Tests that verify config loading from files and environment variables.

use physync::config::AppConfig;
use serial_test::serial;

#[test]
#[serial]
fn test_env_override() {
    std::env::set_var("PHYSYNC_PHYSICS__MAX_SUB_STEPS", "4");
    let config = AppConfig::load().unwrap();
    std::env::remove_var("PHYSYNC_PHYSICS__MAX_SUB_STEPS");
    assert_eq!(config.physics.max_sub_steps, 4);
}

#[test]
#[serial]
fn test_env_override_nested_section() {
    std::env::set_var("PHYSYNC_CHARACTER__WALK_SPEED", "7.5");
    std::env::set_var("PHYSYNC_DEBUG__LOG_LEVEL", "trace");
    let config = AppConfig::load().unwrap();
    std::env::remove_var("PHYSYNC_CHARACTER__WALK_SPEED");
    std::env::remove_var("PHYSYNC_DEBUG__LOG_LEVEL");

    assert_eq!(config.character.walk_speed, 7.5);
    assert_eq!(config.debug.log_level, "trace");
    // Untouched keys keep their defaults
    assert_eq!(config.character.jump_speed, 50.0);
}

#[test]
#[serial]
fn test_default_file_loading() {
    let cwd = std::env::current_dir().unwrap();
    assert!(cwd.join("config/default.toml").exists());

    let config = AppConfig::load().unwrap();
    assert_eq!(config.physics.gravity, [0.0, -9.8, 0.0]);
    assert_eq!(config.simulation.max_frame_time, 0.25);
    assert!(config.physics.validate().is_ok());
}

#[test]
#[serial]
fn test_invalid_env_value_is_error() {
    std::env::set_var("PHYSYNC_PHYSICS__MAX_SUB_STEPS", "lots");
    let result = AppConfig::load();
    std::env::remove_var("PHYSYNC_PHYSICS__MAX_SUB_STEPS");

    let err = result.unwrap_err();
    assert!(err.to_string().starts_with("Configuration error"));
}
