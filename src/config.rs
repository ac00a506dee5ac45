//! Application configuration
//!
//! Configuration is loaded from multiple sources with the following priority (lowest to highest):
//! 1. `config/default.toml` (version controlled)
//! 2. `config/user.toml` (gitignored, user overrides)
//! 3. Environment variables (`PHYSYNC_SECTION__KEY`)

use figment::{Figment, providers::{Format, Toml, Env}};
use physync_physics::{CharacterSettings, PhysicsConfig};
use serde::{Serialize, Deserialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Physics world configuration
    #[serde(default)]
    pub physics: PhysicsConfig,
    /// Player character configuration
    #[serde(default)]
    pub character: CharacterConfig,
    /// Frame loop configuration
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Debug configuration
    #[serde(default)]
    pub debug: DebugConfig,
}

impl AppConfig {
    /// Load configuration from default locations
    ///
    /// Priority (lowest to highest):
    /// 1. `config/default.toml`
    /// 2. `config/user.toml`
    /// 3. Environment variables (`PHYSYNC_*`)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific config directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let default_path = config_dir.join("default.toml");
        let user_path = config_dir.join("user.toml");

        let mut figment = Figment::new();

        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }

        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }

        // PHYSYNC_PHYSICS__MAX_SUB_STEPS=4 -> physics.max_sub_steps = 4
        figment = figment.merge(Env::prefixed("PHYSYNC_").split("__"));

        figment.extract().map_err(ConfigError::from)
    }
}

/// Player character configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    /// Capsule radius
    pub radius: f32,
    /// Capsule half height
    pub half_height: f32,
    /// Highest ledge climbed without jumping
    pub step_height: f32,
    /// Steepest walkable slope in degrees
    pub max_slope_degrees: f32,
    /// Initial upward speed of a jump
    pub jump_speed: f32,
    /// Height above take-off at which a jump stops rising
    pub jump_height: f32,
    /// Walking speed (units per second)
    pub walk_speed: f32,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            radius: 0.3,
            half_height: 1.0,
            step_height: 0.1,
            max_slope_degrees: 60.0,
            jump_speed: 50.0,
            jump_height: 0.5,
            walk_speed: 3.0,
        }
    }
}

impl CharacterConfig {
    /// Settings used to build the character rig
    pub fn to_settings(&self) -> CharacterSettings {
        CharacterSettings {
            radius: self.radius,
            half_height: self.half_height,
            step_height: self.step_height,
            max_slope: self.max_slope_degrees.to_radians(),
            jump_speed: self.jump_speed,
            max_jump_height: self.jump_height,
            ..CharacterSettings::default()
        }
    }
}

/// Frame loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Longest frame handed to the physics world, in seconds
    pub max_frame_time: f32,
    /// Frames run by the headless demo
    pub demo_frames: u32,
    /// Simulated length of each demo frame, in seconds
    pub frame_time: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_frame_time: 0.25,
            demo_frames: 240,
            frame_time: 1.0 / 60.0,
        }
    }
}

/// Debug configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Configuration error
#[derive(Debug)]
pub struct ConfigError {
    message: String,
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError {
            message: e.to_string(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.physics.gravity, [0.0, -9.8, 0.0]);
        assert_eq!(config.physics.max_sub_steps, 10);
        assert_eq!(config.character.walk_speed, 3.0);
        assert_eq!(config.simulation.max_frame_time, 0.25);
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml = toml::to_string(&config).unwrap();
        assert!(toml.contains("fixed_timestep"));
        assert!(toml.contains("jump_speed"));
        assert!(toml.contains("log_level"));
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config: AppConfig = toml::from_str("[character]\nwalk_speed = 5.0\n").unwrap();
        assert_eq!(config.character.walk_speed, 5.0);
        assert_eq!(config.character.radius, 0.3);
        assert_eq!(config.physics.fixed_timestep, 1.0 / 60.0);
    }

    #[test]
    fn test_character_settings() {
        let settings = CharacterConfig::default().to_settings();
        assert!((settings.max_slope - std::f32::consts::FRAC_PI_3).abs() < 1e-6);
        assert_eq!(settings.jump_speed, 50.0);
        assert_eq!(settings.max_jump_height, 0.5);
        assert_eq!(settings.up_axis, 1);
    }

    #[test]
    fn test_load_from_missing_dir() {
        let config = AppConfig::load_from("no/such/config/dir").unwrap();
        assert_eq!(config.debug.log_level, "info");
    }
}
