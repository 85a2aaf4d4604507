//! Starter configuration command

use anyhow::Result;
use ember_core::{Color, Vec3};
use ember_particles::{BoundaryMode, ColorMode, EmissionShape, EngineConfig, MotionPolicy};
use std::fs;
use std::path::Path;

/// Names accepted by `ember init --policy`
pub const POLICY_PRESETS: &[&str] = &[
    "none",
    "spiral",
    "curl_noise",
    "spherical_shell",
    "galactic_disk",
    "ring_orbit",
];

pub fn run(path: &str, policy: &str, force: bool) -> Result<()> {
    let target = Path::new(path);
    if target.exists() && !force {
        anyhow::bail!("'{}' already exists (use --force to overwrite)", path);
    }

    let config = preset(policy)?;
    config.validate()?;
    let text = config.to_toml_string()?;
    fs::write(target, text)?;

    println!("Wrote {} ({} policy)", path, policy);
    println!("  Try: ember run --config {}", path);
    Ok(())
}

/// Default configuration with a motion preset applied
pub fn preset(policy: &str) -> Result<EngineConfig> {
    let mut config = EngineConfig::default();
    let motion = &mut config.motion;
    match policy {
        "none" => {}
        "spiral" => {
            motion.policy = MotionPolicy::Spiral {
                force: 0.1,
                radius: 2.0,
                height: 5.0,
                turns: 3.0,
            };
            config.emission.shape = EmissionShape::Spiral {
                radius: 2.0,
                turns: 3.0,
                height: 5.0,
            };
        }
        "curl_noise" => {
            motion.policy = MotionPolicy::CurlNoise {
                scale: 0.5,
                strength: 1.5,
                speed: 0.3,
            };
            motion.drag = 0.5;
            motion.color = ColorMode::Speed {
                slow: Color::from_hex(0x1E3A8A),
                fast: Color::from_hex(0xF59E0B),
                max_speed: 3.0,
            };
        }
        "spherical_shell" => {
            motion.policy = MotionPolicy::SphericalShell {
                radius: 4.0,
                thickness: 0.5,
                stiffness: 2.0,
                boundary: BoundaryMode::ShellClamp,
            };
            config.emission.shape = EmissionShape::Sphere { radius: 1.0 };
        }
        "galactic_disk" => {
            motion.policy = MotionPolicy::GalacticDisk {
                arms: 2,
                arm_tightness: 0.5,
                rotation_speed: 2.0,
                flatten: 1.0,
                compression: 0.5,
            };
            config.emission.shape = EmissionShape::Box {
                extents: Vec3::new(8.0, 0.2, 8.0),
            };
            config.emission.speed_min = 0.0;
            config.emission.speed_max = 0.1;
            motion.color = ColorMode::Radial {
                inner: Color::from_hex(0xFFF4D6),
                outer: Color::from_hex(0x4F46E5),
                max_radius: 8.0,
            };
        }
        "ring_orbit" => {
            motion.policy = MotionPolicy::RingOrbit {
                radius: 3.0,
                orbit_speed: 1.5,
                pull: 1.0,
            };
            motion.drag = 0.2;
        }
        other => anyhow::bail!("Unknown policy preset '{}'", other),
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_is_valid_and_round_trips() {
        for name in POLICY_PRESETS {
            let config = preset(name).unwrap();
            config.validate().unwrap();
            let text = config.to_toml_string().unwrap();
            assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
        }
    }

    #[test]
    fn unknown_preset_fails() {
        assert!(preset("vortex").is_err());
    }
}
