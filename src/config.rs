//! Runtime configuration
//!
//! Loaded from JSON; every field has a default so a partial file (or none at
//! all) is valid.

use anyhow::{ensure, Context, Result};
use cgmath::Point3;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::gfx::camera::{CameraManager, OrbitBounds, OrbitController, OrbitState, PerspectiveCamera};
use crate::gfx::viewport::Viewport;

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "WindowConfig::default_title")]
    pub title: String,
    #[serde(default = "WindowConfig::default_width")]
    pub width: u32,
    #[serde(default = "WindowConfig::default_height")]
    pub height: u32,
    #[serde(default = "WindowConfig::default_vsync")]
    pub vsync: bool,
    /// Upper bound for the device pixel ratio
    #[serde(default = "WindowConfig::default_max_pixel_ratio")]
    pub max_pixel_ratio: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "CameraConfig::default_fov")]
    pub fov: f32,
    #[serde(default = "CameraConfig::default_near")]
    pub near: f32,
    #[serde(default = "CameraConfig::default_far")]
    pub far: f32,
    #[serde(default = "CameraConfig::default_position")]
    pub position: [f32; 3],
    #[serde(default)]
    pub target: [f32; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrbitConfig {
    #[serde(default = "OrbitConfig::default_damping")]
    pub damping: f32,
    #[serde(default = "OrbitConfig::default_rotate_speed")]
    pub rotate_speed: f32,
    #[serde(default = "OrbitConfig::default_zoom_speed")]
    pub zoom_speed: f32,
    #[serde(default = "OrbitConfig::default_pan_speed")]
    pub pan_speed: f32,
    #[serde(default = "OrbitConfig::default_min_radius")]
    pub min_radius: f32,
    #[serde(default = "OrbitConfig::default_max_radius")]
    pub max_radius: f32,
    /// Radians per second; `None` disables auto-rotation
    #[serde(default)]
    pub auto_rotate: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PanelConfig {
    #[serde(default = "PanelConfig::default_title")]
    pub title: String,
    #[serde(default = "PanelConfig::default_width")]
    pub width: f32,
    #[serde(default = "PanelConfig::default_visible")]
    pub visible: bool,
    #[serde(default = "PanelConfig::default_font_size")]
    pub font_size: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
    #[serde(default = "AssetConfig::default_root")]
    pub root: PathBuf,
    /// Loader worker count; defaults to one per core, capped at four
    #[serde(default)]
    pub loader_threads: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub orbit: OrbitConfig,
    #[serde(default)]
    pub panel: PanelConfig,
    #[serde(default)]
    pub assets: AssetConfig,
}

impl WindowConfig {
    fn default_title() -> String {
        "Vista".to_string()
    }

    const fn default_width() -> u32 {
        1280
    }

    const fn default_height() -> u32 {
        720
    }

    const fn default_vsync() -> bool {
        true
    }

    const fn default_max_pixel_ratio() -> f32 {
        2.0
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: Self::default_title(),
            width: Self::default_width(),
            height: Self::default_height(),
            vsync: Self::default_vsync(),
            max_pixel_ratio: Self::default_max_pixel_ratio(),
        }
    }
}

impl CameraConfig {
    const fn default_fov() -> f32 {
        75.0
    }

    const fn default_near() -> f32 {
        0.1
    }

    const fn default_far() -> f32 {
        100.0
    }

    const fn default_position() -> [f32; 3] {
        [1.0, 1.0, 2.0]
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: Self::default_fov(),
            near: Self::default_near(),
            far: Self::default_far(),
            position: Self::default_position(),
            target: [0.0; 3],
        }
    }
}

impl OrbitConfig {
    const fn default_damping() -> f32 {
        0.05
    }

    const fn default_rotate_speed() -> f32 {
        0.005
    }

    const fn default_zoom_speed() -> f32 {
        0.1
    }

    const fn default_pan_speed() -> f32 {
        0.002
    }

    const fn default_min_radius() -> f32 {
        0.5
    }

    const fn default_max_radius() -> f32 {
        100.0
    }
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            damping: Self::default_damping(),
            rotate_speed: Self::default_rotate_speed(),
            zoom_speed: Self::default_zoom_speed(),
            pan_speed: Self::default_pan_speed(),
            min_radius: Self::default_min_radius(),
            max_radius: Self::default_max_radius(),
            auto_rotate: None,
        }
    }
}

impl PanelConfig {
    fn default_title() -> String {
        "Debug".to_string()
    }

    const fn default_width() -> f32 {
        320.0
    }

    const fn default_visible() -> bool {
        true
    }

    const fn default_font_size() -> f32 {
        18.0
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            title: Self::default_title(),
            width: Self::default_width(),
            visible: Self::default_visible(),
            font_size: Self::default_font_size(),
        }
    }
}

impl AssetConfig {
    fn default_root() -> PathBuf {
        PathBuf::from("assets")
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
            loader_threads: None,
        }
    }
}

impl RuntimeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(cfg)
    }

    /// Rejects values the runtime cannot honour
    pub fn validate(&self) -> Result<()> {
        let orbit = &self.orbit;
        ensure!(
            orbit.min_radius.is_finite() && orbit.min_radius >= 0.0,
            "orbit.min_radius must be a non-negative number, got {}",
            orbit.min_radius
        );
        ensure!(
            orbit.max_radius >= orbit.min_radius,
            "orbit.max_radius ({}) is below orbit.min_radius ({})",
            orbit.max_radius,
            orbit.min_radius
        );
        ensure!(
            (0.0..=1.0).contains(&orbit.damping),
            "orbit.damping must lie in [0, 1], got {}",
            orbit.damping
        );
        ensure!(
            self.window.max_pixel_ratio.is_finite() && self.window.max_pixel_ratio > 0.0,
            "window.max_pixel_ratio must be positive, got {}",
            self.window.max_pixel_ratio
        );
        ensure!(
            self.camera.near > 0.0 && self.camera.far > self.camera.near,
            "camera planes must satisfy 0 < near < far, got near {} far {}",
            self.camera.near,
            self.camera.far
        );
        Ok(())
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("Config load error: {err:#}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    /// Camera and orbit controls as configured, at the window's aspect ratio
    pub fn build_camera(&self) -> CameraManager {
        let viewport = Viewport::new(self.window.width, self.window.height, 1.0);
        let camera =
            PerspectiveCamera::for_viewport(self.camera.fov, &viewport, self.camera.near, self.camera.far);

        let [x, y, z] = self.camera.position;
        let [tx, ty, tz] = self.camera.target;
        let state = OrbitState::from_eye(Point3::new(x, y, z), Point3::new(tx, ty, tz));

        let mut controller = OrbitController::new(state, self.orbit.damping);
        controller.rotate_speed = self.orbit.rotate_speed;
        controller.zoom_speed = self.orbit.zoom_speed;
        controller.pan_speed = self.orbit.pan_speed;
        controller.auto_rotate = self.orbit.auto_rotate;
        controller.set_bounds(OrbitBounds {
            min_radius: self.orbit.min_radius,
            max_radius: self.orbit.max_radius,
            ..OrbitBounds::default()
        });

        CameraManager::new(camera, controller)
    }
}
