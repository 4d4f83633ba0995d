use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub exercise: ExerciseSelection,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    /// カメラデバイス番号
    #[serde(default)]
    pub index: i32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_camera_fps")]
    pub fps: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// MoveNet ONNXモデルのパス
    #[serde(default = "default_model_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// 処理ループの目標レート
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExerciseSelection {
    /// 起動時の種目ID
    #[serde(default = "default_exercise")]
    pub default: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

/// 表示専用の設定。検出側は `geometry::MIN_CONFIDENCE` で固定
#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    /// 骨格を描くキーポイントの最低信頼度
    #[serde(default = "default_skeleton_min_confidence")]
    pub skeleton_min_confidence: f32,
}

fn default_width() -> u32 { 640 }
fn default_height() -> u32 { 480 }
fn default_camera_fps() -> u32 { 30 }
fn default_model_path() -> String { "models/movenet_singlepose_lightning.onnx".to_string() }
fn default_skeleton_min_confidence() -> f32 { crate::geometry::MIN_CONFIDENCE }
fn default_target_fps() -> u32 { 30 }
fn default_exercise() -> String { crate::exercise::pushup::ID.to_string() }
fn default_listen_addr() -> String { "127.0.0.1:9100".to_string() }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: default_width(),
            height: default_height(),
            fps: default_camera_fps(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { path: default_model_path() }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { target_fps: default_target_fps() }
    }
}

impl Default for ExerciseSelection {
    fn default() -> Self {
        Self { default: default_exercise() }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { skeleton_min_confidence: default_skeleton_min_confidence() }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { listen_addr: default_listen_addr() }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// 読めなければ警告を出してデフォルト設定で続行
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{:#}; using default config", e);
                Self::default()
            }
        }
    }
}
