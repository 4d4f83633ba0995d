pub mod camera;
pub mod config;
pub mod error;
pub mod exercise;
pub mod geometry;
pub mod logging;
pub mod pipeline;
pub mod pose;
pub mod protocol;
pub mod render;
pub mod tracker;
