pub mod backbone;
pub mod color_utils;
pub mod config;
pub mod dataset;
pub mod inference;
pub mod keypoints;
pub mod metrics;
pub mod model;
pub mod preprocessing;
pub mod report;
pub mod runner;
pub mod visualization;
