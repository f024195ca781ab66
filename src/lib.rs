//! assetline - front-end asset pipeline
//!
//! This library provides functionality to:
//! - Render page templates, compile SCSS and minify scripts into an output tree
//! - Optimize images and merge SVG icons into a symbol sprite
//! - Run all of it as one parallel task group, once or on every change
//! - Serve the output with live reload during development

pub mod build;
pub mod cli;
pub mod config;
pub mod lint;
pub mod serve;
pub mod sourcemap;
pub mod svg;
pub mod tasks;
pub mod watch;
