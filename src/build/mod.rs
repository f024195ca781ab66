//! Build pipeline module for assetline
//!
//! Plans the enabled asset tasks and runs them as one parallel group.
//!
//! # Overview
//!
//! The build pipeline consists of:
//! - **Discovery**: Find source files using glob patterns from config
//! - **Planning**: One task definition per enabled task, with its source
//!   sets, watch globs and destination
//! - **Execution**: Run the tasks in parallel and join their results
//!
//! # Example
//!
//! ```ignore
//! use assetline::build::{BuildContext, BuildPipeline};
//! use assetline::config::load_config;
//!
//! let config = load_config(None)?;
//! let context = BuildContext::new(config, project_root);
//! let pipeline = BuildPipeline::new(context);
//!
//! let result = pipeline.build()?;
//! println!("{}", result.summary());
//! ```

pub mod context;
pub mod discovery;
pub mod parallel;
pub mod pipeline;
pub mod progress;
pub mod result;
pub mod task;

pub use context::*;
pub use discovery::*;
pub use parallel::*;
pub use pipeline::*;
pub use result::*;
pub use task::*;
