#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod assemble;
pub mod avatar;
pub mod config;
pub mod feed;
pub mod loader;
pub mod manifest;
pub mod media;
pub mod mentions;
pub mod model;
pub mod refresh;
pub mod scan;
pub mod source;
pub mod view;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
