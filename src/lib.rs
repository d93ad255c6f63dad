#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod config;
pub mod data;
pub mod field;
pub mod format;
pub mod modal;
pub mod mutation;
pub mod notify;
pub mod story;
pub mod theme;
pub mod tuys;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
