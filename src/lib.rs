pub mod app;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod messages;
pub mod pagination;
pub mod render;
pub mod storage;
pub mod tracker;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use error::{GalleryError, GalleryResult, ValidationError};
