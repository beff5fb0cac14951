pub mod carousel;
pub mod config;
pub mod content;
pub mod generator;
pub mod store;
pub mod tui;
