pub mod app;
pub mod audio;
pub mod catalog;
pub mod config;
pub mod core;
pub mod feed;
pub mod gallery;
pub mod logging;
pub mod model;
pub mod playback;
pub mod schedule;
pub mod shuffle;
pub mod tour;
pub mod ui;
