// Library root: re-exports all modules so integration tests can `use emoviz::*`.

pub mod action;
pub mod app;
pub mod components;
pub mod config;
pub mod data;
pub mod logging;
pub mod player;
pub mod theme;
pub mod tui;
pub mod ui;
pub mod viz;
