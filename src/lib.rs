#[macro_use]
extern crate lazy_static;

pub mod app;
pub mod config;
pub mod item;
pub mod pass_cli;
pub mod process;
pub mod prompt;
pub mod screen;
pub mod search;
pub mod terminal;
