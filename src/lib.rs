pub mod cli;
pub mod drag;
pub mod geometry;
pub mod input;
pub mod logging;
pub mod notification;
pub mod ordering;
pub mod settings;
pub mod store;
pub mod sync;
pub mod tui;
pub mod types;
