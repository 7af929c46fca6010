pub mod api;
pub mod associations;
pub mod core;
pub mod models;
pub mod pipeline;
pub mod shell;
pub mod stores;
pub mod utils;
