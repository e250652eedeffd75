pub mod cli_interface;
pub mod config;
mod fs;
pub mod image_cursor;
pub mod mkfs;
pub mod utils;
pub use fs::*;
