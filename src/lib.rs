pub mod audio;
pub mod config;
pub mod display;
pub mod emulator;
pub mod firmware;
pub mod joypad;
pub mod machine;
pub mod scheduler;
pub mod snapshot;
pub mod video;

#[cfg(test)]
mod testing;

pub use emulator::Arduous;

pub const SCREEN_WIDTH: usize = 128;
pub const SCREEN_HEIGHT: usize = 64;

/// VRAM is organised in pages of 8 pixel rows.
pub const VRAM_PAGES: usize = SCREEN_HEIGHT / 8;
pub const VRAM_COLUMNS: usize = SCREEN_WIDTH;
