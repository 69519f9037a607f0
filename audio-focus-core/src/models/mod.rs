pub mod config;
pub mod error;
pub mod interrupt;
pub mod state;
pub mod stream_info;
