pub mod board;
pub mod config;
pub mod error;
pub mod events;
pub mod feed;
pub mod render;
pub mod service;
pub mod slot;
pub mod tasks {
    pub mod blink;
    pub mod fetch;
    pub mod frame;
    pub mod schedule;
}
