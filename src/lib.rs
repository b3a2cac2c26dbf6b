pub mod config;
pub mod error;
pub mod events;
pub mod wall;
pub mod tasks {
    pub mod feed;
    pub mod library;
    pub mod loader;
    pub mod viewer;
}
