pub mod app;
pub mod collectors;
pub mod config;
pub mod labels;
pub mod observability;
pub mod scheduler;
pub mod server;
pub mod updater;
pub mod upstream;
