pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod model;
pub mod monitor;
pub mod service;
pub mod shutdown;
pub mod store;
