//! API layer for flowsmith-daemon

pub mod rest;

pub use rest::router::create_router;
