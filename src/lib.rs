//! Book Outlet application library
//!
//! The catalog modules, their admin surface and the bootstrap that wires them
//! into the outlet module registry.

pub mod app;
pub mod modules;
pub mod utils;

pub use app::App;
