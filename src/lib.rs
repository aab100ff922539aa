//! Book catalogue service: the application modules and the
//! [`Application`] that wires them onto the bookshelf framework crates.

pub mod app;
pub mod modules;

pub use app::Application;
