pub mod actor;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod director;
pub mod error;
pub mod factory;
pub mod host;
pub mod intervention;
pub mod params;
pub mod saver;
pub mod scenario;
pub mod tick;

pub use director::{run_headless, Director, DirectorReport};
pub use error::{Result, SceneError};
pub use scenario::{SceneKind, Scenario};
