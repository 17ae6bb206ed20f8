//! CLI command implementations

pub mod delete;
pub mod deploy;

pub use delete::delete;
pub use deploy::{deploy, DeployArgs};
