pub mod credentials;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod recorder;
pub mod registry;
pub mod step;
