//! Config Loader (§4.G / §6): reads the INI config file into a typed
//! [`lemon_core::State`]. No other crate in the workspace parses INI.

mod error;
mod load;
mod paths;

pub use error::ConfigError;
pub use load::{load, load_from_path};
pub use paths::resolve_config_path;
