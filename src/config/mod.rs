pub mod settings;

pub use settings::{EnvOverrides, Settings};
