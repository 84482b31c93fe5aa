pub mod args;
pub mod context;
pub mod dispatcher;

pub use args::{Cli, Command, GlobalFlags, HostSelector};
pub use context::RuntimeContext;
