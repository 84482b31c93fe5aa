//! Names the binary, its directories and its environment variables go by.

pub const DISPLAY_NAME: &str = "OneConf";
pub const BINARY_NAME: &str = "oneconf";
pub const CONFIG_DIR_NAME: &str = "oneconf";
pub const ENV_PREFIX: &str = "ONECONF";
pub const SETTINGS_FILE_BASENAME: &str = "settings.kdl";

/// Environment variable carrying the tracing filter for the binary.
pub const LOG_ENV: &str = "ONECONF_LOG";

pub fn env_key(suffix: &str) -> String {
    format!("{}_{}", ENV_PREFIX, suffix)
}

pub fn cli_with(args: &str) -> String {
    format!("{} {}", BINARY_NAME, args)
}
