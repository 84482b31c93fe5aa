//! Settings Command
//!
//! Show the effective settings after environment and flag overrides.

use crate::cli::RuntimeContext;
use crate::error::Result;
use crate::project_identity;
use crate::ui as output;
use crate::utils::paths;
use std::collections::BTreeMap;

pub fn run(ctx: &RuntimeContext, json: bool) -> Result<()> {
    let mut entries = ctx.settings.entries();
    entries.retain(|(key, _)| *key != "cache-dir");
    entries.insert(0, ("cache-dir", ctx.cache_root.display().to_string()));

    if json {
        let map: BTreeMap<_, _> = entries.into_iter().collect();
        return super::print_json(&map);
    }

    output::header(&format!("{} settings", project_identity::DISPLAY_NAME));
    for (key, value) in &entries {
        if value.is_empty() {
            output::keyval(key, "(unset)");
        } else {
            output::keyval(key, value);
        }
    }
    if let Ok(path) = paths::settings_file() {
        println!();
        output::info(&format!("Settings file: {}", path.display()));
    }
    Ok(())
}
