use crate::error::Result;
use crate::service::OneConf;
use crate::store::UpdateOutcome;
use crate::ui as output;
use serde_json::json;

pub fn run(oneconf: &OneConf, json: bool) -> Result<()> {
    let outcome = oneconf.update()?;
    if json {
        return super::print_json(&json!({
            "changed": outcome.is_changed(),
            "etag": outcome.etag(),
        }));
    }
    match outcome {
        UpdateOutcome::Changed(etag) => output::success(&format!("Inventory updated ({})", etag)),
        UpdateOutcome::Unchanged(_) => output::info("Inventory already up to date"),
    }
    Ok(())
}
