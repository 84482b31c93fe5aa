use crate::error::Result;
use crate::service::{NEVER_SYNCED, OneConf};
use crate::ui as output;
use chrono::{DateTime, Local};
use serde_json::json;

pub fn run(oneconf: &OneConf, json: bool) -> Result<()> {
    let date = oneconf.get_last_sync_date()?;
    if json {
        return super::print_json(&json!({ "last_sync": date }));
    }
    if date == NEVER_SYNCED {
        output::line(NEVER_SYNCED);
        return Ok(());
    }
    match human_date(&date) {
        Some(human) => output::line(&format!("{} ({})", human, date)),
        None => output::line(&date),
    }
    Ok(())
}

/// Local time for a `%.2f` unix timestamp.
fn human_date(timestamp: &str) -> Option<String> {
    let secs: f64 = timestamp.parse().ok()?;
    let whole = secs.trunc() as i64;
    let nanos = (secs.fract() * 1e9) as u32;
    let utc = DateTime::from_timestamp(whole, nanos)?;
    Some(utc.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
}
