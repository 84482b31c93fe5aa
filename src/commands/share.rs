use crate::error::Result;
use crate::service::OneConf;
use crate::ui as output;

pub fn run(oneconf: &OneConf, share: bool, hostid: Option<&str>) -> Result<()> {
    oneconf.set_share_inventory(share, hostid)?;

    let target = match hostid.filter(|id| !id.is_empty()) {
        Some(id) => format!("{} ({})", oneconf.gethostname_by_id(id)?, id),
        None => "this host".to_string(),
    };
    if share {
        output::success(&format!("Inventory of {} is shared", target));
    } else {
        output::success(&format!(
            "Inventory of {} is no longer shared; the catalog is updated on the next sync",
            target
        ));
    }
    Ok(())
}
