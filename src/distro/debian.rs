use super::DistroPolicy;
use crate::error::Result;

pub(super) fn policy() -> Result<DistroPolicy> {
    DistroPolicy::builder("debian")
        .meta_packages(&[
            "task-desktop",
            "task-gnome-desktop",
            "task-kde-desktop",
            "task-xfce-desktop",
            "task-lxde-desktop",
            "task-lxqt-desktop",
            "task-cinnamon-desktop",
            "task-mate-desktop",
            "task-laptop",
            "task-english",
            "task-ssh-server",
        ])
        .recommends_as_dep(true)
        .blacklist(r"^.*-dev")
        .build()
}
