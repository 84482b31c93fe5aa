use super::DistroPolicy;
use crate::error::Result;

pub(super) fn policy() -> Result<DistroPolicy> {
    DistroPolicy::builder("ubuntu")
        .meta_packages(&[
            "ubuntu-minimal",
            "ubuntu-standard",
            "ubuntu-desktop",
            "ubuntu-netbook",
            "kubuntu-desktop",
            "xubuntu-desktop",
            "lubuntu-desktop",
            "mythbuntu-desktop",
        ])
        // Satisfy an "or" dependency without being the alternative Ubuntu ships.
        .false_defaults(&["p7zip-full", "vim-gnome", "vim"])
        // Codec bundles apt does not mark as manually installed.
        .additional_packages(&[
            "flashplugin-nonfree",
            "gnash",
            "gstreamer0.10-fluendo-mpegdemux",
            "swfdec-gnome",
            "swfdec-mozilla",
            "ubuntu-restricted-extras",
        ])
        .additional_roots(&["ubuntu-restricted-extras"])
        .recommends_as_dep(true)
        .blacklist(r"^.*-dev")
        .build()
}
