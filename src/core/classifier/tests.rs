use super::*;
use crate::core::checksum::checksum_of;
use crate::core::types::Priority;

fn names(selection: &Selection) -> Vec<&str> {
    selection.iter().map(String::as_str).collect()
}

fn generic() -> DistroPolicy {
    DistroPolicy::for_key("generic").expect("generic policy")
}

fn ubuntu() -> DistroPolicy {
    DistroPolicy::for_key("ubuntu").expect("ubuntu policy")
}

#[test]
fn manual_packages_without_meta_package_are_selected() {
    let installed = vec![
        InstalledPackage::new("foo"),
        InstalledPackage::new("bar").auto(),
        InstalledPackage::new("baz"),
    ];

    let policy = generic();
    let classifier = Classifier::new(&policy);
    let list = classifier.classify(&installed);

    assert_eq!(list.len(), 3);
    assert_eq!(list["bar"], PackageEntry::automatic());
    assert_eq!(names(&classifier.selection(&installed)), vec!["baz", "foo"]);
}

#[test]
fn default_closure_follows_depends_and_recommends() {
    let installed = vec![
        InstalledPackage::new("ubuntu-desktop")
            .depends_on(&["gnome-shell"])
            .recommends(&["firefox"]),
        InstalledPackage::new("gnome-shell").auto().depends_on(&["mutter"]),
        InstalledPackage::new("mutter").auto(),
        InstalledPackage::new("firefox"),
        InstalledPackage::new("gimp"),
    ];

    let policy = ubuntu();
    let selection = Classifier::new(&policy).selection(&installed);

    assert_eq!(names(&selection), vec!["gimp"]);
}

#[test]
fn recommends_are_ignored_when_policy_says_so() {
    let policy = DistroPolicy::builder("test")
        .meta_packages(&["desktop"])
        .recommends_as_dep(false)
        .build()
        .expect("policy");
    let installed = vec![
        InstalledPackage::new("desktop").recommends(&["firefox"]),
        InstalledPackage::new("firefox"),
    ];

    let selection = Classifier::new(&policy).selection(&installed);
    assert_eq!(names(&selection), vec!["firefox"]);
}

#[test]
fn dependency_cycles_terminate() {
    let policy = DistroPolicy::builder("test")
        .meta_packages(&["meta"])
        .build()
        .expect("policy");
    let installed = vec![
        InstalledPackage::new("meta").depends_on(&["a"]),
        InstalledPackage::new("a").depends_on(&["b"]),
        InstalledPackage::new("b").depends_on(&["a", "meta"]),
        InstalledPackage::new("c"),
    ];

    let selection = Classifier::new(&policy).selection(&installed);
    assert_eq!(names(&selection), vec!["c"]);
}

#[test]
fn false_defaults_stay_selectable() {
    let installed = vec![
        InstalledPackage {
            depends: vec![vec!["p7zip-full".into(), "xz-utils".into()]],
            ..InstalledPackage::new("ubuntu-standard")
        },
        InstalledPackage::new("p7zip-full"),
    ];

    let policy = ubuntu();
    let selection = Classifier::new(&policy).selection(&installed);
    assert_eq!(names(&selection), vec!["p7zip-full"]);
}

#[test]
fn unresolvable_names_are_skipped() {
    let installed = vec![
        InstalledPackage::new("ubuntu-minimal").depends_on(&["ghost-package", "apt"]),
        InstalledPackage::new("apt"),
        InstalledPackage::new("vlc"),
    ];

    let policy = ubuntu();
    let selection = Classifier::new(&policy).selection(&installed);
    assert_eq!(names(&selection), vec!["vlc"]);
}

#[test]
fn essential_and_blacklisted_packages_are_excluded() {
    let installed = vec![
        InstalledPackage::new("libc6").with_priority(Priority::Required),
        InstalledPackage::new("apt").with_priority(Priority::Important),
        InstalledPackage::new("libssl-dev"),
        InstalledPackage::new("htop").with_priority(Priority::Standard),
    ];

    let policy = ubuntu();
    let list = Classifier::new(&policy).classify(&installed);
    assert_eq!(list.keys().map(String::as_str).collect::<Vec<_>>(), vec!["htop"]);
}

#[test]
fn additional_packages_count_even_when_auto_installed() {
    let installed = vec![
        InstalledPackage::new("ubuntu-desktop").depends_on(&["gstreamer0.10-fluendo-mpegdemux"]),
        InstalledPackage::new("gstreamer0.10-fluendo-mpegdemux").auto(),
        InstalledPackage::new("ubuntu-restricted-extras")
            .auto()
            .depends_on(&["ttf-mscorefonts-installer"]),
        InstalledPackage::new("ttf-mscorefonts-installer")
            .auto()
            .depends_on(&["cabextract"]),
        InstalledPackage::new("cabextract").auto(),
    ];

    let policy = ubuntu();
    let selection = Classifier::new(&policy).selection(&installed);

    // Root deps are expanded one level only.
    assert_eq!(
        names(&selection),
        vec![
            "gstreamer0.10-fluendo-mpegdemux",
            "ttf-mscorefonts-installer",
            "ubuntu-restricted-extras",
        ]
    );
}

#[test]
fn removed_packages_are_not_classified() {
    let installed = vec![
        InstalledPackage::new("foo"),
        InstalledPackage {
            installed: false,
            ..InstalledPackage::new("gone")
        },
    ];

    let policy = generic();
    let list = Classifier::new(&policy).classify(&installed);
    assert!(list.contains_key("foo"));
    assert!(!list.contains_key("gone"));
}

#[test]
fn classification_is_deterministic() {
    let installed = vec![
        InstalledPackage::new("ubuntu-desktop").depends_on(&["nautilus"]),
        InstalledPackage::new("nautilus").auto(),
        InstalledPackage::new("vim"),
        InstalledPackage::new("gimp"),
        InstalledPackage::new("libgimp").auto(),
    ];

    let policy = ubuntu();
    let first = classify(&installed, &policy);
    let mut reversed = installed.clone();
    reversed.reverse();
    let second = classify(&reversed, &policy);

    assert_eq!(first, second);
    assert_eq!(checksum_of(&first).unwrap(), checksum_of(&second).unwrap());
}
