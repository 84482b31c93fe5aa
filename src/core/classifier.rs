//! Package classification.
//!
//! Turns raw package-manager facts into the host inventory: every installed
//! package that did not come with the system, tagged with its auto flag. The
//! manual subset of the inventory is the host's selection.

use crate::core::types::{InstalledPackage, PackageEntry, PackageList, Selection, selection_of};
use crate::distro::DistroPolicy;
use std::collections::{BTreeSet, HashMap};

type Index<'a> = HashMap<&'a str, &'a InstalledPackage>;

pub struct Classifier<'a> {
    policy: &'a DistroPolicy,
}

impl<'a> Classifier<'a> {
    pub fn new(policy: &'a DistroPolicy) -> Self {
        Self { policy }
    }

    pub fn classify(&self, packages: &[InstalledPackage]) -> PackageList {
        let index: Index<'_> = packages
            .iter()
            .filter(|pkg| pkg.installed)
            .map(|pkg| (pkg.name.as_str(), pkg))
            .collect();

        let mut defaults = self.default_closure(&index);
        for name in &self.policy.false_defaults {
            defaults.remove(name);
        }
        let additional = self.additional_set(&index);

        let mut list = PackageList::new();
        for pkg in index.values() {
            let is_additional = additional.contains(pkg.name.as_str());
            let relevant = !pkg.priority.is_essential()
                && !self.policy.is_blacklisted(&pkg.name)
                && !defaults.contains(pkg.name.as_str());

            if is_additional {
                list.insert(pkg.name.clone(), PackageEntry::manual());
            } else if relevant {
                list.insert(
                    pkg.name.clone(),
                    PackageEntry {
                        auto: pkg.auto_installed,
                    },
                );
            }
        }

        tracing::debug!(
            "Classified {} installed packages: {} in inventory, {} defaults",
            index.len(),
            list.len(),
            defaults.len()
        );
        list
    }

    pub fn selection(&self, packages: &[InstalledPackage]) -> Selection {
        selection_of(&self.classify(packages))
    }

    /// Everything reachable from the installed meta-packages.
    fn default_closure(&self, index: &Index<'_>) -> BTreeSet<String> {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<&str> = self
            .policy
            .meta_packages
            .iter()
            .map(String::as_str)
            .filter(|name| index.contains_key(name))
            .collect();

        while let Some(name) = stack.pop() {
            if !visited.insert(name.to_string()) {
                continue;
            }
            // Names the package manager cannot resolve are skipped.
            let Some(pkg) = index.get(name) else {
                continue;
            };
            for dep in self.direct_dependencies(pkg, index) {
                if !visited.contains(dep) {
                    stack.push(dep);
                }
            }
        }

        visited
    }

    /// Additional packages plus the direct dependencies of their roots.
    fn additional_set(&self, index: &Index<'_>) -> BTreeSet<String> {
        let mut set: BTreeSet<String> = self
            .policy
            .additional_packages
            .iter()
            .filter(|name| index.contains_key(name.as_str()))
            .cloned()
            .collect();

        for root in &self.policy.additional_roots {
            if let Some(pkg) = index.get(root.as_str()) {
                set.extend(
                    self.direct_dependencies(pkg, index)
                        .filter(|dep| index.contains_key(dep))
                        .map(str::to_string),
                );
            }
        }
        set
    }

    fn direct_dependencies<'p>(
        &self,
        pkg: &'p InstalledPackage,
        index: &'p Index<'_>,
    ) -> impl Iterator<Item = &'p str> {
        let recommends: &'p [Vec<String>] = if self.policy.recommends_as_dep {
            &pkg.recommends
        } else {
            &[]
        };
        pkg.depends
            .iter()
            .chain(recommends.iter())
            .filter_map(move |group| resolve_alternative(group, index))
    }
}

/// Pick the alternative that satisfies an "a | b" group: the first installed
/// one, else the first listed.
fn resolve_alternative<'g>(group: &'g [String], index: &Index<'_>) -> Option<&'g str> {
    group
        .iter()
        .find(|name| index.contains_key(name.as_str()))
        .or_else(|| group.first())
        .map(String::as_str)
}

/// Convenience wrapper for one-shot classification.
pub fn classify(packages: &[InstalledPackage], policy: &DistroPolicy) -> PackageList {
    Classifier::new(policy).classify(packages)
}

#[cfg(test)]
mod tests;
