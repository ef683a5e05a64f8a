//! Package graph: modules → packages → files plus the dependency DAG.

use rustc_hash::{FxHashMap, FxHashSet};

/// Watched-file event kinds, as delivered by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeType {
    /// A file appeared on disk.
    Created,
    /// A file changed on disk (no-op: the editor buffer is authoritative).
    Changed,
    /// A file disappeared from disk.
    Deleted,
}

/// One compilation unit.
#[derive(Debug, Clone, Default)]
pub struct Package {
    /// Dotted package name (`demo.core`).
    pub name: String,
    /// Owning module (the first name segment).
    pub module: String,
    /// Absolute paths of member files, kept sorted for stable digests.
    pub files: Vec<String>,
    /// Names of project packages this one imports.
    pub deps: Vec<String>,
}

/// The project's package table and dependency DAG.
#[derive(Debug, Default)]
pub struct PackageGraph {
    packages: FxHashMap<String, Package>,
}

impl PackageGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow a package.
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    /// All package names.
    pub fn package_names(&self) -> Vec<String> {
        self.packages.keys().cloned().collect()
    }

    /// Add `file` to `package`, creating the package on first sight.
    pub fn add_file(&mut self, package: &str, file: &str) {
        let entry = self.packages.entry(package.to_string()).or_insert_with(|| Package {
            name: package.to_string(),
            module: package.split('.').next().unwrap_or(package).to_string(),
            ..Package::default()
        });
        if !entry.files.iter().any(|f| f == file) {
            entry.files.push(file.to_string());
            entry.files.sort();
        }
    }

    /// Remove `file`; empty packages are dropped. Returns the owning
    /// package name, if the file was tracked.
    pub fn remove_file(&mut self, file: &str) -> Option<String> {
        let owner = self
            .packages
            .values()
            .find(|p| p.files.iter().any(|f| f == file))?
            .name
            .clone();
        if let Some(pkg) = self.packages.get_mut(&owner) {
            pkg.files.retain(|f| f != file);
            if pkg.files.is_empty() {
                self.packages.remove(&owner);
            }
        }
        Some(owner)
    }

    /// The package owning `file`.
    pub fn package_of(&self, file: &str) -> Option<&Package> {
        self.packages.values().find(|p| p.files.iter().any(|f| f == file))
    }

    /// Replace `package`'s dependency list, keeping only project-local
    /// packages.
    pub fn set_deps(&mut self, package: &str, deps: Vec<String>) {
        let known: FxHashSet<String> = self.packages.keys().cloned().collect();
        if let Some(pkg) = self.packages.get_mut(package) {
            let mut deps: Vec<String> = deps
                .into_iter()
                .filter(|d| d != package && known.contains(d))
                .collect();
            deps.sort();
            deps.dedup();
            pkg.deps = deps;
        }
    }

    /// Topological order, dependencies first. On a cycle the members are
    /// returned as the error so the rebuild can report them.
    pub fn topo_order(&self) -> Result<Vec<String>, Vec<String>> {
        let mut in_degree: FxHashMap<&str, usize> =
            self.packages.keys().map(|k| (k.as_str(), 0)).collect();
        for pkg in self.packages.values() {
            for _dep in pkg.deps.iter().filter(|d| self.packages.contains_key(*d)) {
                *in_degree.entry(pkg.name.as_str()).or_insert(0) += 1;
            }
        }
        let mut ready: Vec<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(k, _)| *k)
            .collect();
        ready.sort_unstable();
        let mut order = Vec::with_capacity(self.packages.len());
        while let Some(next) = ready.pop() {
            order.push(next.to_string());
            // Releasing `next` unblocks its dependents.
            let mut unblocked: Vec<&str> = Vec::new();
            for pkg in self.packages.values() {
                if pkg.deps.iter().any(|d| d == next) {
                    let d = in_degree.entry(pkg.name.as_str()).or_insert(0);
                    *d = d.saturating_sub(1);
                    if *d == 0 {
                        unblocked.push(pkg.name.as_str());
                    }
                }
            }
            unblocked.sort_unstable();
            ready.extend(unblocked);
        }
        if order.len() == self.packages.len() {
            Ok(order)
        } else {
            let done: FxHashSet<&str> = order.iter().map(String::as_str).collect();
            let mut cycle: Vec<String> = self
                .packages
                .keys()
                .filter(|k| !done.contains(k.as_str()))
                .cloned()
                .collect();
            cycle.sort();
            Err(cycle)
        }
    }

    /// `package` plus every transitive dependent, in an order where
    /// dependencies precede dependents.
    pub fn affected_by(&self, package: &str) -> Vec<String> {
        let mut affected = FxHashSet::default();
        affected.insert(package.to_string());
        // Fixpoint over reverse edges.
        loop {
            let mut grew = false;
            for pkg in self.packages.values() {
                if affected.contains(&pkg.name) {
                    continue;
                }
                if pkg.deps.iter().any(|d| affected.contains(d)) {
                    affected.insert(pkg.name.clone());
                    grew = true;
                }
            }
            if !grew {
                break;
            }
        }
        match self.topo_order() {
            Ok(order) => order.into_iter().filter(|p| affected.contains(p)).collect(),
            Err(_) => {
                let mut v: Vec<String> = affected.into_iter().collect();
                v.sort();
                v
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cangjie_testkit::{must, must_err, must_some};
    use pretty_assertions::assert_eq;

    fn graph() -> PackageGraph {
        let mut g = PackageGraph::new();
        g.add_file("demo.core", "/p/core/a.cj");
        g.add_file("demo.util", "/p/util/u.cj");
        g.add_file("demo.app", "/p/app/m.cj");
        g.set_deps("demo.util", vec!["demo.core".to_string()]);
        g.set_deps("demo.app", vec!["demo.util".to_string()]);
        g
    }

    #[test]
    fn topo_puts_dependencies_first() {
        let order = must(graph().topo_order());
        let pos = |n: &str| order.iter().position(|p| p == n);
        assert!(pos("demo.core") < pos("demo.util"));
        assert!(pos("demo.util") < pos("demo.app"));
    }

    #[test]
    fn cycle_is_reported_with_members() {
        let mut g = graph();
        g.set_deps("demo.core", vec!["demo.app".to_string()]);
        let cycle = must_err(g.topo_order());
        assert!(cycle.contains(&"demo.core".to_string()));
        assert!(cycle.contains(&"demo.app".to_string()));
    }

    #[test]
    fn affected_propagates_transitively() {
        let g = graph();
        let affected = g.affected_by("demo.core");
        assert_eq!(affected, vec!["demo.core", "demo.util", "demo.app"]);
        assert_eq!(g.affected_by("demo.app"), vec!["demo.app"]);
    }

    #[test]
    fn remove_last_file_drops_package() {
        let mut g = graph();
        assert_eq!(g.remove_file("/p/util/u.cj"), Some("demo.util".to_string()));
        assert!(g.package("demo.util").is_none());
    }

    #[test]
    fn deps_ignore_unknown_and_self() {
        let mut g = graph();
        g.set_deps(
            "demo.core",
            vec!["std.io".to_string(), "demo.core".to_string(), "demo.util".to_string()],
        );
        let core = must_some(g.package("demo.core"));
        assert_eq!(core.deps, vec!["demo.util".to_string()]);
    }
}
