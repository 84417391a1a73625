//! Registry of known resource kinds.
//!
//! Built once at startup and handed by reference to whatever needs to
//! interpret user-typed kinds. Lookups are case-insensitive and accept the
//! kind name, its plural, or any registered short name.

use std::collections::HashMap;

use rewind_types::ResourceFilter;

/// Static facts about one resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindDescriptor {
    /// Canonical kind name as recorded on resources (e.g. `Pod`).
    pub kind: String,
    /// Alternative names accepted on input (e.g. `po`).
    pub short_names: Vec<String>,
    /// Whether objects of this kind live in a namespace.
    pub namespaced: bool,
}

impl KindDescriptor {
    /// Describes a namespaced kind.
    pub fn namespaced(kind: &str, short_names: &[&str]) -> Self {
        Self::new(kind, short_names, true)
    }

    /// Describes a cluster-scoped kind.
    pub fn cluster_scoped(kind: &str, short_names: &[&str]) -> Self {
        Self::new(kind, short_names, false)
    }

    fn new(kind: &str, short_names: &[&str], namespaced: bool) -> Self {
        Self {
            kind: kind.to_string(),
            short_names: short_names.iter().map(|s| (*s).to_string()).collect(),
            namespaced,
        }
    }
}

/// Kind lookup table.
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    kinds: Vec<KindDescriptor>,
    /// Lowercased alias → index into `kinds`.
    aliases: HashMap<String, usize>,
}

impl KindRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry preloaded with the core workload kinds.
    pub fn with_builtin_kinds() -> Self {
        let mut registry = Self::new();
        for descriptor in [
            KindDescriptor::namespaced("Pod", &["po"]),
            KindDescriptor::namespaced("Deployment", &["deploy"]),
            KindDescriptor::namespaced("ReplicaSet", &["rs"]),
            KindDescriptor::namespaced("StatefulSet", &["sts"]),
            KindDescriptor::namespaced("DaemonSet", &["ds"]),
            KindDescriptor::namespaced("Job", &[]),
            KindDescriptor::namespaced("CronJob", &["cj"]),
            KindDescriptor::namespaced("Service", &["svc"]),
            KindDescriptor::namespaced("ConfigMap", &["cm"]),
            KindDescriptor::namespaced("Secret", &[]),
            KindDescriptor::namespaced("Ingress", &["ing"]),
            KindDescriptor::namespaced("PersistentVolumeClaim", &["pvc"]),
            KindDescriptor::cluster_scoped("Node", &["no"]),
            KindDescriptor::cluster_scoped("Namespace", &["ns"]),
            KindDescriptor::cluster_scoped("PersistentVolume", &["pv"]),
        ] {
            registry.register(descriptor);
        }
        registry
    }

    /// Adds or replaces a kind. Aliases of a replaced kind are reassigned.
    pub fn register(&mut self, descriptor: KindDescriptor) {
        let index = match self.position(&descriptor.kind) {
            Some(i) if self.kinds[i].kind.eq_ignore_ascii_case(&descriptor.kind) => {
                self.aliases.retain(|_, owner| *owner != i);
                self.kinds[i] = descriptor;
                i
            },
            _ => {
                self.kinds.push(descriptor);
                self.kinds.len() - 1
            },
        };

        let descriptor = &self.kinds[index];
        let kind = descriptor.kind.to_ascii_lowercase();
        let mut names = vec![format!("{kind}s"), kind];
        names.extend(descriptor.short_names.iter().map(|s| s.to_ascii_lowercase()));
        for name in names {
            self.aliases.insert(name, index);
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.aliases.get(&name.to_ascii_lowercase()).copied()
    }

    /// Resolves a kind name, plural, or short name.
    pub fn resolve(&self, name: &str) -> Option<&KindDescriptor> {
        self.position(name).map(|i| &self.kinds[i])
    }

    /// Registered kinds in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = &KindDescriptor> {
        self.kinds.iter()
    }

    /// Builds a query filter from user input.
    ///
    /// A known alias is replaced by its canonical kind; an unknown kind is
    /// used verbatim. The namespace filter is dropped for cluster-scoped
    /// kinds, which never carry one.
    pub fn filter(&self, kind: Option<&str>, namespace: Option<&str>) -> ResourceFilter {
        let descriptor = kind.and_then(|k| self.resolve(k));
        let mut filter = ResourceFilter::all();
        if let Some(kind) = kind {
            filter = filter.kind(descriptor.map_or(kind, |d| d.kind.as_str()));
        }
        if let Some(namespace) = namespace
            && descriptor.is_none_or(|d| d.namespaced)
        {
            filter = filter.namespace(namespace);
        }
        filter
    }
}
