//! Static registry of supervisable services and the startup-time pruning
//! that decides which of them the supervisor will actually scan.
//!
//! The registry is fixed at build time and never mutated; pruning only
//! filters the returned set and deletes supervision directories for the
//! services (or log trees) that must not come up. The supervisor does a
//! plain directory scan, so physical removal is what disables a service.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::flags::FeatureFlags;

/// Name of the per-service log supervision subdirectory.
pub const LOG_SUBDIR: &str = "log";

/// One supervisable service in the container image.
#[derive(Debug)]
pub struct ServiceDescriptor {
    /// Unique service name, also its supervision directory name.
    pub name: &'static str,
    /// True for services that only matter when the routing data plane
    /// is enabled.
    pub networking_only: bool,
}

impl ServiceDescriptor {
    /// Supervision directory for this service under `service_root`.
    pub fn dir(&self, service_root: &Path) -> PathBuf {
        service_root.join(self.name)
    }

    /// Log supervision subdirectory for this service under `service_root`.
    pub fn log_dir(&self, service_root: &Path) -> PathBuf {
        self.dir(service_root).join(LOG_SUBDIR)
    }
}

/// The full service set baked into the image, in supervisor scan order.
pub const REGISTRY: &[ServiceDescriptor] = &[
    ServiceDescriptor {
        name: "bgpd",
        networking_only: true,
    },
    ServiceDescriptor {
        name: "bgpd6",
        networking_only: true,
    },
    ServiceDescriptor {
        name: "confd",
        networking_only: true,
    },
    ServiceDescriptor {
        name: "policyd",
        networking_only: false,
    },
];

/// The subset of the registry that survives under `flags`, declaration
/// order preserved. Pure, no filesystem effects.
pub fn selected(flags: FeatureFlags) -> Vec<&'static ServiceDescriptor> {
    REGISTRY
        .iter()
        .filter(|svc| flags.networking_enabled || !svc.networking_only)
        .collect()
}

/// Apply `flags` to the supervision tree under `service_root` and return
/// the surviving services.
///
/// With file logging disabled, every surviving service loses its `log`
/// subdirectory. With networking disabled, networking-only services lose
/// their entire supervision directory. Deleting an already-absent path is
/// a no-op, so running this twice leaves the same tree as running it once.
pub fn prune(
    flags: FeatureFlags,
    service_root: &Path,
) -> io::Result<Vec<&'static ServiceDescriptor>> {
    let survivors = selected(flags);

    if !flags.file_logging_enabled {
        info!("File logging disabled, removing service log directories");
        for svc in &survivors {
            remove_tree(&svc.log_dir(service_root))?;
        }
    }

    if !flags.networking_enabled {
        info!("Networking disabled, removing routing services from supervision");
        for svc in REGISTRY.iter().filter(|svc| svc.networking_only) {
            remove_tree(&svc.dir(service_root))?;
        }
    }

    Ok(survivors)
}

/// Recursively delete `path`, treating "already absent" as success.
fn remove_tree(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Already absent: {}", path.display());
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn flags(networking: bool, file_logging: bool) -> FeatureFlags {
        FeatureFlags {
            networking_enabled: networking,
            file_logging_enabled: file_logging,
        }
    }

    /// Lay out the full supervision tree the image ships with.
    fn seed_tree(root: &Path) {
        for svc in REGISTRY {
            std::fs::create_dir_all(svc.log_dir(root)).unwrap();
            std::fs::write(svc.dir(root).join("run"), "#!/bin/sh\n").unwrap();
        }
    }

    #[test]
    fn test_selected_all_when_networking_enabled() {
        let names: Vec<_> = selected(flags(true, true)).iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["bgpd", "bgpd6", "confd", "policyd"]);
    }

    #[test]
    fn test_selected_never_networking_only_when_disabled() {
        for file_logging in [true, false] {
            let survivors = selected(flags(false, file_logging));
            assert!(survivors.iter().all(|s| !s.networking_only));
            assert_eq!(survivors.len(), 1);
            assert_eq!(survivors[0].name, "policyd");
        }
    }

    #[test]
    fn test_prune_removes_log_dirs_keeps_services() {
        let tmp = tempdir().unwrap();
        seed_tree(tmp.path());

        let survivors = prune(flags(true, false), tmp.path()).unwrap();
        assert_eq!(survivors.len(), REGISTRY.len());

        for svc in REGISTRY {
            assert!(svc.dir(tmp.path()).exists(), "{} dir must remain", svc.name);
            assert!(svc.dir(tmp.path()).join("run").exists());
            assert!(
                !svc.log_dir(tmp.path()).exists(),
                "{} log dir must be gone",
                svc.name
            );
        }
    }

    #[test]
    fn test_prune_removes_networking_services_entirely() {
        let tmp = tempdir().unwrap();
        seed_tree(tmp.path());

        let survivors = prune(flags(false, true), tmp.path()).unwrap();
        let names: Vec<_> = survivors.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["policyd"]);

        for svc in REGISTRY {
            let expect_present = !svc.networking_only;
            assert_eq!(svc.dir(tmp.path()).exists(), expect_present);
        }
        // Surviving service keeps its log dir.
        assert!(REGISTRY[3].log_dir(tmp.path()).exists());
    }

    #[test]
    fn test_prune_is_idempotent() {
        let tmp = tempdir().unwrap();
        seed_tree(tmp.path());

        let f = flags(false, false);
        prune(f, tmp.path()).unwrap();
        let after_once: Vec<_> = list_tree(tmp.path());

        // Second run sees every deletion target already absent.
        prune(f, tmp.path()).unwrap();
        assert_eq!(after_once, list_tree(tmp.path()));
    }

    #[test]
    fn test_prune_on_empty_root_is_error_free() {
        let tmp = tempdir().unwrap();
        let survivors = prune(flags(false, false), tmp.path()).unwrap();
        assert_eq!(survivors.len(), 1);
    }

    fn list_tree(root: &Path) -> Vec<String> {
        let mut entries: Vec<String> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.path().display().to_string())
            .collect();
        entries.sort();
        entries
    }
}
