//! Hostname substitution into confd configuration templates.
//!
//! confd's own per-node configuration (the BGP aggregation entries) must
//! carry the node hostname before confd first runs, so the orchestrator
//! renders `<confd_dir>/templates/*.template` into `<confd_dir>/conf.d/`
//! as a single-pass token substitution. Rendering failures are fatal: a
//! missing or unreadable template means a broken image, not a transient
//! condition.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Token replaced with the node hostname in every template.
pub const HOSTNAME_TOKEN: &str = "HOSTNAME";

/// Suffix marking a file in the templates directory as renderable.
pub const TEMPLATE_SUFFIX: &str = ".template";

/// Subdirectory of the confd dir holding template sources.
pub const TEMPLATES_SUBDIR: &str = "templates";

/// Subdirectory of the confd dir receiving rendered configuration.
pub const CONF_SUBDIR: &str = "conf.d";

/// Templates every image must ship; their absence is a build defect.
pub const REQUIRED_TEMPLATES: &[&str] =
    &["bgpd_aggr.toml.template", "bgpd6_aggr.toml.template"];

/// Errors from template rendering. All of them abort startup.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("required template missing: {0}")]
    Missing(PathBuf),

    #[error("failed to scan template directory {path}")]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read template {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write rendered config {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A single render: one template in, one rendered file out. Built per
/// render and discarded.
#[derive(Debug)]
pub struct TemplateJob {
    pub template_path: PathBuf,
    pub output_path: PathBuf,
    pub substitutions: Vec<(String, String)>,
}

impl TemplateJob {
    /// A job substituting the node hostname, writing next to confd's
    /// other rendered configuration.
    pub fn hostname_job(template_path: PathBuf, output_path: PathBuf, hostname: &str) -> Self {
        Self {
            template_path,
            output_path,
            substitutions: vec![(HOSTNAME_TOKEN.to_string(), hostname.to_string())],
        }
    }

    /// Render the template, overwriting any prior output at the same
    /// path. Single pass, deterministic.
    pub fn render(&self) -> Result<(), TemplateError> {
        let mut content =
            std::fs::read_to_string(&self.template_path).map_err(|source| TemplateError::Read {
                path: self.template_path.clone(),
                source,
            })?;

        for (token, value) in &self.substitutions {
            content = content.replace(token.as_str(), value);
        }

        std::fs::write(&self.output_path, content).map_err(|source| TemplateError::Write {
            path: self.output_path.clone(),
            source,
        })?;

        debug!(
            "Rendered {} -> {}",
            self.template_path.display(),
            self.output_path.display()
        );
        Ok(())
    }
}

/// Render every `*.template` under `<confd_dir>/templates/` into
/// `<confd_dir>/conf.d/`, substituting `hostname`. The required
/// aggregation templates must be present; extra templates found by the
/// scan are rendered as well. Returns the number of files rendered.
pub fn render_all(confd_dir: &Path, hostname: &str) -> Result<usize, TemplateError> {
    let templates_dir = confd_dir.join(TEMPLATES_SUBDIR);
    let conf_dir = confd_dir.join(CONF_SUBDIR);

    for name in REQUIRED_TEMPLATES {
        let path = templates_dir.join(name);
        if !path.is_file() {
            return Err(TemplateError::Missing(path));
        }
    }

    std::fs::create_dir_all(&conf_dir).map_err(|source| TemplateError::Write {
        path: conf_dir.clone(),
        source,
    })?;

    let mut rendered = 0;
    for entry in WalkDir::new(&templates_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| TemplateError::Scan {
            path: templates_dir.clone(),
            source,
        })?;

        let file_name = entry.file_name().to_string_lossy();
        let Some(stem) = file_name.strip_suffix(TEMPLATE_SUFFIX) else {
            continue;
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let job = TemplateJob::hostname_job(
            entry.path().to_path_buf(),
            conf_dir.join(stem),
            hostname,
        );
        job.render()?;
        rendered += 1;
    }

    info!(
        "Rendered {} template(s) into {}",
        rendered,
        conf_dir.display()
    );
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn seed_templates(confd_dir: &Path) {
        let templates = confd_dir.join(TEMPLATES_SUBDIR);
        std::fs::create_dir_all(&templates).unwrap();
        for name in REQUIRED_TEMPLATES {
            std::fs::write(
                templates.join(name),
                "[aggregation]\nnode = \"HOSTNAME\"\npeer = \"HOSTNAME.mesh\"\n",
            )
            .unwrap();
        }
    }

    #[test]
    fn test_render_substitutes_every_occurrence() {
        let tmp = tempdir().unwrap();
        seed_templates(tmp.path());

        render_all(tmp.path(), "node-a").unwrap();

        let out = tmp.path().join(CONF_SUBDIR).join("bgpd_aggr.toml");
        let content = std::fs::read_to_string(out).unwrap();
        assert_eq!(
            content,
            "[aggregation]\nnode = \"node-a\"\npeer = \"node-a.mesh\"\n"
        );
    }

    #[test]
    fn test_render_is_deterministic_and_overwrites() {
        let tmp = tempdir().unwrap();
        seed_templates(tmp.path());

        render_all(tmp.path(), "node-a").unwrap();
        let out = tmp.path().join(CONF_SUBDIR).join("bgpd6_aggr.toml");
        let first = std::fs::read(&out).unwrap();

        // A second render with the same hostname is byte-identical,
        // replacing whatever was there before.
        std::fs::write(&out, "stale").unwrap();
        render_all(tmp.path(), "node-a").unwrap();
        assert_eq!(first, std::fs::read(&out).unwrap());
    }

    #[test]
    fn test_missing_required_template_is_fatal() {
        let tmp = tempdir().unwrap();
        let templates = tmp.path().join(TEMPLATES_SUBDIR);
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(templates.join(REQUIRED_TEMPLATES[0]), "HOSTNAME").unwrap();
        // bgpd6_aggr.toml.template left out.

        let err = render_all(tmp.path(), "node-a").unwrap_err();
        match err {
            TemplateError::Missing(path) => {
                assert!(path.ends_with(REQUIRED_TEMPLATES[1]));
            }
            other => panic!("expected Missing, got {other:?}"),
        }
        assert!(!tmp.path().join(CONF_SUBDIR).exists());
    }

    #[test]
    fn test_extra_templates_are_rendered_too() {
        let tmp = tempdir().unwrap();
        seed_templates(tmp.path());
        std::fs::write(
            tmp.path().join(TEMPLATES_SUBDIR).join("extra.cfg.template"),
            "host HOSTNAME\n",
        )
        .unwrap();
        // Non-template files are ignored by the scan.
        std::fs::write(tmp.path().join(TEMPLATES_SUBDIR).join("README"), "x").unwrap();

        let rendered = render_all(tmp.path(), "node-b").unwrap();
        assert_eq!(rendered, 3);

        let extra = tmp.path().join(CONF_SUBDIR).join("extra.cfg");
        assert_eq!(std::fs::read_to_string(extra).unwrap(), "host node-b\n");
        assert!(!tmp.path().join(CONF_SUBDIR).join("README").exists());
    }
}
