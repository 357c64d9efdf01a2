//! The startup state machine.
//!
//! ```text
//! Init -> FlagsResolved -> ServicesPruned -> ConfigPrimed -> SupervisorHandoff
//! ```
//!
//! Transitions are strictly sequential and run exactly once. The only
//! fork is at `ServicesPruned`: with networking disabled, template
//! rendering and config priming are skipped entirely and the sequence
//! goes straight to the handoff.
//!
//! The sequencer stops short of the terminal exec: [`Sequencer::run`]
//! returns a [`Handoff`] describing it, and the caller performs the
//! process-image replacement.

use std::fmt;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::flags::FeatureFlags;
use crate::priming::{self, BackendConfig, PrimingAttempt, PRIMING_PASSES};
use crate::registry::{self, ServiceDescriptor};
use crate::supervisor;
use crate::template;

/// States of the startup sequence, in order. On a fatal error the
/// sequencer stays at the last state it completed, which identifies the
/// failing step in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    Init,
    FlagsResolved,
    ServicesPruned,
    ConfigPrimed,
    SupervisorHandoff,
}

impl fmt::Display for StartupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StartupPhase::Init => "init",
            StartupPhase::FlagsResolved => "flags-resolved",
            StartupPhase::ServicesPruned => "services-pruned",
            StartupPhase::ConfigPrimed => "config-primed",
            StartupPhase::SupervisorHandoff => "supervisor-handoff",
        };
        f.write_str(name)
    }
}

/// Everything the sequence needs, fully resolved before it starts. No
/// step below re-reads the environment.
#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub flags: FeatureFlags,
    /// Hostname substituted into templates. Only required when
    /// networking is enabled; a policy-only node never renders.
    pub hostname: Option<String>,
    pub service_dir: PathBuf,
    pub confd_dir: PathBuf,
    pub confd_bin: PathBuf,
    pub supervisor_bin: PathBuf,
    pub backend: BackendConfig,
}

/// What startup will do, without doing it. Serialized for `--dry-run`.
#[derive(Debug, Serialize)]
pub struct StartupPlan {
    pub networking_enabled: bool,
    pub file_logging_enabled: bool,
    /// Surviving services in supervisor scan order.
    pub services: Vec<&'static str>,
    /// One-shot confd passes that will run (0 when networking is off).
    pub priming_passes: u8,
}

impl StartupPlan {
    pub fn new(flags: FeatureFlags) -> Self {
        Self {
            networking_enabled: flags.networking_enabled,
            file_logging_enabled: flags.file_logging_enabled,
            services: registry::selected(flags).iter().map(|s| s.name).collect(),
            priming_passes: if flags.networking_enabled {
                PRIMING_PASSES
            } else {
                0
            },
        }
    }
}

/// The terminal transition, ready to execute. [`Handoff::exec`] only
/// returns on failure.
#[derive(Debug)]
pub struct Handoff {
    pub supervisor_bin: PathBuf,
    pub service_dir: PathBuf,
}

impl Handoff {
    /// Replace the current process image with the supervisor. On
    /// success this never returns; the [`io::Error`] is always fatal.
    pub fn exec(self) -> io::Error {
        supervisor::exec_supervisor(&self.supervisor_bin, &self.service_dir)
    }
}

/// Drives the startup sequence exactly once.
pub struct Sequencer {
    config: StartupConfig,
    phase: StartupPhase,
    priming_attempts: Vec<PrimingAttempt>,
}

impl Sequencer {
    pub fn new(config: StartupConfig) -> Self {
        Self {
            config,
            phase: StartupPhase::Init,
            priming_attempts: Vec::new(),
        }
    }

    /// Last completed phase.
    pub fn phase(&self) -> StartupPhase {
        self.phase
    }

    /// Outcomes of the priming passes, if any ran.
    pub fn priming_attempts(&self) -> &[PrimingAttempt] {
        &self.priming_attempts
    }

    /// Run the sequence up to (not including) the terminal exec.
    ///
    /// Errors from pruning and rendering abort the sequence; priming
    /// failures are absorbed inside [`priming::prime`] and never
    /// surface here.
    pub async fn run(&mut self) -> Result<Handoff> {
        let flags = self.config.flags;
        info!(
            "Starting node: networking={}, file_logging={}",
            flags.networking_enabled, flags.file_logging_enabled
        );
        self.phase = StartupPhase::FlagsResolved;

        let survivors = registry::prune(flags, &self.config.service_dir)
            .context("failed to prune supervision tree")?;
        info!(
            "✅ Supervising {} service(s): {}",
            survivors.len(),
            service_names(&survivors).join(", ")
        );
        self.phase = StartupPhase::ServicesPruned;

        if flags.networking_enabled {
            self.render_and_prime().await?;
            self.phase = StartupPhase::ConfigPrimed;
        } else {
            info!("Networking disabled, skipping template rendering and config priming");
        }

        self.phase = StartupPhase::SupervisorHandoff;
        info!(
            "🚀 Handing off to {} over {}",
            self.config.supervisor_bin.display(),
            self.config.service_dir.display()
        );

        Ok(Handoff {
            supervisor_bin: self.config.supervisor_bin.clone(),
            service_dir: self.config.service_dir.clone(),
        })
    }

    async fn render_and_prime(&mut self) -> Result<()> {
        let hostname = self
            .config
            .hostname
            .as_deref()
            .context("node hostname unknown (set HOSTNAME or pass --node-hostname)")?;

        template::render_all(&self.config.confd_dir, hostname)
            .context("failed to render configuration templates")?;

        self.priming_attempts = priming::prime(
            &self.config.confd_bin,
            &self.config.confd_dir,
            &self.config.backend,
        )
        .await;

        Ok(())
    }
}

fn service_names(services: &[&'static ServiceDescriptor]) -> Vec<&'static str> {
    services.iter().map(|s| s.name).collect()
}
