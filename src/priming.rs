//! Best-effort configuration priming against the etcd backend.
//!
//! Before the supervisor starts anything, confd is run in one-shot mode
//! so the long-running services come up with a configuration snapshot
//! instead of empty config. confd's own output templates may themselves
//! be generated by a prior run of confd, so a single pass can leave
//! partially-rendered config behind; a second pass converges it. The
//! pass count is exactly two, not an iterate-until-converged loop.
//!
//! Every failure here is absorbed: the services re-read configuration
//! after start and self-correct, so an unreachable backend must not
//! keep the node from coming up.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{info, warn};
use url::Url;

/// Default scheme for the etcd endpoint.
pub const DEFAULT_ETCD_SCHEME: &str = "http";

/// Default authority (host:port) for the etcd endpoint.
pub const DEFAULT_ETCD_AUTHORITY: &str = "127.0.0.1:2379";

/// Number of one-shot confd passes. Always run to completion, in order.
pub const PRIMING_PASSES: u8 = 2;

/// Connection parameters for the etcd config backend, resolved once at
/// startup from CLI/environment.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub scheme: String,
    pub authority: String,
    pub client_key: Option<PathBuf>,
    pub client_cert: Option<PathBuf>,
    pub client_ca: Option<PathBuf>,
}

impl BackendConfig {
    /// The endpoint confd is pointed at, `scheme://authority`.
    pub fn endpoint(&self) -> String {
        format!("{}://{}", self.scheme, self.authority)
    }

    /// Warn about an endpoint that does not parse as a URL. Priming is
    /// best-effort, so this never aborts startup.
    pub fn warn_if_malformed(&self) {
        let endpoint = self.endpoint();
        if let Err(e) = Url::parse(&endpoint) {
            warn!("Backend endpoint {:?} does not parse as a URL: {}", endpoint, e);
        }
    }
}

/// Outcome of a single one-shot confd invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimingOutcome {
    Success,
    Failure,
}

/// Record of one priming pass, used only for logging and tests.
#[derive(Debug, Clone, Copy)]
pub struct PrimingAttempt {
    pub attempt: u8,
    pub outcome: PrimingOutcome,
}

/// Argument vector for one one-shot confd run. Credential flags are
/// passed only when configured.
fn confd_args(confd_dir: &Path, backend: &BackendConfig) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        {
            let mut arg = OsString::from("-confdir=");
            arg.push(confd_dir);
            arg
        },
        OsString::from("-onetime"),
        OsString::from(format!("-node={}", backend.endpoint())),
    ];

    for (flag, value) in [
        ("-client-key=", &backend.client_key),
        ("-client-cert=", &backend.client_cert),
        ("-client-ca-keys=", &backend.client_ca),
    ] {
        if let Some(path) = value {
            let mut arg = OsString::from(flag);
            arg.push(path);
            args.push(arg);
        }
    }

    args
}

/// Run the templating agent in one-shot mode exactly [`PRIMING_PASSES`]
/// times, sequentially, blocking on each. Failures are logged and
/// swallowed; the returned attempts exist for diagnostics only.
pub async fn prime(
    confd_bin: &Path,
    confd_dir: &Path,
    backend: &BackendConfig,
) -> Vec<PrimingAttempt> {
    backend.warn_if_malformed();

    let args = confd_args(confd_dir, backend);
    let mut attempts = Vec::with_capacity(PRIMING_PASSES as usize);

    for attempt in 1..=PRIMING_PASSES {
        info!(
            "Priming configuration from {} (pass {}/{})",
            backend.endpoint(),
            attempt,
            PRIMING_PASSES
        );

        let outcome = match Command::new(confd_bin).args(&args).status().await {
            Ok(status) if status.success() => PrimingOutcome::Success,
            Ok(status) => {
                warn!("confd pass {} exited with {}", attempt, status);
                PrimingOutcome::Failure
            }
            Err(e) => {
                warn!(
                    "confd pass {} failed to run ({}): {}",
                    attempt,
                    confd_bin.display(),
                    e
                );
                PrimingOutcome::Failure
            }
        };

        attempts.push(PrimingAttempt { attempt, outcome });
    }

    attempts
}
