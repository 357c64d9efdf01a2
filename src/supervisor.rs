//! Terminal handoff to the process supervisor.
//!
//! The orchestrator ends by replacing its own process image with the
//! supervision tree root, so the supervisor inherits PID 1 and signal
//! delivery and child reaping keep working. There is no return path:
//! on success this process simply stops existing.

use std::io;
use std::path::Path;
use std::process::Command;

use tracing::error;

/// Replace the current process image with
/// `<supervisor_bin> <service_dir>`.
///
/// Never returns on success. The returned error always means the exec
/// itself failed (missing or unexecutable supervisor binary), which is
/// fatal.
pub fn exec_supervisor(supervisor_bin: &Path, service_dir: &Path) -> io::Error {
    #[cfg(unix)]
    let err = {
        use std::os::unix::process::CommandExt;
        Command::new(supervisor_bin).arg(service_dir).exec()
    };

    #[cfg(not(unix))]
    let err = {
        let _ = Command::new(supervisor_bin).arg(service_dir);
        io::Error::new(
            io::ErrorKind::Unsupported,
            "process-image replacement requires a unix target",
        )
    };

    error!(
        "Failed to exec supervisor {}: {}",
        supervisor_bin.display(),
        err
    );
    err
}
