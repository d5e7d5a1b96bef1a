//! Child-process adapter for the fitting program.
//!
//! Spawns `<program> <input-file>` in the worker directory and exposes its
//! stdout to the stream monitor.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::domain::ports::{FitLauncher, FitProcess, LaunchedFit};

/// Launches the real fitting program.
#[derive(Debug, Clone)]
pub struct ProgramLauncher {
    program: PathBuf,
    display_name: String,
}

impl ProgramLauncher {
    /// Create a launcher for `program`.
    ///
    /// A bare name is looked up on `PATH` at spawn time. A path with
    /// directory components is made absolute against the current directory,
    /// since the child runs inside a worker directory.
    pub fn new(program: impl Into<String>) -> io::Result<Self> {
        let display_name = program.into();
        let path = PathBuf::from(&display_name);
        let program = if path.components().count() > 1 {
            std::path::absolute(&path)?
        } else {
            path
        };
        Ok(Self {
            program,
            display_name,
        })
    }
}

#[async_trait]
impl FitLauncher for ProgramLauncher {
    fn program(&self) -> &str {
        &self.display_name
    }

    async fn launch(&self, working_dir: &Path, input_file: &str) -> io::Result<LaunchedFit> {
        let mut command = Command::new(&self.program);
        command
            .arg(input_file)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        // own process group: a terminal interrupt reaches the sweep only,
        // which then stops the fit through its cancellation token
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("Failed to capture stdout"))?;

        debug!(program = %self.display_name, pid = ?child.id(), dir = %working_dir.display(), "fit started");

        Ok(LaunchedFit {
            output: Box::new(BufReader::new(stdout)),
            process: Box::new(ChildProcess { child }),
        })
    }
}

/// A running fitting program.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
}

#[async_trait]
impl FitProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    #[cfg(unix)]
    fn request_stop(&mut self) -> io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        // id() is None once the child has been reaped
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        let pid = i32::try_from(pid).map_err(io::Error::other)?;
        kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(io::Error::from)
    }

    #[cfg(not(unix))]
    fn request_stop(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    fn has_exited(&mut self) -> io::Result<bool> {
        Ok(self.child.try_wait()?.is_some())
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.child.wait().await?.code())
    }
}
