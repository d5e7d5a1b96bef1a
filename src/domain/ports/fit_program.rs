//! Fitting program port - interface to the external least-squares fitter.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncBufRead;

/// Line-oriented stdout of a running fit.
pub type OutputStream = Box<dyn AsyncBufRead + Send + Unpin>;

/// Handle on a running fit process.
#[async_trait]
pub trait FitProcess: Send {
    /// Process id, when the platform exposes one.
    fn id(&self) -> Option<u32>;

    /// Ask the process to stop (SIGTERM on unix). Does not wait.
    fn request_stop(&mut self) -> io::Result<()>;

    /// Kill the process outright. Does not wait.
    fn kill(&mut self) -> io::Result<()>;

    /// Whether the process has already exited.
    fn has_exited(&mut self) -> io::Result<bool>;

    /// Wait for the process to exit, returning its exit code if it had one.
    async fn wait(&mut self) -> io::Result<Option<i32>>;
}

/// A started fit: its output stream and the process producing it.
pub struct LaunchedFit {
    pub output: OutputStream,
    pub process: Box<dyn FitProcess>,
}

impl std::fmt::Debug for LaunchedFit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchedFit")
            .field("pid", &self.process.id())
            .finish_non_exhaustive()
    }
}

/// Starts the fitting program against an input file.
///
/// Implementations run `<program> <input_file>` with `working_dir` as the
/// current directory and expose stdout as an [`OutputStream`].
#[async_trait]
pub trait FitLauncher: Send + Sync {
    /// Name of the program, for logs.
    fn program(&self) -> &str;

    async fn launch(&self, working_dir: &Path, input_file: &str) -> io::Result<LaunchedFit>;
}
