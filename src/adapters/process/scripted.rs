//! Scripted fitting program for testing.
//!
//! Serves canned output instead of spawning a process. The script sees the
//! materialized input file, so tests can answer differently per candidate.

use std::io::{self, Cursor};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, BufReader, DuplexStream};

use crate::domain::ports::{FitLauncher, FitProcess, LaunchedFit, OutputStream};

/// Behaviour of one scripted fit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedFit {
    /// Print the text, then exit.
    Output(String),
    /// Print the text, then hang until stopped.
    Hang(String),
    /// Print the text and close the output, but keep running until stopped.
    Linger(String),
    /// Fail to start.
    LaunchError,
}

/// Counters shared by a launcher and every process it started.
#[derive(Debug, Default)]
pub struct ScriptedStats {
    launches: AtomicUsize,
    stop_requests: AtomicUsize,
    running: AtomicUsize,
    inputs: Mutex<Vec<String>>,
}

impl ScriptedStats {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn stop_requests(&self) -> usize {
        self.stop_requests.load(Ordering::SeqCst)
    }

    /// Processes launched and not yet waited on.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Input files seen at launch, in launch order.
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().map(|i| i.clone()).unwrap_or_default()
    }
}

type Script = dyn Fn(&str) -> ScriptedFit + Send + Sync;

/// Launcher answering each input file with a [`ScriptedFit`].
pub struct ScriptedLauncher {
    script: Box<Script>,
    stats: Arc<ScriptedStats>,
}

impl ScriptedLauncher {
    pub fn new(script: impl Fn(&str) -> ScriptedFit + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            stats: Arc::new(ScriptedStats::default()),
        }
    }

    /// Same behaviour for every input.
    pub fn constant(fit: ScriptedFit) -> Self {
        Self::new(move |_| fit.clone())
    }

    pub fn stats(&self) -> Arc<ScriptedStats> {
        Arc::clone(&self.stats)
    }
}

impl std::fmt::Debug for ScriptedLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedLauncher")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FitLauncher for ScriptedLauncher {
    fn program(&self) -> &str {
        "scripted"
    }

    async fn launch(&self, working_dir: &Path, input_file: &str) -> io::Result<LaunchedFit> {
        let input = tokio::fs::read_to_string(working_dir.join(input_file)).await?;
        let fit = (self.script)(&input);
        if let Ok(mut inputs) = self.stats.inputs.lock() {
            inputs.push(input);
        }

        let (output, hold) = match fit {
            ScriptedFit::LaunchError => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    "scripted launch failure",
                ));
            }
            ScriptedFit::Output(text) => {
                (Box::new(Cursor::new(text.into_bytes())) as OutputStream, None)
            }
            ScriptedFit::Hang(text) => {
                let (mut writer, reader) = tokio::io::duplex(text.len().max(1024));
                writer.write_all(text.as_bytes()).await?;
                (Box::new(BufReader::new(reader)) as OutputStream, Some(writer))
            }
            ScriptedFit::Linger(text) => {
                let (alive, _closed) = tokio::io::duplex(1);
                (Box::new(Cursor::new(text.into_bytes())) as OutputStream, Some(alive))
            }
        };

        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        self.stats.running.fetch_add(1, Ordering::SeqCst);

        Ok(LaunchedFit {
            output,
            process: Box::new(ScriptedProcess {
                hold,
                reaped: false,
                stopped: false,
                stats: Arc::clone(&self.stats),
            }),
        })
    }
}

/// Process half of a scripted fit. Hanging and lingering fits stay alive
/// until stopped.
#[derive(Debug)]
pub struct ScriptedProcess {
    hold: Option<DuplexStream>,
    reaped: bool,
    stopped: bool,
    stats: Arc<ScriptedStats>,
}

#[async_trait]
impl FitProcess for ScriptedProcess {
    fn id(&self) -> Option<u32> {
        None
    }

    fn request_stop(&mut self) -> io::Result<()> {
        self.stats.stop_requests.fetch_add(1, Ordering::SeqCst);
        self.kill()
    }

    fn kill(&mut self) -> io::Result<()> {
        self.hold = None;
        self.stopped = true;
        Ok(())
    }

    fn has_exited(&mut self) -> io::Result<bool> {
        Ok(self.hold.is_none())
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        if self.hold.is_some() {
            std::future::pending::<()>().await;
        }
        if !self.reaped {
            self.reaped = true;
            self.stats.running.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(Some(if self.stopped { 143 } else { 0 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;

    #[tokio::test]
    async fn test_output_fit_streams_and_exits() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("input.txt"), "row\n").await.unwrap();

        let launcher = ScriptedLauncher::constant(ScriptedFit::Output("a\nb\n".to_string()));
        let stats = launcher.stats();
        let mut fit = launcher.launch(dir.path(), "input.txt").await.unwrap();

        let mut lines = Vec::new();
        let mut buf = String::new();
        while fit.output.read_line(&mut buf).await.unwrap() > 0 {
            lines.push(std::mem::take(&mut buf));
        }
        assert_eq!(lines, vec!["a\n", "b\n"]);
        assert!(fit.process.has_exited().unwrap());
        assert_eq!(fit.process.wait().await.unwrap(), Some(0));
        assert_eq!(stats.running(), 0);
        assert_eq!(stats.inputs(), vec!["row\n".to_string()]);
    }

    #[tokio::test]
    async fn test_hanging_fit_ends_when_stopped() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("input.txt"), "").await.unwrap();

        let launcher = ScriptedLauncher::constant(ScriptedFit::Hang("first\n".to_string()));
        let stats = launcher.stats();
        let mut fit = launcher.launch(dir.path(), "input.txt").await.unwrap();

        let mut buf = String::new();
        fit.output.read_line(&mut buf).await.unwrap();
        assert_eq!(buf, "first\n");
        assert!(!fit.process.has_exited().unwrap());
        assert_eq!(stats.running(), 1);

        fit.process.request_stop().unwrap();
        assert_eq!(fit.process.wait().await.unwrap(), Some(143));
        buf.clear();
        assert_eq!(fit.output.read_line(&mut buf).await.unwrap(), 0);
        assert_eq!(stats.stop_requests(), 1);
        assert_eq!(stats.running(), 0);
    }

    #[tokio::test]
    async fn test_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("input.txt"), "").await.unwrap();
        let launcher = ScriptedLauncher::constant(ScriptedFit::LaunchError);
        assert!(launcher.launch(dir.path(), "input.txt").await.is_err());
        assert_eq!(launcher.stats().launches(), 0);
    }
}
