use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::{DocdexError, Result};

/// Log lines that signal the engine is accepting connections
const READY_MARKERS: &[&str] = &["listening on", "starting service"];

/// How long a stopping engine gets to exit on its own before being killed
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Supervisor for a locally spawned search engine process
///
/// Startup is considered complete when the child prints a readiness marker
/// on stdout or stderr within the configured timeout. `start` and `stop`
/// are idempotent.
pub struct EngineProcess {
    binary_path: PathBuf,
    data_dir: PathBuf,
    http_addr: String,
    master_key: String,
    startup_timeout: Duration,
    child: Option<Child>,
}

impl EngineProcess {
    pub fn new(config: &Config) -> Result<Self> {
        let binary_path = config
            .engine
            .binary_path
            .clone()
            .ok_or_else(|| DocdexError::Config("engine.binary_path is not set".to_string()))?;

        Ok(Self {
            binary_path,
            data_dir: config.data_dir().join("engine"),
            http_addr: format!("{}:{}", config.engine.host, config.engine.port),
            master_key: config
                .master_key()
                .map_err(|e| DocdexError::Config(e.to_string()))?,
            startup_timeout: Duration::from_secs(config.engine.startup_timeout_secs),
            child: None,
        })
    }

    /// Spawn the engine and wait until it reports readiness. Calling this
    /// while the engine is already running is a no-op.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            log::debug!("Engine already running, skipping start");
            return Ok(());
        }

        std::fs::create_dir_all(&self.data_dir)?;

        log::info!(
            "Starting engine {} on {}",
            self.binary_path.display(),
            self.http_addr
        );
        let mut child = Command::new(&self.binary_path)
            .arg("--db-path")
            .arg(self.data_dir.join("data.ms"))
            .arg("--http-addr")
            .arg(&self.http_addr)
            .arg("--master-key")
            .arg(&self.master_key)
            .arg("--dump-dir")
            .arg(self.data_dir.join("dumps"))
            .arg("--snapshot-dir")
            .arg(self.data_dir.join("snapshots"))
            .arg("--no-analytics")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DocdexError::Engine(format!(
                    "failed to spawn {}: {}",
                    self.binary_path.display(),
                    e
                ))
            })?;

        let (ready_tx, mut ready_rx) = mpsc::channel::<()>(2);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(watch_output(stdout, "engine", ready_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(watch_output(stderr, "engine", ready_tx));
        }

        tokio::select! {
            signal = ready_rx.recv() => {
                if signal.is_none() {
                    let status = child.wait().await?;
                    return Err(DocdexError::Engine(format!(
                        "engine exited during startup: {}",
                        status
                    )));
                }
            }
            _ = tokio::time::sleep(self.startup_timeout) => {
                let _ = child.start_kill();
                return Err(DocdexError::Engine(format!(
                    "engine did not become ready within {:?}",
                    self.startup_timeout
                )));
            }
        }

        log::info!("Engine ready on {}", self.http_addr);
        self.child = Some(child);
        Ok(())
    }

    /// Ask the engine to exit, escalating to a kill after a grace period.
    /// Safe to call when not running.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if let Some(pid) = child.id() {
            log::info!("Stopping engine (pid {})", pid);
            terminate(pid);
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(status) => {
                    log::info!("Engine exited: {}", status?);
                    return Ok(());
                }
                Err(_) => log::warn!("Engine ignored termination, killing"),
            }
        }

        child.kill().await?;
        Ok(())
    }

    /// Whether a previously started child is still alive
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                // Exited or unknowable; drop the handle either way
                _ => {
                    self.child = None;
                    false
                }
            },
            None => false,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.http_addr)
    }
}

/// Forward child output to the log, signalling once on a readiness marker
async fn watch_output<R>(reader: R, tag: &'static str, ready: mpsc::Sender<()>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut signalled = false;
    while let Ok(Some(line)) = lines.next_line().await {
        log::debug!("[{}] {}", tag, line);
        if !signalled && READY_MARKERS.iter().any(|m| line.contains(m)) {
            signalled = true;
            let _ = ready.send(()).await;
        }
    }
}

#[cfg(unix)]
fn terminate(pid: u32) {
    // SIGTERM first so the engine can flush its task queue
    let _ = std::process::Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .status();
}

#[cfg(not(unix))]
fn terminate(_pid: u32) {}
