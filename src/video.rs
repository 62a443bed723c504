use std::fs::OpenOptions;
use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::OnceCell;
use serde_json::json;

#[cfg(any(unix, target_os = "windows"))]
use rand::{distributions::Alphanumeric, Rng};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::config::PlayerConfig;
use crate::playback::{MediaPipeline, PipelineFactory};

fn player_debug_enabled() -> bool {
    static FLAG: OnceCell<bool> = OnceCell::new();
    *FLAG.get_or_init(|| {
        std::env::var("TELLY_DEBUG_PLAYER")
            .map(|val| {
                let trimmed = val.trim();
                !(trimmed.is_empty()
                    || trimmed.eq_ignore_ascii_case("0")
                    || trimmed.eq_ignore_ascii_case("false")
                    || trimmed.eq_ignore_ascii_case("no")
                    || trimmed.eq_ignore_ascii_case("off"))
            })
            .unwrap_or(false)
    })
}

fn player_debug_writer() -> Option<&'static Mutex<std::fs::File>> {
    static WRITER: OnceCell<Option<Mutex<std::fs::File>>> = OnceCell::new();
    WRITER
        .get_or_init(|| {
            std::env::var("TELLY_DEBUG_PLAYER_LOG")
                .ok()
                .and_then(|path| {
                    OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(path)
                        .map(Mutex::new)
                        .ok()
                })
        })
        .as_ref()
}

pub fn debug_log(message: impl AsRef<str>) {
    if !player_debug_enabled() {
        return;
    }
    if let Some(writer) = player_debug_writer() {
        if let Ok(mut file) = writer.lock() {
            let _ = writeln!(file, "{}", message.as_ref());
            return;
        }
    }
    eprintln!("{}", message.as_ref());
}

/// Builds the production pipeline factory from the player config.
pub fn pipeline_factory(cfg: &PlayerConfig) -> PipelineFactory {
    let cfg = cfg.clone();
    Box::new(move |url: &str| {
        Ok(Box::new(MpvPipeline::new(&cfg, url)) as Box<dyn MediaPipeline>)
    })
}

/// mpv-backed media pipeline. The process is spawned paused so the stream
/// buffers before anything plays; pause/seek flow over mpv's JSON IPC
/// socket, and a clean process exit is the end-of-stream signal.
pub struct MpvPipeline {
    mpv_path: String,
    url: String,
    fullscreen: bool,
    prebuffer_timeout: Duration,
    child: Option<Child>,
    ipc_path: Option<String>,
}

impl MpvPipeline {
    pub fn new(cfg: &PlayerConfig, url: &str) -> Self {
        Self {
            mpv_path: cfg.mpv_path.clone(),
            url: url.to_string(),
            fullscreen: cfg.fullscreen,
            prebuffer_timeout: cfg.prebuffer_timeout,
            child: None,
            ipc_path: None,
        }
    }

    fn send_command(&self, payload: serde_json::Value) -> Result<()> {
        let Some(path) = &self.ipc_path else {
            return Err(anyhow!("player controls are not supported on this platform"));
        };
        let serialized =
            serde_json::to_string(&json!({ "command": payload })).context("serialize mpv command")?;
        send_ipc_command_inner(path, &serialized)
    }
}

impl MediaPipeline for MpvPipeline {
    fn prepare(&mut self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("video URL missing"));
        }

        let ipc_path = unique_ipc_path();
        let mut args: Vec<String> = Vec::new();
        args.push(self.url.clone());
        args.push("--pause=yes".to_string());
        if self.fullscreen {
            args.push("--fullscreen".to_string());
        }
        args.push("--force-window=yes".to_string());
        args.push("--keep-open=no".to_string());
        args.push("--really-quiet".to_string());
        args.push("--no-config".to_string());
        args.push("--ytdl=no".to_string());
        args.push("--osc=no".to_string());
        if let Some(path) = &ipc_path {
            args.push(format!("--input-ipc-server={path}"));
        }

        debug_log(format!("spawning mpv for {} args={:?}", self.url, args));

        let mut command = Command::new(&self.mpv_path);
        for arg in &args {
            command.arg(arg);
        }
        command.stdin(Stdio::null());
        command.stdout(Stdio::null());
        command.stderr(Stdio::null());

        let child = command
            .spawn()
            .with_context(|| format!("launch mpv to play {}", self.url))?;
        self.child = Some(child);
        self.ipc_path = ipc_path;

        self.wait_for_ipc()
    }

    fn play(&mut self) -> Result<()> {
        self.send_command(json!(["set_property", "pause", false]))
    }

    fn pause(&mut self) -> Result<()> {
        self.send_command(json!(["set_property", "pause", true]))
    }

    fn seek_to_start(&mut self) -> Result<()> {
        self.send_command(json!(["seek", 0, "absolute"]))
    }

    fn poll_ended(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                debug_log(format!("mpv exited with status {:?}", status.code()));
                self.child = None;
                true
            }
            Ok(None) => false,
            Err(err) => {
                debug_log(format!("mpv poll error: {err}"));
                self.child = None;
                true
            }
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(path) = self.ipc_path.take() {
            cleanup_ipc_path(&path);
        }
    }
}

impl MpvPipeline {
    /// Pre-buffer readiness: the stream is considered prepared once mpv's
    /// IPC socket accepts a connection. Platforms without IPC fall back to
    /// a short fixed delay.
    fn wait_for_ipc(&mut self) -> Result<()> {
        let Some(path) = self.ipc_path.clone() else {
            thread::sleep(Duration::from_millis(500));
            return Ok(());
        };
        let deadline = Instant::now() + self.prebuffer_timeout;
        loop {
            if ipc_reachable(&path) {
                debug_log(format!("mpv ipc ready at {path}"));
                return Ok(());
            }
            if let Some(child) = self.child.as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    self.child = None;
                    return Err(anyhow!(
                        "mpv exited during pre-buffer with status {:?}",
                        status.code()
                    ));
                }
            }
            if Instant::now() >= deadline {
                return Err(anyhow!("timed out pre-buffering {}", self.url));
            }
            thread::sleep(Duration::from_millis(50));
        }
    }
}

impl Drop for MpvPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(unix)]
fn ipc_reachable(path: &str) -> bool {
    UnixStream::connect(path).is_ok()
}

#[cfg(target_os = "windows")]
fn ipc_reachable(path: &str) -> bool {
    std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .is_ok()
}

#[cfg(all(not(unix), not(target_os = "windows")))]
fn ipc_reachable(_path: &str) -> bool {
    false
}

#[cfg(unix)]
fn send_ipc_command_inner(path: &str, serialized: &str) -> Result<()> {
    let mut stream =
        UnixStream::connect(path).with_context(|| format!("connect to mpv IPC socket {path}"))?;
    stream
        .write_all(serialized.as_bytes())
        .context("write mpv IPC command")?;
    stream
        .write_all(b"\n")
        .context("write mpv IPC command terminator")?;
    Ok(())
}

#[cfg(target_os = "windows")]
fn send_ipc_command_inner(path: &str, serialized: &str) -> Result<()> {
    use std::io::ErrorKind;

    const PIPE_RETRIES: usize = 5;
    const PIPE_RETRY_DELAY: Duration = Duration::from_millis(100);

    for attempt in 0..PIPE_RETRIES {
        match OpenOptions::new().read(true).write(true).open(path) {
            Ok(mut pipe) => {
                pipe.write_all(serialized.as_bytes())
                    .with_context(|| format!("write mpv IPC command to {path}"))?;
                pipe.write_all(b"\n")
                    .with_context(|| format!("write mpv IPC command terminator to {path}"))?;
                pipe.flush().ok();
                return Ok(());
            }
            Err(err) if err.kind() == ErrorKind::NotFound && attempt + 1 < PIPE_RETRIES => {
                thread::sleep(PIPE_RETRY_DELAY);
            }
            Err(err) => {
                return Err(anyhow!(err)).context(format!("connect to mpv IPC named pipe {path}"));
            }
        }
    }

    Err(anyhow!("connect to mpv IPC named pipe {}", path))
}

#[cfg(all(not(unix), not(target_os = "windows")))]
fn send_ipc_command_inner(_path: &str, _serialized: &str) -> Result<()> {
    Err(anyhow!("player controls are not supported on this platform"))
}

#[cfg(unix)]
fn unique_ipc_path() -> Option<String> {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    let mut path = std::env::temp_dir();
    path.push(format!("telly-mpv-{}-{suffix}.sock", std::process::id()));
    Some(path.to_string_lossy().to_string())
}

#[cfg(target_os = "windows")]
fn unique_ipc_path() -> Option<String> {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    Some(format!(
        r"\\.\pipe\telly-mpv-{}-{suffix}",
        std::process::id()
    ))
}

#[cfg(all(not(unix), not(target_os = "windows")))]
fn unique_ipc_path() -> Option<String> {
    None
}

#[cfg(unix)]
fn cleanup_ipc_path(path: &str) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound && player_debug_enabled() {
            debug_log(format!("failed to remove mpv ipc path {path}: {err}"));
        }
    }
}

#[cfg(not(unix))]
fn cleanup_ipc_path(_path: &str) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_config() -> PlayerConfig {
        PlayerConfig::default()
    }

    #[test]
    fn pipeline_rejects_blank_url() {
        let mut pipeline = MpvPipeline::new(&player_config(), "   ");
        assert!(pipeline.prepare().is_err());
    }

    #[test]
    fn commands_fail_before_prepare() {
        let mut pipeline = MpvPipeline::new(&player_config(), "https://cdn.test/a.mp4");
        assert!(pipeline.play().is_err());
    }

    #[test]
    fn poll_ended_is_false_without_child() {
        let mut pipeline = MpvPipeline::new(&player_config(), "https://cdn.test/a.mp4");
        assert!(!pipeline.poll_ended());
    }
}
