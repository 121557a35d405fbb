// src/pipeline/command.rs

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::pipeline::asset::Asset;
use crate::pipeline::stage::{Stage, StageContext};

/// Pipes each file through an external command (stdin to stdout).
///
/// This is how a real compiler plugs in, e.g. `preprocess = "sass --stdin"`.
/// The command runs through the platform shell with the source file's
/// directory as working directory. A non-zero exit fails the file.
#[derive(Debug, Clone)]
pub struct CommandStage {
    cmd: String,
}

impl CommandStage {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    fn shell(&self) -> Command {
        // Build a shell command appropriate for the platform.
        if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        }
    }
}

impl Stage for CommandStage {
    fn name(&self) -> &'static str {
        "preprocess"
    }

    fn apply(&self, asset: Asset, _ctx: &StageContext<'_>) -> Result<Vec<Asset>> {
        let mut cmd = self.shell();
        let dir = asset.source_dir();
        if !dir.as_os_str().is_empty() && dir.is_dir() {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(cmd = %self.cmd, file = ?asset.source, "running preprocess command");
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning '{}'", self.cmd))?;

        // Feed stdin from a separate thread so a chatty command cannot
        // deadlock on a full stdout pipe.
        let input = asset.content.clone();
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || stdin.write_all(&input))
        });

        let output = child
            .wait_with_output()
            .with_context(|| format!("waiting for '{}'", self.cmd))?;

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(err)) => return Err(err).context("writing to preprocess stdin"),
                Err(_) => bail!("stdin writer thread panicked"),
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "'{}' exited with {}: {}",
                self.cmd,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        Ok(vec![asset.with_content(output.stdout)])
    }
}
