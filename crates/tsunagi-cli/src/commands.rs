//! CLI commands.
//!
//! Parsed with clap derive and executed against a started [`Session`].
//! Output goes to any `Write` so commands can be tested without a terminal.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::sync::broadcast::error::RecvError;
use tsunagi_client::ConnectionEvent;
use tsunagi_vfs::{FileRef, Options};

use crate::session::Session;

/// Remote desktop filesystem and RPC client.
#[derive(Parser, Debug)]
#[command(name = "tsunagi")]
#[command(about = "Talk to a desktop server: files over mounts, raw RPC calls, live events")]
pub struct Cli {
    /// Config file (default: <config dir>/tsunagi/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List a directory
    Ls { path: String },
    /// Print a file to stdout
    Cat { path: String },
    /// Upload a local file (stdin when omitted)
    Put { path: String, local: Option<PathBuf> },
    /// Download a file to a local path
    Get { path: String, local: PathBuf },
    /// Copy a file, across mounts if needed
    Cp { src: String, dest: String },
    /// Move or rename a file
    Mv { src: String, dest: String },
    /// Delete a file or directory
    Rm { path: String },
    /// Create a directory
    Mkdir { path: String },
    /// Print whether a path exists
    Exists { path: String },
    /// Print the download URL of a file
    Url { path: String },
    /// Move a file to the trash
    Trash { path: String },
    /// Restore a file from the trash
    Untrash { path: String },
    /// List mounts in resolution order
    Mounts,
    /// Call a server method with JSON args
    Call {
        method: String,
        #[arg(default_value = "null")]
        args: String,
    },
    /// Print file and connection events until interrupted
    Watch,
}

/// Run one command.
pub async fn execute<W: Write>(session: &Session, command: Command, out: &mut W) -> Result<()> {
    let vfs = session.vfs();
    let opts = Options::new();

    match command {
        Command::Ls { path } => {
            let listing = vfs
                .scandir(&FileRef::dir(&path)?, &opts)
                .await
                .with_context(|| format!("cannot list {path}"))?;
            for entry in listing {
                let size = entry.size.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
                writeln!(out, "{:<4} {:>10}  {}", entry.kind, size, entry.filename)?;
            }
        }
        Command::Cat { path } => {
            let data = vfs
                .read(&vfs.file(&path)?, &opts)
                .await
                .with_context(|| format!("cannot read {path}"))?;
            out.write_all(&data)?;
        }
        Command::Put { path, local } => {
            let data = match &local {
                Some(local) => tokio::fs::read(local)
                    .await
                    .with_context(|| format!("cannot read {}", local.display()))?,
                None => {
                    let mut data = Vec::new();
                    tokio::io::stdin().read_to_end(&mut data).await?;
                    data
                }
            };
            vfs.write(&vfs.file(&path)?, &data, &opts)
                .await
                .with_context(|| format!("cannot write {path}"))?;
            tracing::info!(path, bytes = data.len(), "uploaded");
        }
        Command::Get { path, local } => {
            let data = vfs
                .download(&vfs.file(&path)?)
                .await
                .with_context(|| format!("cannot download {path}"))?;
            tokio::fs::write(&local, &data)
                .await
                .with_context(|| format!("cannot write {}", local.display()))?;
            tracing::info!(path, local = %local.display(), bytes = data.len(), "downloaded");
        }
        Command::Cp { src, dest } => {
            vfs.copy(&vfs.file(&src)?, &vfs.file(&dest)?, &opts)
                .await
                .with_context(|| format!("cannot copy {src} to {dest}"))?;
        }
        Command::Mv { src, dest } => {
            let mut file = vfs.file(&src)?;
            file.move_to(vfs, &vfs.file(&dest)?, &opts)
                .await
                .with_context(|| format!("cannot move {src} to {dest}"))?;
            writeln!(out, "{file}")?;
        }
        Command::Rm { path } => {
            vfs.unlink(&vfs.file(&path)?, &opts)
                .await
                .with_context(|| format!("cannot remove {path}"))?;
        }
        Command::Mkdir { path } => {
            vfs.mkdir(&FileRef::dir(&path)?, &opts)
                .await
                .with_context(|| format!("cannot create {path}"))?;
        }
        Command::Exists { path } => {
            let exists = vfs.exists(&vfs.file(&path)?).await?;
            writeln!(out, "{exists}")?;
        }
        Command::Url { path } => {
            writeln!(out, "{}", vfs.url(&vfs.file(&path)?).await?)?;
        }
        Command::Trash { path } => {
            vfs.trash(&vfs.file(&path)?)
                .await
                .with_context(|| format!("cannot trash {path}"))?;
        }
        Command::Untrash { path } => {
            vfs.untrash(&vfs.file(&path)?)
                .await
                .with_context(|| format!("cannot restore {path}"))?;
        }
        Command::Mounts => {
            for mount in vfs.registry().list() {
                let mut flags = Vec::new();
                if mount.read_only {
                    flags.push("ro");
                }
                if !mount.enabled {
                    flags.push("disabled");
                }
                if !mount.visible {
                    flags.push("hidden");
                }
                if mount.special {
                    flags.push("builtin");
                }
                writeln!(
                    out,
                    "{:<10} {:<8} {:<24} {}",
                    mount.name,
                    mount.transport,
                    mount.matcher.to_string(),
                    flags.join(",")
                )?;
            }
        }
        Command::Call { method, args } => {
            let args: Value = serde_json::from_str(&args).context("args must be JSON")?;
            let result = session.connection().call(&method, args).await?;
            writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
        }
        Command::Watch => watch(session, out).await?,
    }

    Ok(())
}

async fn watch<W: Write>(session: &Session, out: &mut W) -> Result<()> {
    let mut files = session.vfs().watch().subscribe();
    let mut events = session.connection().subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = files.recv() => match event {
                Ok(event) => {
                    writeln!(out, "{} {} ({})", event.kind, event.file.path, event.source)?;
                }
                Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "watch output lagged"),
                Err(RecvError::Closed) => break,
            },
            event = events.recv() => match event {
                Ok(ConnectionEvent::Online) => writeln!(out, "* online")?,
                Ok(ConnectionEvent::Offline { attempt }) => writeln!(out, "* offline (attempt {attempt})")?,
                Ok(ConnectionEvent::Disconnected) => {
                    writeln!(out, "* disconnected by server")?;
                    break;
                }
                Ok(ConnectionEvent::Message(msg)) if !msg.is_watch() => {
                    writeln!(out, "* {}", msg.payload)?;
                }
                Ok(ConnectionEvent::Message(_)) => {}
                Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "event output lagged"),
                Err(RecvError::Closed) => break,
            },
        }
        out.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from(["tsunagi", "cp", "home:///a", "tmp:///a"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Cp {
                src: "home:///a".into(),
                dest: "tmp:///a".into()
            }
        );
        assert!(cli.config.is_none());

        let cli = Cli::try_parse_from(["tsunagi", "call", "whoami", "--config", "/x.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/x.toml")));
        assert_eq!(
            cli.command,
            Command::Call {
                method: "whoami".into(),
                args: "null".into()
            }
        );

        assert!(Cli::try_parse_from(["tsunagi", "frobnicate"]).is_err());
    }
}
