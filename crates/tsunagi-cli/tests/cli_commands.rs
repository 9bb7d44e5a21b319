//! Commands run against a standalone session loaded from a config file.

use std::path::PathBuf;

use tsunagi_cli::{Command, Config, Session, execute};

const CONFIG: &str = r#"
[connection]
kind = "standalone"

[[mounts]]
name = "tmp"
transport = "memory"
root = "tmp:///"

[[mounts]]
name = "dist"
transport = "memory"
root = "dist:///"
read_only = true
"#;

async fn run(session: &Session, command: Command) -> anyhow::Result<String> {
    let mut out = Vec::new();
    execute(session, command, &mut out).await?;
    Ok(String::from_utf8(out).unwrap())
}

async fn session(dir: &tempfile::TempDir) -> Session {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, CONFIG).unwrap();
    let config = Config::discover(Some(&path)).unwrap();
    let mut session = Session::new(&config).unwrap();
    session.start().await.unwrap();
    session
}

#[tokio::test]
async fn test_file_commands() {
    let dir = tempfile::tempdir().unwrap();
    let session = session(&dir).await;

    let local: PathBuf = dir.path().join("upload.txt");
    std::fs::write(&local, "hello tsunagi").unwrap();
    run(&session, Command::Put { path: "tmp:///docs/a.txt".into(), local: Some(local) })
        .await
        .unwrap();

    let out = run(&session, Command::Cat { path: "tmp:///docs/a.txt".into() }).await.unwrap();
    assert_eq!(out, "hello tsunagi");

    run(&session, Command::Cp { src: "tmp:///docs/a.txt".into(), dest: "tmp:///docs/b.txt".into() })
        .await
        .unwrap();
    let out = run(&session, Command::Mv { src: "tmp:///docs/b.txt".into(), dest: "tmp:///c.txt".into() })
        .await
        .unwrap();
    assert_eq!(out.trim(), "tmp:///c.txt");

    let out = run(&session, Command::Ls { path: "tmp:///".into() }).await.unwrap();
    let names: Vec<_> = out.lines().map(|l| l.split_whitespace().last().unwrap()).collect();
    assert_eq!(names, ["c.txt", "docs"]);
    assert!(out.lines().any(|l| l.starts_with("dir ")));

    let out = run(&session, Command::Exists { path: "tmp:///docs/b.txt".into() }).await.unwrap();
    assert_eq!(out.trim(), "false");

    let fetched = dir.path().join("fetched.txt");
    run(&session, Command::Get { path: "tmp:///c.txt".into(), local: fetched.clone() })
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&fetched).unwrap(), "hello tsunagi");

    run(&session, Command::Rm { path: "tmp:///docs".into() }).await.unwrap();
    let out = run(&session, Command::Exists { path: "tmp:///docs/a.txt".into() }).await.unwrap();
    assert_eq!(out.trim(), "false");
}

#[tokio::test]
async fn test_rejections_surface_as_errors() {
    let dir = tempfile::tempdir().unwrap();
    let session = session(&dir).await;

    let err = run(&session, Command::Mkdir { path: "dist:///x".into() }).await.unwrap_err();
    assert!(format!("{err:#}").contains("read-only"));

    let err = run(&session, Command::Cat { path: "nowhere:///x".into() }).await.unwrap_err();
    assert!(format!("{err:#}").contains("nowhere:///x"));

    let err = run(&session, Command::Cat { path: String::new() }).await.unwrap_err();
    assert!(format!("{err:#}").contains("needs a path"));

    let err = run(&session, Command::Call { method: "whoami".into(), args: "{".into() })
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("JSON"));
}

#[tokio::test]
async fn test_mounts_listing() {
    let dir = tempfile::tempdir().unwrap();
    let session = session(&dir).await;

    let out = run(&session, Command::Mounts).await.unwrap();
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("http"));
    assert!(lines[0].contains("builtin"));
    assert!(lines[2].starts_with("dist"));
    assert!(lines[2].ends_with("ro"));
}
