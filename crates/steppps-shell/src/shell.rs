//! Line-oriented commands over a [`FileSystemManager`].

use std::fmt::Write as _;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result, bail};
use steppps_vfs::{FileSystemManager, PathEntry};

/// One parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Pwd,
    Cd(String),
    Ls(Option<String>),
    Mkdir(String),
    Touch(String),
    Cat(String),
    Write { path: String, text: String },
    Append { path: String, text: String },
    Rm(String),
    Stat(String),
    Mounts,
    Df,
    Help,
}

impl Command {
    /// Parse one line. Blank lines and `#` comments yield `None`.
    ///
    /// `write` and `append` take everything after the path verbatim
    /// (single spaces between words) and add a trailing newline.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let one = |what: &str| -> Result<String> {
            match args.as_slice() {
                [arg] => Ok(arg.to_string()),
                _ => bail!("usage: {name} <{what}>"),
            }
        };
        let text = || -> Result<(String, String)> {
            match args.split_first() {
                Some((path, rest)) => Ok((path.to_string(), format!("{}\n", rest.join(" ")))),
                None => bail!("usage: {name} <path> <text...>"),
            }
        };

        let cmd = match name {
            "pwd" => Command::Pwd,
            "cd" => Command::Cd(args.first().map_or_else(|| "/".to_string(), |s| s.to_string())),
            "ls" => match args.as_slice() {
                [] => Command::Ls(None),
                [path] => Command::Ls(Some(path.to_string())),
                _ => bail!("usage: ls [path]"),
            },
            "mkdir" => Command::Mkdir(one("path")?),
            "touch" => Command::Touch(one("path")?),
            "cat" => Command::Cat(one("path")?),
            "rm" => Command::Rm(one("path")?),
            "stat" => Command::Stat(one("path")?),
            "write" => {
                let (path, text) = text()?;
                Command::Write { path, text }
            }
            "append" => {
                let (path, text) = text()?;
                Command::Append { path, text }
            }
            "mounts" => Command::Mounts,
            "df" => Command::Df,
            "help" => Command::Help,
            other => bail!("unknown command: {other}"),
        };
        Ok(Some(cmd))
    }
}

const HELP: &str = "\
commands:
  pwd                     print the current directory
  cd [path]               change directory (default /)
  ls [path]               list a directory
  mkdir <path>            create a directory (parent must exist)
  touch <path>            create an empty file if missing
  cat <path>              print a file
  write <path> <text...>  replace a file's content
  append <path> <text...> append to a file
  rm <path>               remove a file or empty directory
  stat <path>             show metadata
  mounts                  list mount points
  df                      show per-mount usage
";

/// Executes commands against one manager.
pub struct Shell {
    manager: FileSystemManager,
}

impl Shell {
    pub fn new(manager: FileSystemManager) -> Self {
        Self { manager }
    }

    /// Run one command, returning what it prints.
    pub async fn execute(&self, cmd: &Command) -> Result<String> {
        let fs = &self.manager;
        let mut out = String::new();
        match cmd {
            Command::Pwd => {
                writeln!(out, "{}", fs.current_directory())?;
            }
            Command::Cd(path) => fs.change_directory(path).await?,
            Command::Ls(path) => {
                for entry in fs.list_directory(path.as_deref()).await? {
                    writeln!(out, "{}", format_entry(&entry))?;
                }
            }
            Command::Mkdir(path) => {
                fs.create_directory(path).await?;
            }
            Command::Touch(path) => {
                if fs.stat(path).await.is_err() {
                    fs.create_file(path, &[]).await?;
                }
            }
            Command::Cat(path) => {
                let data = fs.read_file(path).await?;
                out.push_str(&String::from_utf8_lossy(&data));
            }
            Command::Write { path, text } => fs.write_file(path, text.as_bytes()).await?,
            Command::Append { path, text } => fs.append_file(path, text.as_bytes()).await?,
            Command::Rm(path) => fs.delete_file(path).await?,
            Command::Stat(path) => {
                let entry = fs.stat(path).await?;
                let modified = entry
                    .modified_at
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                writeln!(out, "path:        {}", entry.path)?;
                writeln!(out, "kind:        {:?}", entry.kind)?;
                writeln!(out, "size:        {}", entry.size)?;
                writeln!(out, "permissions: {}", entry.permissions)?;
                writeln!(out, "modified:    {modified}")?;
                writeln!(out, "reads:       {}", entry.access_count)?;
                writeln!(out, "commits:     {}", entry.modify_count)?;
                if let Some(sum) = &entry.checksum {
                    writeln!(out, "blake3:      {sum}")?;
                }
            }
            Command::Mounts => {
                for mount in fs.list_mounts().await {
                    let mode = if mount.read_only { "ro" } else { "rw" };
                    writeln!(out, "{:<16} {:<12} {:<8} {mode}", mount.path, mount.name, mount.kind)?;
                }
            }
            Command::Df => {
                for (mount, stats) in fs.stats().await? {
                    writeln!(
                        out,
                        "{:<16} files={} dirs={} bytes={} handles={}",
                        mount.path, stats.files, stats.directories, stats.total_bytes, stats.open_handles
                    )?;
                }
            }
            Command::Help => out.push_str(HELP),
        }
        Ok(out)
    }

    /// Parse and run one line. `Ok(None)` for blank lines and comments.
    pub async fn run_line(&self, line: &str) -> Result<Option<String>> {
        match Command::parse(line)? {
            Some(cmd) => {
                tracing::debug!(?cmd, "executing");
                let out = self
                    .execute(&cmd)
                    .await
                    .with_context(|| line.trim().to_string())?;
                Ok(Some(out))
            }
            None => Ok(None),
        }
    }
}

fn format_entry(entry: &PathEntry) -> String {
    let marker = if entry.is_dir() { "d" } else { "-" };
    let suffix = if entry.is_dir() { "/" } else { "" };
    format!(
        "{marker}{} {:>8} {}{suffix}",
        entry.permissions, entry.size, entry.name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use steppps_vfs::VfsConfig;

    async fn shell() -> Shell {
        let manager = FileSystemManager::from_config(&VfsConfig::default())
            .await
            .unwrap();
        Shell::new(manager)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("  ").unwrap(), None);
        assert_eq!(Command::parse("# comment").unwrap(), None);
        assert_eq!(Command::parse("pwd").unwrap(), Some(Command::Pwd));
        assert_eq!(Command::parse("cd").unwrap(), Some(Command::Cd("/".into())));
        assert_eq!(Command::parse("ls").unwrap(), Some(Command::Ls(None)));
        assert_eq!(
            Command::parse("ls /home").unwrap(),
            Some(Command::Ls(Some("/home".into())))
        );
        assert_eq!(
            Command::parse("write /f hello   there").unwrap(),
            Some(Command::Write {
                path: "/f".into(),
                text: "hello there\n".into()
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse("frobnicate").is_err());
        assert!(Command::parse("mkdir").is_err());
        assert!(Command::parse("mkdir a b").is_err());
        assert!(Command::parse("write").is_err());
    }

    #[tokio::test]
    async fn test_session() {
        let sh = shell().await;
        sh.run_line("mkdir /home").await.unwrap();
        sh.run_line("cd home").await.unwrap();
        assert_eq!(sh.run_line("pwd").await.unwrap().unwrap(), "/home\n");

        sh.run_line("write note.txt hi").await.unwrap();
        sh.run_line("append note.txt there").await.unwrap();
        assert_eq!(sh.run_line("cat note.txt").await.unwrap().unwrap(), "hi\nthere\n");

        let ls = sh.run_line("ls").await.unwrap().unwrap();
        assert!(ls.contains("note.txt"));
        assert!(ls.starts_with("-rw-r--r--"));

        let stat = sh.run_line("stat note.txt").await.unwrap().unwrap();
        assert!(stat.contains("path:        /home/note.txt"));
        assert!(stat.contains("commits:     2"));

        sh.run_line("rm note.txt").await.unwrap();
        assert!(sh.run_line("cat note.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_touch_keeps_existing_content() {
        let sh = shell().await;
        sh.run_line("write /f keep").await.unwrap();
        sh.run_line("touch /f").await.unwrap();
        assert_eq!(sh.run_line("cat /f").await.unwrap().unwrap(), "keep\n");
    }

    #[tokio::test]
    async fn test_errors_carry_the_line() {
        let sh = shell().await;
        let err = sh.run_line("mkdir /a/b").await.unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("mkdir /a/b"));
        assert!(msg.contains("invalid parent"));
    }

    #[tokio::test]
    async fn test_mounts_and_df() {
        let sh = shell().await;
        let mounts = sh.run_line("mounts").await.unwrap().unwrap();
        assert!(mounts.starts_with("/"));
        assert!(mounts.contains("virtual"));

        sh.run_line("write /blob abc").await.unwrap();
        let df = sh.run_line("df").await.unwrap().unwrap();
        assert!(df.contains("files=1"));
        assert!(df.contains("bytes=4"));
    }
}
