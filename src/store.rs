use crate::error::Result;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Cached list of repository names, so an org does not have to be re-listed on every run.
pub trait RepoCache {
    fn load(&self) -> Result<Option<Vec<String>>>;
    fn store(&self, names: &[String]) -> Result<()>;
}

/// Plain-text cache: one repository name per line, trailing newline.
///
/// Existence is checked before reading; concurrent runs sharing one file are not supported.
#[derive(Debug, Clone)]
pub struct FileRepoCache {
    path: PathBuf,
}

impl FileRepoCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RepoCache for FileRepoCache {
    fn load(&self) -> Result<Option<Vec<String>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        let names = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        debug!("loaded repo cache {}", self.path.display());
        Ok(Some(names))
    }

    fn store(&self, names: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut text = String::new();
        for name in names {
            text.push_str(name);
            text.push('\n');
        }
        fs::write(&self.path, text)?;
        Ok(())
    }
}

/// Destination for one repository's accumulated output lines.
pub trait ResultSink {
    fn write(&mut self, repo: &str, lines: &[String]) -> Result<()>;
}

/// Writes `<root>/<repo>.txt`, replacing whatever a previous run left there.
#[derive(Debug, Clone)]
pub struct ResultsDir {
    root: PathBuf,
}

impl ResultsDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn file_for(&self, repo: &str) -> PathBuf {
        self.root.join(format!("{}.txt", repo.replace('/', "-")))
    }
}

impl ResultSink for ResultsDir {
    fn write(&mut self, repo: &str, lines: &[String]) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let mut text = lines.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        let path = self.file_for(repo);
        fs::write(&path, text)?;
        debug!("wrote {} lines to {}", lines.len(), path.display());
        Ok(())
    }
}
