use anyhow::{Context, Result};
use git2::{ObjectType, Repository};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to fetch '{path}' at '{revision}': {cause}")]
pub struct FetchError {
    pub path: String,
    pub revision: String,
    pub cause: String,
}

impl FetchError {
    fn new(path: &str, revision: &str, cause: impl ToString) -> Self {
        Self {
            path: path.to_string(),
            revision: revision.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Something that can produce a file's text as of a named revision.
pub trait RevisionSource {
    fn fetch(&self, path: &str, revision: &str) -> Result<String, FetchError>;
}

pub struct GitIntegration {
    repo: Repository,
    /// Current directory relative to the work tree root.
    cwd_prefix: PathBuf,
}

impl GitIntegration {
    pub fn new(repo_path: impl AsRef<Path>) -> Result<Self> {
        let repo_path = repo_path.as_ref();
        let repo = Repository::discover(repo_path).context("Failed to find git repository")?;

        let cwd_prefix = match (repo.workdir(), repo_path.canonicalize()) {
            (Some(workdir), Ok(start)) => workdir
                .canonicalize()
                .ok()
                .and_then(|root| start.strip_prefix(&root).ok().map(Path::to_path_buf))
                .unwrap_or_default(),
            _ => PathBuf::new(),
        };

        Ok(Self { repo, cwd_prefix })
    }

    /// Paths of every file in the index, in index order, relative to the
    /// directory this integration was opened from so they can be passed
    /// straight back to `fetch`.
    pub fn list_tracked_files(&self) -> Result<Vec<String>> {
        let index = self.repo.index().context("Failed to read git index")?;
        Ok(index
            .iter()
            .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
            .filter(|path| !path.is_empty())
            .map(|path| {
                relative_to(Path::new(&path), &self.cwd_prefix)
                    .to_string_lossy()
                    .into_owned()
            })
            .collect())
    }

    fn repo_relative(&self, path: &Path) -> PathBuf {
        let joined = if path.is_absolute() {
            let root = self
                .repo
                .workdir()
                .and_then(|w| w.canonicalize().ok());
            let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
            match root.as_deref().and_then(|r| absolute.strip_prefix(r).ok()) {
                Some(relative) => relative.to_path_buf(),
                None => path.to_path_buf(),
            }
        } else {
            self.cwd_prefix.join(path)
        };
        normalize(&joined)
    }
}

impl RevisionSource for GitIntegration {
    fn fetch(&self, path: &str, revision: &str) -> Result<String, FetchError> {
        tracing::info!("Fetching file '{}' from revision '{}'", path, revision);

        let expanded = expand_home(path).map_err(|e| FetchError::new(path, revision, e))?;
        let relative = self.repo_relative(&expanded);

        let tree = self
            .repo
            .revparse_single(revision)
            .and_then(|object| object.peel_to_tree())
            .map_err(|e| FetchError::new(path, revision, e.message()))?;

        let entry = tree
            .get_path(&relative)
            .map_err(|e| FetchError::new(path, revision, e.message()))?;
        if entry.kind() != Some(ObjectType::Blob) {
            return Err(FetchError::new(path, revision, "path is not a file"));
        }

        let blob = entry
            .to_object(&self.repo)
            .and_then(|object| object.peel_to_blob())
            .map_err(|e| FetchError::new(path, revision, e.message()))?;

        Ok(String::from_utf8_lossy(blob.content()).into_owned())
    }
}

/// Replaces a leading `~` with the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf, String> {
    match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            let home = dirs::home_dir().ok_or("failed to get home directory")?;
            Ok(home.join(rest.trim_start_matches('/')))
        }
        _ => Ok(PathBuf::from(path)),
    }
}

/// Expresses a repository-relative `path` relative to the repository-relative
/// directory `base`, climbing out with `..` where needed.
fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path_parts: Vec<Component> = path.components().collect();
    let base_parts: Vec<Component> = base.components().collect();
    let shared = path_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in shared..base_parts.len() {
        out.push("..");
    }
    for part in &path_parts[shared..] {
        out.push(part.as_os_str());
    }
    out
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
