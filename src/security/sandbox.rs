//! Path sandboxing.
//!
//! Decides whether a path argument resolves inside an allowed root directory.
//! Resolution walks the path component by component, following every symlink
//! that exists on disk and applying nonexistent components lexically.

use std::fs;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// A path that cannot be resolved at all, as opposed to one that resolves
/// outside the sandbox.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("path contains a NUL byte: {0:?}")]
    NulByte(String),

    #[error("cannot determine the current directory: {0}")]
    CurrentDir(#[from] std::io::Error),
}

/// Returns true iff `candidate` resolves to `root` or a descendant of it.
///
/// Relative candidates are joined to `root`. Nonexistent paths never fail;
/// only inputs that cannot be interpreted as paths produce an error.
pub fn is_sandboxed(candidate: &str, root: impl AsRef<Path>) -> Result<bool, SandboxError> {
    let root = root.as_ref();
    check_nul(&root.to_string_lossy())?;
    check_nul(candidate)?;

    let root = resolve(&absolute(root)?);
    if root.as_os_str().is_empty() {
        // An unresolvable root contains nothing.
        return Ok(false);
    }
    let candidate = Path::new(candidate);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    let resolved = resolve(&joined);

    // Component-wise: "/root-evil" is not under "/root".
    Ok(resolved.starts_with(&root))
}

fn check_nul(s: &str) -> Result<(), SandboxError> {
    if s.contains('\0') {
        return Err(SandboxError::NulByte(s.to_string()));
    }
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf, SandboxError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Symlinks followed while resolving one path before giving up.
const MAX_SYMLINK_HOPS: usize = 40;

/// Resolve an absolute path to its canonical form.
///
/// Walks the path one component at a time. Every component that exists on
/// disk is canonicalized together with everything before it, so a symlink is
/// followed wherever it appears, including after a `..` that stepped back out
/// of a directory that does not exist yet. Components that do not exist are
/// applied lexically.
///
/// A path that cannot be resolved (a symlink loop, or a chain longer than
/// [`MAX_SYMLINK_HOPS`]) resolves to the empty path, which lies inside no
/// root.
pub fn resolve(path: &Path) -> PathBuf {
    let mut hops = 0;
    resolve_following(path, &mut hops).unwrap_or_default()
}

fn resolve_following(path: &Path, hops: &mut usize) -> Option<PathBuf> {
    let mut base = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // base is canonical up to its first missing component, so
                // popping lands on the directory the kernel would reach.
                base.pop();
            }
            Component::Prefix(_) | Component::RootDir => base.push(component.as_os_str()),
            Component::Normal(name) => {
                base.push(name);
                base = follow(base, hops)?;
            }
        }
    }

    Some(base)
}

/// Canonicalize `path` if it exists; leave it as is if it does not.
fn follow(path: PathBuf, hops: &mut usize) -> Option<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Some(canonical);
    }

    // Missing entry, or a symlink whose target is missing or looping.
    let target = match fs::read_link(&path) {
        Ok(target) => target,
        Err(_) => return Some(path),
    };

    *hops += 1;
    if *hops > MAX_SYMLINK_HOPS {
        tracing::warn!("Too many symlinks while resolving {}", path.display());
        return None;
    }

    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    resolve_following(&parent.join(target), hops)
}
