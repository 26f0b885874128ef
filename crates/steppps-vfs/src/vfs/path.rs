//! Path normalization.
//!
//! VFS paths are plain `/`-separated strings. A normalized path always starts
//! with `/`, has no trailing slash (except the root itself), no empty
//! segments, and no `.` or `..` segments. `..` at the root stays at the root.

use super::error::{VfsError, VfsResult};

/// The root path.
pub const ROOT: &str = "/";

/// Normalize an absolute path.
///
/// Fails with `InvalidPath` for empty or relative input.
pub fn normalize(path: &str) -> VfsResult<String> {
    if !path.starts_with('/') {
        return Err(VfsError::invalid_path(path));
    }
    Ok(collapse(path.split('/')))
}

/// Resolve `path` against `cwd` and normalize the result.
///
/// Absolute paths ignore `cwd`. `cwd` is expected to be normalized already.
pub fn resolve(cwd: &str, path: &str) -> String {
    if path.starts_with('/') {
        collapse(path.split('/'))
    } else {
        collapse(cwd.split('/').chain(path.split('/')))
    }
}

fn collapse<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for segment in segments {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            s => stack.push(s),
        }
    }
    if stack.is_empty() {
        ROOT.to_string()
    } else {
        let mut out = String::new();
        for s in stack {
            out.push('/');
            out.push_str(s);
        }
        out
    }
}

/// Parent of a normalized path. `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Last segment of a normalized path. Empty for the root.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Join a child name onto a normalized directory path.
pub fn join(dir: &str, name: &str) -> String {
    if dir == ROOT {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// True if `path` equals `prefix` or lies beneath it, on segment boundaries.
///
/// `/data/x` is under `/data`; `/database` is not.
pub fn is_under(path: &str, prefix: &str) -> bool {
    if prefix == ROOT {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Strip a mount prefix, re-rooting the remainder at `/`.
pub fn strip_mount(path: &str, mount: &str) -> String {
    if mount == ROOT {
        return path.to_string();
    }
    match path.strip_prefix(mount) {
        Some("") | None => ROOT.to_string(),
        Some(rest) => rest.to_string(),
    }
}
