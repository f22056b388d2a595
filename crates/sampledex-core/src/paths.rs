//! Translation between drive-letter paths (`D:\Samples\kick.wav`) and
//! mount-point paths (`/mnt/d/Samples/kick.wav`).
//!
//! Sample databases are shared between the host environment, which sees
//! drive letters, and the secondary analysis environment, which sees the
//! same drives mounted under `/mnt`. Record ids keep whatever convention
//! the sample was indexed with; these helpers translate at the boundary.

use std::path::{Path, PathBuf};

const MOUNT_ROOT: &str = "/mnt/";

/// Split `X:rest` into the lowercase drive letter and `rest`.
fn split_drive(path: &str) -> Option<(char, &str)> {
    let mut chars = path.chars();
    let letter = chars.next()?;
    if !letter.is_ascii_alphabetic() || chars.next()? != ':' {
        return None;
    }
    let rest = &path[2..];
    if rest.is_empty() || rest.starts_with(['\\', '/']) {
        Some((letter.to_ascii_lowercase(), rest))
    } else {
        None
    }
}

/// Split `/mnt/x/rest` into the drive letter and `rest` (without the
/// leading slash).
fn split_mount(path: &str) -> Option<(char, &str)> {
    let after = path.strip_prefix(MOUNT_ROOT)?;
    let mut chars = after.chars();
    let letter = chars.next()?;
    if !letter.is_ascii_alphabetic() {
        return None;
    }
    let rest = &after[1..];
    if rest.is_empty() {
        Some((letter, ""))
    } else {
        rest.strip_prefix('/').map(|rest| (letter, rest))
    }
}

/// Whether `path` uses the drive-letter convention.
#[must_use]
pub fn is_drive_style(path: &str) -> bool {
    split_drive(path).is_some()
}

/// Whether `path` uses the mount-point convention.
#[must_use]
pub fn is_mount_style(path: &str) -> bool {
    split_mount(path).is_some()
}

/// `D:\Samples\kick.wav` → `/mnt/d/Samples/kick.wav`.
///
/// Paths that are not drive-letter style are returned unchanged.
#[must_use]
pub fn to_mount_style(path: &str) -> String {
    match split_drive(path) {
        Some((letter, rest)) => {
            let rest = rest.replace('\\', "/");
            let rest = rest.trim_end_matches('/');
            format!("{MOUNT_ROOT}{letter}{rest}")
        }
        None => path.to_string(),
    }
}

/// `/mnt/d/Samples/kick.wav` → `D:\Samples\kick.wav`.
///
/// Paths that are not mount-point style are returned unchanged.
#[must_use]
pub fn to_drive_style(path: &str) -> String {
    match split_mount(path) {
        Some((letter, rest)) => {
            format!("{}:\\{}", letter.to_ascii_uppercase(), rest.replace('/', "\\"))
        }
        None => path.to_string(),
    }
}

/// Like [`to_drive_style`] but keeps forward slashes: `D:/Samples/kick.wav`.
#[must_use]
pub fn to_drive_style_forward(path: &str) -> String {
    to_drive_style(path).replace('\\', "/")
}

/// Build the `file://` URL handed to other applications when a sample is
/// dragged out.
///
/// Mount-point paths are converted to drive-letter form first, since the
/// receiving application lives on the host side.
#[must_use]
pub fn to_file_url(path: &str) -> String {
    let host_path = if is_mount_style(path) || is_drive_style(path) {
        to_drive_style_forward(path)
    } else {
        path.to_string()
    };

    let mut url = String::from("file://");
    if !host_path.starts_with('/') {
        url.push('/');
    }
    for c in host_path.chars() {
        match c {
            ' ' => url.push_str("%20"),
            '%' => url.push_str("%25"),
            '#' => url.push_str("%23"),
            '?' => url.push_str("%3F"),
            _ => url.push(c),
        }
    }
    url
}

/// Return the first of `path` and its other-convention twin that exists on
/// this machine.
#[must_use]
pub fn resolve_existing(path: &Path) -> Option<PathBuf> {
    if path.exists() {
        return Some(path.to_path_buf());
    }

    let text = path.to_string_lossy();
    let twin = if is_mount_style(&text) {
        to_drive_style(&text)
    } else if is_drive_style(&text) {
        to_mount_style(&text)
    } else {
        return None;
    };

    let twin = PathBuf::from(twin);
    twin.exists().then_some(twin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_to_mount() {
        assert_eq!(to_mount_style("D:\\Samples\\kick.wav"), "/mnt/d/Samples/kick.wav");
        assert_eq!(to_mount_style("d:/Samples/kick.wav"), "/mnt/d/Samples/kick.wav");
        assert_eq!(to_mount_style("C:"), "/mnt/c");
        assert_eq!(to_mount_style("C:\\"), "/mnt/c");
    }

    #[test]
    fn test_non_drive_paths_unchanged() {
        assert_eq!(to_mount_style("/home/user/kick.wav"), "/home/user/kick.wav");
        assert_eq!(to_mount_style("./sample_db"), "./sample_db");
        assert_eq!(to_mount_style("D:relative"), "D:relative");
        assert_eq!(to_mount_style("12:30"), "12:30");
    }

    #[test]
    fn test_mount_to_drive() {
        assert_eq!(to_drive_style("/mnt/d/Samples/kick.wav"), "D:\\Samples\\kick.wav");
        assert_eq!(to_drive_style("/mnt/c"), "C:\\");
        assert_eq!(to_drive_style_forward("/mnt/e/a/b.wav"), "E:/a/b.wav");
    }

    #[test]
    fn test_non_mount_paths_unchanged() {
        assert_eq!(to_drive_style("/mnt/data/kick.wav"), "/mnt/data/kick.wav");
        assert_eq!(to_drive_style("/mnt/"), "/mnt/");
        assert_eq!(to_drive_style("/home/user"), "/home/user");
    }

    #[test]
    fn test_round_trip_is_idempotent() {
        let paths = [
            "D:\\Samples\\Drums\\kick 01.wav",
            "c:\\a",
            "Z:\\deep\\nested\\path\\snare.aiff",
        ];
        for path in paths {
            let mount = to_mount_style(path);
            assert_eq!(to_mount_style(&mount), mount);
            let back = to_drive_style(&mount);
            let mut expected = path.to_string();
            expected.replace_range(0..1, &path[0..1].to_ascii_uppercase());
            assert_eq!(back, expected);
            assert_eq!(to_mount_style(&back), mount);
        }
    }

    #[test]
    fn test_file_url() {
        assert_eq!(
            to_file_url("/mnt/d/Samples/kick a.wav"),
            "file:///D:/Samples/kick%20a.wav"
        );
        assert_eq!(to_file_url("D:\\Samples\\kick.wav"), "file:///D:/Samples/kick.wav");
        assert_eq!(to_file_url("/home/u/hat#1.wav"), "file:///home/u/hat%231.wav");
    }

    #[test]
    fn test_resolve_existing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("kick.wav");
        std::fs::write(&file, b"x").unwrap();
        assert_eq!(resolve_existing(&file), Some(file.clone()));
        assert_eq!(resolve_existing(&dir.path().join("missing.wav")), None);
    }
}
