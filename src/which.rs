//! Executability Probe & Path Search
//!
//! Resolves a command name to a full path by walking the `path` variable,
//! with a UID/GID/group-list aware permission test and a memoizing cache.
//! Cache entries record only the directory that won; any mutation of
//! `path` must flush the whole cache (the walker enforces this), and a
//! command that fails at run time is re-probed and purged via
//! `verify_cmd` so a replacement elsewhere on `path` can be found.

use nix::errno::Errno;
use nix::unistd::{getegid, geteuid, getgroups};

use crate::tables::hash::HashTable;
use crate::tables::vars::VarTable;

/// Identity of the shell process, cached on first use.
struct Perms {
    uid: u32,
    gid: u32,
    groups: Vec<u32>,
}

lazy_static::lazy_static! {
    static ref PERMS: Perms = Perms {
        uid: geteuid().as_raw(),
        gid: getegid().as_raw(),
        groups: getgroups()
            .map(|gs| gs.iter().map(|g| g.as_raw()).collect())
            .unwrap_or_default(),
    };
}

/// Command-name to directory memo. Directories are owned copies of the
/// `path` elements that resolved them.
pub struct PathCache {
    table: HashTable<String>,
}

impl PathCache {
    pub fn new() -> Self {
        Self { table: HashTable::new() }
    }

    pub fn get(&self, cmd: &str) -> Option<&str> {
        self.table.get(cmd).map(|s| s.as_str())
    }

    pub fn set(&mut self, cmd: &str, dir: &str) {
        self.table.insert(cmd, dir.to_string());
    }

    pub fn delete(&mut self, cmd: &str) {
        self.table.delete(cmd);
    }

    /// Empty the cache. Required after any mutation of `path`.
    pub fn reset(&mut self) {
        self.table.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a user-supplied name for a diagnostic: control bytes become `?`.
pub fn printable(name: &str) -> String {
    name.chars()
        .map(|c| if (c as u32) < 0x20 || c == '\u{7f}' { '?' } else { c })
        .collect()
}

/// A name that bypasses the path search: absolute, or explicitly relative
/// to the current or parent directory.
pub fn is_qualified(name: &str) -> bool {
    name.starts_with('/')
        || name == "."
        || name == ".."
        || name.starts_with("./")
        || name.starts_with("../")
}

/// Join a path element and a command name. An empty element means the
/// current directory. Slashes already present are kept as-is; in
/// particular a leading `//` survives.
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Split a colon-separated PATH string into `path` elements. Empty
/// elements are kept (they mean the current directory) and slashes are
/// never collapsed.
pub fn split_path_env(path: &str) -> Vec<String> {
    path.split(':').map(String::from).collect()
}

/// The inverse: `path` elements back into a PATH string.
pub fn join_path_env(dirs: &[String]) -> String {
    dirs.join(":")
}

/// Can this process execute `path`? Selects the owner, group, or other
/// execute bit by comparing the file's ownership against the cached
/// identity; root may execute anything with any execute bit set. Only
/// regular files qualify.
pub fn rc_access(path: &str, verbose: bool) -> bool {
    let mut st = std::mem::MaybeUninit::<libc::stat>::uninit();
    let cpath = match std::ffi::CString::new(path) {
        Ok(c) => c,
        Err(_) => return false,
    };
    let rc = unsafe { libc::stat(cpath.as_ptr(), st.as_mut_ptr()) };
    if rc != 0 {
        if verbose {
            eprintln!("rc: {}: {}", printable(path), Errno::last().desc());
        }
        return false;
    }
    let st = unsafe { st.assume_init() };
    let mask: u32 = if PERMS.uid == 0 {
        0o111
    } else if st.st_uid == PERMS.uid {
        0o100
    } else if st.st_gid == PERMS.gid || PERMS.groups.contains(&st.st_gid) {
        0o010
    } else {
        0o001
    };
    let mode = st.st_mode as u32;
    if mode & (libc::S_IFMT as u32) == libc::S_IFREG as u32 && mode & mask != 0 {
        return true;
    }
    if verbose {
        eprintln!("rc: {}: {}", printable(path), Errno::EACCES.desc());
    }
    false
}

/// Resolve a command name to a full path. A missing name resolves to
/// nothing (this is what makes a bare redirection legal); a qualified
/// name skips the search; a cache hit skips the probe; otherwise the
/// `path` variable is walked in order and the first directory that
/// passes the probe is memoized.
pub fn which(
    name: Option<&str>,
    verbose: bool,
    vars: &VarTable,
    cache: &mut PathCache,
) -> Option<String> {
    let name = name?;
    if is_qualified(name) {
        if rc_access(name, verbose) {
            return Some(name.to_string());
        }
        return None;
    }
    if let Some(dir) = cache.get(name) {
        return Some(join(dir, name));
    }
    if let Some(dirs) = vars.get("path") {
        for dir in dirs {
            let full = join(dir, name);
            if rc_access(&full, false) {
                cache.set(name, dir);
                return Some(full);
            }
        }
    }
    if verbose {
        eprintln!("rc: cannot find `{}'", printable(name));
    }
    None
}

/// Called after an external command exits non-zero: if its cached path no
/// longer passes the probe, drop it so the next invocation searches anew.
pub fn verify_cmd(name: &str, fullpath: &str, cache: &mut PathCache) {
    if !rc_access(fullpath, false) {
        cache.delete(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rc-which-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn plant(dir: &std::path::Path, name: &str, mode: u32) -> String {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn path_vars(dirs: &[&str]) -> VarTable {
        let mut vars = VarTable::new();
        vars.set("path", dirs.iter().map(|s| s.to_string()).collect(), false);
        vars
    }

    #[test]
    fn test_rc_access_executable_file() {
        let dir = scratch_dir("access");
        let exe = plant(&dir, "tool", 0o755);
        assert!(rc_access(&exe, false));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rc_access_rejects_plain_file_and_directory() {
        let dir = scratch_dir("reject");
        let plain = plant(&dir, "data", 0o644);
        assert!(!rc_access(&plain, false));
        assert!(!rc_access(&dir.to_string_lossy(), false));
        assert!(!rc_access("/no/such/file/anywhere", false));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_is_qualified() {
        assert!(is_qualified("/bin/ls"));
        assert!(is_qualified("./tool"));
        assert!(is_qualified("../tool"));
        assert!(is_qualified("."));
        assert!(!is_qualified("ls"));
        assert!(!is_qualified("dir/tool"));
    }

    #[test]
    fn test_join_rules() {
        assert_eq!(join("/bin", "ls"), "/bin/ls");
        assert_eq!(join("/bin/", "ls"), "/bin/ls");
        assert_eq!(join("", "ls"), "ls");
        assert_eq!(join("//net", "ls"), "//net/ls");
    }

    #[test]
    fn test_split_path_env_preserves_shape() {
        assert_eq!(split_path_env("/bin:/usr/bin"), vec!["/bin", "/usr/bin"]);
        assert_eq!(split_path_env(":/bin:"), vec!["", "/bin", ""]);
        assert_eq!(split_path_env("//net/bin"), vec!["//net/bin"]);
        assert_eq!(
            join_path_env(&["".to_string(), "/bin".to_string()]),
            ":/bin"
        );
    }

    #[test]
    fn test_which_walks_path_in_order() {
        let first = scratch_dir("order1");
        let second = scratch_dir("order2");
        plant(&second, "tool", 0o755);
        let vars = path_vars(&[&first.to_string_lossy(), &second.to_string_lossy()]);
        let mut cache = PathCache::new();
        let found = which(Some("tool"), false, &vars, &mut cache).unwrap();
        assert_eq!(found, second.join("tool").to_string_lossy());
        assert_eq!(cache.get("tool"), Some(&*second.to_string_lossy()));
        let _ = fs::remove_dir_all(&first);
        let _ = fs::remove_dir_all(&second);
    }

    #[test]
    fn test_which_missing_name_and_absent_command() {
        let vars = path_vars(&["/nonexistent"]);
        let mut cache = PathCache::new();
        assert_eq!(which(None, false, &vars, &mut cache), None);
        assert_eq!(which(Some("no-such-tool"), false, &vars, &mut cache), None);
    }

    #[test]
    fn test_which_cache_hit_skips_probe() {
        let dir = scratch_dir("memo");
        let exe = plant(&dir, "tool", 0o755);
        let vars = path_vars(&[&dir.to_string_lossy()]);
        let mut cache = PathCache::new();
        assert!(which(Some("tool"), false, &vars, &mut cache).is_some());
        // The file is gone, but the memoized directory still answers.
        fs::remove_file(&exe).unwrap();
        assert_eq!(
            which(Some("tool"), false, &vars, &mut cache),
            Some(join(&dir.to_string_lossy(), "tool"))
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_verify_cmd_purges_stale_entry() {
        let dir = scratch_dir("stale");
        let other = scratch_dir("fresh");
        let exe = plant(&dir, "tool", 0o755);
        let vars = path_vars(&[&dir.to_string_lossy(), &other.to_string_lossy()]);
        let mut cache = PathCache::new();
        let first = which(Some("tool"), false, &vars, &mut cache).unwrap();
        fs::remove_file(&exe).unwrap();
        plant(&other, "tool", 0o755);
        verify_cmd("tool", &first, &mut cache);
        assert_eq!(cache.get("tool"), None);
        // The replacement further down `path` is now discoverable.
        let second = which(Some("tool"), false, &vars, &mut cache).unwrap();
        assert_eq!(second, join(&other.to_string_lossy(), "tool"));
        let _ = fs::remove_dir_all(&dir);
        let _ = fs::remove_dir_all(&other);
    }

    #[test]
    fn test_printable_masks_control_bytes() {
        assert_eq!(printable("ok"), "ok");
        assert_eq!(printable("a\x01b\nc"), "a?b?c");
    }
}
