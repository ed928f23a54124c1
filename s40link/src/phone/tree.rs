//! Recursive traversal and bulk download.

use {
    super::{DirectoryEntry, Phone, child_path, dir_path},
    crate::{
        error::{Error, Result},
        port::Port,
    },
    log::{debug, info, warn},
    std::{
        fs::{self, File},
        path::Path,
    },
};

/// Whether `name` can be used as a single host path component.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

impl<P: Port> Phone<P> {
    /// Visit the usable entries of `dir` depth-first.
    ///
    /// `visit` receives the entry's full path, its depth (0 for direct
    /// children of `dir`) and the entry. With `recursive`, every directory
    /// is descended into right after it has been visited.
    pub fn walk(
        &self,
        dir: &str,
        recursive: bool,
        visit: &mut dyn FnMut(&str, usize, &DirectoryEntry),
    ) -> Result<()> {
        self.walk_at(dir, recursive, 0, visit)
    }

    fn walk_at(
        &self,
        dir: &str,
        recursive: bool,
        depth: usize,
        visit: &mut dyn FnMut(&str, usize, &DirectoryEntry),
    ) -> Result<()> {
        for entry in self.list(dir)? {
            let Some(name) = entry.name() else {
                continue;
            };
            let path = child_path(dir, name);
            visit(&path, depth, &entry);
            if recursive && entry.is_directory() {
                self.walk_at(&path, true, depth + 1, visit)?;
            }
        }
        Ok(())
    }

    /// Download every file of `remote_dir` into `host_dir`.
    ///
    /// With `recursive`, sub-directories are mirrored as host directories
    /// carrying the phone's modification time. `on_file` is called with
    /// the remote path of every file before it is fetched. Returns the
    /// number of files fetched.
    pub fn dump(
        &self,
        remote_dir: &str,
        host_dir: &Path,
        recursive: bool,
        on_file: &mut dyn FnMut(&str),
    ) -> Result<usize> {
        let remote_dir = dir_path(remote_dir);
        let entries = self.list(&remote_dir)?;
        fs::create_dir_all(host_dir).map_err(|e| {
            Error::Transfer(format!("cannot create {}: {e}", host_dir.display()))
        })?;

        let mut count = 0;
        for entry in entries {
            let (info, is_dir) = match &entry {
                DirectoryEntry::File(info) => (info, false),
                DirectoryEntry::Directory(info) if recursive => (info, true),
                _ => continue,
            };
            if !is_safe_name(&info.name) {
                warn!("Skipping entry with unusable name {:?}", info.name);
                continue;
            }

            let remote = child_path(&remote_dir, &info.name);
            let local = host_dir.join(&info.name);
            if is_dir {
                count += self.dump(&remote, &local, true, on_file)?;
                if let Some(mtime) = info.timestamp.system_time() {
                    // Directories cannot be opened for writing everywhere
                    if let Err(e) = File::open(&local).and_then(|d| d.set_modified(mtime)) {
                        debug!("Could not set modification time of {}: {e}", local.display());
                    }
                }
            } else {
                on_file(&remote);
                self.get_to_file(&remote, &local, &mut |_, _| {})?;
                count += 1;
            }
        }

        info!("Dumped {count} files from {remote_dir}");
        Ok(count)
    }
}
