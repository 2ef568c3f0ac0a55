use crate::path::{absolute_path, next_path_element};
use crate::{ClusterNumber, DirectoryEntry, EntryHandle, Error, Result, ShortName, Volume};

/// A directory entry found by a lookup: where it lives, and a copy of the
/// entry as it was read.
#[derive(Debug, Copy, Clone)]
pub struct FoundEntry {
    pub handle: EntryHandle,
    pub entry: DirectoryEntry,
}

/// Outcome of [`Volume::find`]. A miss is not an error.
#[derive(Debug, Copy, Clone)]
pub struct Lookup {
    pub found: Option<FoundEntry>,

    /// The last path element that was looked at was followed by a `/`. When
    /// `found` is a regular file this means the path used a file as if it
    /// were a directory.
    pub trailing_element: bool,
}

impl<B: AsRef<[u8]>> Volume<B> {
    /// Resolves `path` element by element. An absolute path, or a `start` of
    /// cluster `0`, starts at the root directory.
    ///
    /// Within a directory the first entry with a matching name wins. If it is
    /// a directory and more elements remain, the search descends into it;
    /// otherwise it is the result. Sibling directories are never searched.
    pub fn find(&self, path: &str, start: ClusterNumber) -> Result<Lookup> {
        let (mut directory, mut rest) = match path.strip_prefix('/') {
            Some(rest) => (self.root_cluster(), rest),
            None => (self.directory_start(start), path),
        };

        loop {
            let (element, next) = next_path_element(rest);
            let trailing_element = next.is_some();
            let query = ShortName::from_display(element);

            let mut matched = None;
            for item in self.read_dir(directory) {
                let (handle, entry) = item?;
                if !entry.is_long_name() && *entry.name() == query {
                    matched = Some(FoundEntry {
                        handle,
                        entry: *entry,
                    });
                    break;
                }
            }

            let Some(found) = matched else {
                return Ok(Lookup {
                    found: None,
                    trailing_element,
                });
            };

            match next {
                Some(remaining) if found.entry.is_dir() && !remaining.is_empty() => {
                    directory = self.directory_start(found.entry.first_cluster());
                    rest = remaining;
                }
                _ => {
                    return Ok(Lookup {
                        found: Some(found),
                        trailing_element,
                    })
                }
            }
        }
    }

    /// First cluster of the directory at `path`, which is resolved against the
    /// current directory.
    pub fn resolve_directory(&self, path: &str) -> Result<ClusterNumber> {
        let path = absolute_path(self.current_directory(), Some(path));
        if path == "/" {
            return Ok(self.root_cluster());
        }

        match self.find(&path, self.root_cluster())?.found {
            Some(FoundEntry { entry, .. }) if entry.is_dir() => {
                Ok(self.directory_start(entry.first_cluster()))
            }
            _ => Err(Error::NoSuchEntry),
        }
    }
}
