use crate::path::split_parent;
use crate::{DirectoryEntry, Error, FoundEntry, Result, ShortName, Volume};

impl<B: AsRef<[u8]> + AsMut<[u8]>> Volume<B> {
    /// Creates an empty file. The parent directory is resolved from the root;
    /// a path without any `/` creates the file in the root directory.
    ///
    /// An existing entry with the same name is not detected. Callers that care
    /// should `find` first.
    pub fn create_file(&mut self, path: &str) -> Result<FoundEntry> {
        let (parent, leaf) = split_parent(path);
        if leaf.is_empty() {
            return Err(Error::IsDirectory);
        }

        let directory = match parent {
            None | Some("") => self.root_cluster(),
            Some(parent) => match self.find(parent, self.root_cluster())?.found {
                Some(FoundEntry { entry, .. }) if entry.is_dir() => {
                    self.directory_start(entry.first_cluster())
                }
                _ => {
                    log::debug!("can't create {path}: parent directory {parent} not found");
                    return Err(Error::NoSuchEntry);
                }
            },
        };

        let handle = self.allocate_slot(directory)?;
        let entry = DirectoryEntry::new_file(ShortName::from_display(leaf));
        *self.entry_mut(handle)? = entry;
        log::debug!(
            "created {} in directory {} slot {}",
            entry.name(),
            handle.cluster.0,
            handle.index
        );

        Ok(FoundEntry { handle, entry })
    }
}
