//! Reading file contents by following the cluster chain.

use crate::{ClusterNumber, DirectoryEntry, Result, Volume};

impl<B: AsRef<[u8]>> Volume<B> {
    /// Number of bytes of `entry` that `load_all` and friends will deliver.
    /// Directories record a size of zero, so they are read by chain length.
    fn readable_len(entry: &DirectoryEntry, buffer_len: usize) -> usize {
        if entry.is_dir() {
            buffer_len
        } else {
            buffer_len.min(entry.file_size() as usize)
        }
    }

    /// Copies the contents of `entry` into `destination`, one cluster at a
    /// time, and returns the number of bytes copied. A result shorter than the
    /// destination means the end of the file was reached.
    pub fn load_all(&self, entry: &DirectoryEntry, destination: &mut [u8]) -> Result<usize> {
        let len = Self::readable_len(entry, destination.len());
        let destination = &mut destination[..len];

        let mut copied = 0;
        for cluster in self.chain(entry.first_cluster()) {
            if copied == destination.len() {
                break;
            }
            let data = self.cluster_bytes(cluster?)?;
            let n = data.len().min(destination.len() - copied);
            destination[copied..copied + n].copy_from_slice(&data[..n]);
            copied += n;
        }

        if copied < len && !entry.is_dir() {
            log::warn!(
                "cluster chain of {} ends after {copied} of {} bytes",
                entry.name(),
                entry.file_size()
            );
        }
        Ok(copied)
    }

    /// Reads from `entry` starting at byte `offset`, without keeping any
    /// cursor state. Returns the number of bytes read, `0` at end of file.
    pub fn read_at(
        &self,
        entry: &DirectoryEntry,
        offset: usize,
        buffer: &mut [u8],
    ) -> Result<usize> {
        let bytes_per_cluster = self.bytes_per_cluster();
        let end = Self::readable_len(entry, offset.saturating_add(buffer.len()));
        if offset >= end {
            return Ok(0);
        }
        let buffer = &mut buffer[..end - offset];

        let skip = offset / bytes_per_cluster;
        let mut cluster_offset = offset % bytes_per_cluster;
        let mut copied = 0;
        for (index, cluster) in self.chain(entry.first_cluster()).enumerate() {
            let cluster = cluster?;
            if index < skip {
                continue;
            }
            if copied == buffer.len() {
                break;
            }
            let data = &self.cluster_bytes(cluster)?[cluster_offset..];
            let n = data.len().min(buffer.len() - copied);
            buffer[copied..copied + n].copy_from_slice(&data[..n]);
            copied += n;
            cluster_offset = 0;
        }
        Ok(copied)
    }

    pub fn open_descriptor(&self, entry: &DirectoryEntry) -> FileDescriptor {
        FileDescriptor::new(*entry)
    }
}

/// Forward-only read cursor over one file.
///
/// The descriptor holds a copy of the directory entry and its position in the
/// cluster chain. It does not borrow the volume, so the volume is passed to
/// every [`FileDescriptor::read`] call.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    entry: DirectoryEntry,

    /// Whether the first cluster has been looked up yet.
    started: bool,

    /// Cluster holding the next byte to read. `None` once the chain ends.
    cluster: Option<ClusterNumber>,

    /// Offset of the next byte within `cluster`.
    cluster_offset: usize,

    /// Total bytes delivered so far.
    position: usize,
}

impl FileDescriptor {
    pub fn new(entry: DirectoryEntry) -> Self {
        Self {
            entry,
            started: false,
            cluster: None,
            cluster_offset: 0,
            position: 0,
        }
    }

    pub fn entry(&self) -> &DirectoryEntry {
        &self.entry
    }

    pub fn size(&self) -> usize {
        self.entry.file_size() as usize
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Reads up to `buffer.len()` bytes, continuing where the previous call
    /// stopped. Returns `0` once the file's size has been delivered.
    pub fn read<B: AsRef<[u8]>>(&mut self, volume: &Volume<B>, buffer: &mut [u8]) -> Result<usize> {
        if !self.started {
            let first = self.entry.first_cluster();
            self.cluster = (first.0 != 0).then_some(first);
            self.started = true;
        }

        let len = buffer.len().min(self.size() - self.position);

        let mut copied = 0;
        while copied < len {
            match self.read_cluster(volume, &mut buffer[copied..len]) {
                Ok(0) => break,
                Ok(n) => copied += n,
                // Hand out what was copied. The next call reports the error.
                Err(_) if copied > 0 => break,
                Err(err) => return Err(err),
            }
        }

        Ok(copied)
    }

    /// Copies from the current cluster, moving on to the next cluster of the
    /// chain first if the current one is used up. Returns `0` once the chain
    /// ends. The cursor only moves past bytes that were copied.
    fn read_cluster<B: AsRef<[u8]>>(
        &mut self,
        volume: &Volume<B>,
        buffer: &mut [u8],
    ) -> Result<usize> {
        let Some(mut cluster) = self.cluster else {
            return Ok(0);
        };

        if self.cluster_offset == volume.bytes_per_cluster() {
            let Some(next) = volume.next_cluster(cluster)? else {
                log::warn!(
                    "cluster chain of {} ends at byte {} of {}",
                    self.entry.name(),
                    self.position,
                    self.size()
                );
                self.cluster = None;
                return Ok(0);
            };
            cluster = next;
            self.cluster = Some(next);
            self.cluster_offset = 0;
        }

        let data = &volume.cluster_bytes(cluster)?[self.cluster_offset..];
        let n = data.len().min(buffer.len());
        buffer[..n].copy_from_slice(&data[..n]);
        self.position += n;
        self.cluster_offset += n;
        Ok(n)
    }
}
