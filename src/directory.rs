//! Directory entries and the 8.3 short name format.
//!
//! A directory is a cluster chain whose clusters are arrays of 32-byte
//! [`DirectoryEntry`] records. Entries are append-only: a name starting with
//! `0x00` marks the end of the directory, a name starting with `0xE5` marks a
//! deleted slot that may be reused.

use core::fmt;

use bitflags::bitflags;
use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, Unaligned};

use crate::transmute::{
    try_cast_bytes_ref_mut_offset, try_cast_bytes_ref_offset, try_cast_bytes_slice,
};
use crate::{ClusterChain, ClusterNumber, Error, Result, Volume};

const END_OF_DIRECTORY: u8 = 0x00;
const DELETED: u8 = 0xE5;

const BASE_LEN: usize = 8;
const EXTENSION_LEN: usize = 3;

/// An 11-byte, space padded, upper-case 8.3 name as stored on disk.
#[derive(Copy, Clone, PartialEq, Eq, AsBytes, FromBytes, Unaligned)]
#[repr(transparent)]
pub struct ShortName([u8; BASE_LEN + EXTENSION_LEN]);

impl ShortName {
    pub const fn from_raw(raw: [u8; 11]) -> Self {
        Self(raw)
    }

    /// Encodes a display name like `readme.txt`. The first `.` separates the
    /// base from the extension. The base is truncated to 8 characters, the
    /// extension to 3, and both are upper-cased and padded with spaces.
    pub fn from_display(name: &str) -> Self {
        let mut raw = [b' '; BASE_LEN + EXTENSION_LEN];

        // The dot entries can't be expressed as base + extension.
        if name == "." || name == ".." {
            raw[..name.len()].copy_from_slice(name.as_bytes());
            return Self(raw);
        }

        let (base, extension) = name.split_once('.').unwrap_or((name, ""));
        for (dst, src) in raw[..BASE_LEN].iter_mut().zip(base.bytes()) {
            *dst = src.to_ascii_uppercase();
        }
        for (dst, src) in raw[BASE_LEN..].iter_mut().zip(extension.bytes()) {
            *dst = src.to_ascii_uppercase();
        }
        Self(raw)
    }

    pub fn as_raw(&self) -> &[u8; 11] {
        &self.0
    }

    /// Splits the name into base and extension with the padding removed.
    pub fn decode(&self) -> (&str, &str) {
        let (base, extension) = self.0.split_at(BASE_LEN);
        (trim_padding(base), trim_padding(extension))
    }

    /// Case-insensitive comparison against a display name.
    pub fn matches(&self, name: &str) -> bool {
        *self == Self::from_display(name)
    }

    fn first_byte(&self) -> u8 {
        self.0[0]
    }
}

fn trim_padding(bytes: &[u8]) -> &str {
    let end = bytes
        .iter()
        .rposition(|&c| c != b' ' && c != 0)
        .map_or(0, |last| last + 1);
    core::str::from_utf8(&bytes[..end]).unwrap_or("<invalid UTF-8>")
}

/// Formats as `BASE.EXT`, or just `BASE` when there is no extension.
impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (base, extension) = self.decode();
        if extension.is_empty() {
            write!(f, "{base}")
        } else {
            write!(f, "{base}.{extension}")
        }
    }
}

impl fmt::Debug for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ShortName")
            .field(&core::str::from_utf8(&self.0).unwrap_or("<invalid UTF-8>"))
            .finish()
    }
}

/// <https://wiki.osdev.org/FAT#Standard_8.3_format>
#[derive(Debug, Copy, Clone, PartialEq, Eq, AsBytes, FromBytes, Unaligned)]
#[repr(transparent)]
pub struct Attributes(u8);

bitflags! {
    impl Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;

        /// Long file name entries set all of the low four bits.
        const LONG_NAME = 0x0F;
    }
}

/// See <https://wiki.osdev.org/FAT#Directories_on_FAT12.2F16.2F32>
#[derive(Debug, Copy, Clone, AsBytes, FromBytes, Unaligned)]
#[repr(C)]
pub struct DirectoryEntry {
    pub name: ShortName,
    pub attributes: Attributes,
    pub nt_reserved: u8,
    pub create_time_tenths: u8,
    pub create_time: U16<LittleEndian>,
    pub create_date: U16<LittleEndian>,
    pub access_date: U16<LittleEndian>,
    pub first_cluster_high: U16<LittleEndian>,
    pub write_time: U16<LittleEndian>,
    pub write_date: U16<LittleEndian>,
    pub first_cluster_low: U16<LittleEndian>,
    pub file_size: U32<LittleEndian>,
}

impl DirectoryEntry {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    /// A zero-size regular file with no clusters.
    pub fn new_file(name: ShortName) -> Self {
        let mut entry = Self::new_zeroed();
        entry.name = name;
        entry
    }

    pub fn name(&self) -> &ShortName {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = ShortName::from_display(name);
    }

    pub fn attributes(&self) -> Attributes {
        self.attributes
    }

    /// No entry at or after this one is in use.
    pub fn is_end_of_directory(&self) -> bool {
        self.name.first_byte() == END_OF_DIRECTORY
    }

    pub fn is_deleted(&self) -> bool {
        self.name.first_byte() == DELETED
    }

    /// The slot can hold a new entry.
    pub fn is_free(&self) -> bool {
        self.is_end_of_directory() || self.is_deleted()
    }

    pub fn is_long_name(&self) -> bool {
        self.attributes.contains(Attributes::LONG_NAME)
    }

    pub fn is_dir(&self) -> bool {
        !self.is_long_name() && self.attributes.contains(Attributes::DIRECTORY)
    }

    /// Entries that show up in a directory listing: not free, not part of a
    /// long file name, and not the volume label.
    pub fn is_visible(&self) -> bool {
        !self.is_free() && !self.is_long_name() && !self.attributes.contains(Attributes::VOLUME_ID)
    }

    pub fn first_cluster(&self) -> ClusterNumber {
        let high = u32::from(self.first_cluster_high.get());
        let low = u32::from(self.first_cluster_low.get());
        ClusterNumber((high << 16) | low)
    }

    /// Directory to descend into when walking a tree. `None` for files, the
    /// dot entries, and directories claiming cluster 0, which would lead back
    /// to the root.
    pub fn subdirectory(&self) -> Option<ClusterNumber> {
        let is_dot = self.name.matches(".") || self.name.matches("..");
        let cluster = self.first_cluster();
        (self.is_dir() && !is_dot && cluster.0 != 0).then_some(cluster)
    }

    pub fn set_first_cluster(&mut self, cluster: ClusterNumber) {
        self.first_cluster_high.set((cluster.0 >> 16) as u16);
        self.first_cluster_low.set(cluster.0 as u16);
    }

    pub fn file_size(&self) -> u32 {
        self.file_size.get()
    }

    pub fn set_file_size(&mut self, size: u32) {
        self.file_size.set(size);
    }
}

/// Location of a directory entry: the directory cluster that holds it and the
/// slot index within that cluster.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EntryHandle {
    pub cluster: ClusterNumber,
    pub index: usize,
}

impl<B: AsRef<[u8]>> Volume<B> {
    pub fn entries_per_cluster(&self) -> usize {
        self.bytes_per_cluster() / DirectoryEntry::SIZE
    }

    fn entry_offset(&self, handle: EntryHandle) -> Result<usize> {
        if handle.index >= self.entries_per_cluster() {
            return Err(Error::CorruptVolume("directory slot index past end of cluster"));
        }
        Ok(self.cluster_offset(handle.cluster)? + handle.index * DirectoryEntry::SIZE)
    }

    /// The slot after `handle` in directory order, which may be the first slot
    /// of the next cluster in the chain.
    fn following_slot(&self, handle: EntryHandle) -> Result<Option<EntryHandle>> {
        if handle.index + 1 < self.entries_per_cluster() {
            return Ok(Some(EntryHandle {
                cluster: handle.cluster,
                index: handle.index + 1,
            }));
        }
        Ok(self
            .next_cluster(handle.cluster)?
            .map(|cluster| EntryHandle { cluster, index: 0 }))
    }

    pub fn entry(&self, handle: EntryHandle) -> Result<&DirectoryEntry> {
        let offset = self.entry_offset(handle)?;
        try_cast_bytes_ref_offset(self.image(), offset)
            .ok_or(Error::ClusterOutOfRange(handle.cluster))
    }

    /// All entry slots of one directory cluster.
    pub fn directory_cluster(&self, cluster: ClusterNumber) -> Result<&[DirectoryEntry]> {
        try_cast_bytes_slice(self.cluster_bytes(cluster)?)
            .ok_or(Error::CorruptVolume("cluster size is not a multiple of the entry size"))
    }

    /// Iterates over the slots of a directory, in on-disk order, up to (not
    /// including) the first end-of-directory entry. Deleted and long name
    /// slots are included. Directory cluster `0` is the root directory.
    pub fn read_dir(&self, directory: ClusterNumber) -> DirectoryIter<'_, B> {
        DirectoryIter {
            volume: self,
            clusters: self.chain(self.directory_start(directory)),
            current: None,
            index: 0,
            done: false,
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Volume<B> {
    pub fn entry_mut(&mut self, handle: EntryHandle) -> Result<&mut DirectoryEntry> {
        let offset = self.entry_offset(handle)?;
        try_cast_bytes_ref_mut_offset(self.image_mut(), offset)
            .ok_or(Error::ClusterOutOfRange(handle.cluster))
    }

    /// Finds a free slot in a directory, growing the directory by one zeroed
    /// cluster when every existing slot is in use.
    ///
    /// Taking the end-of-directory slot moves the terminator one slot down, so
    /// stale records that followed it stay hidden.
    pub fn allocate_slot(&mut self, directory: ClusterNumber) -> Result<EntryHandle> {
        let directory = self.directory_start(directory);

        let mut tail = directory;
        let mut found = None;
        for cluster in self.chain(directory) {
            let cluster = cluster?;
            tail = cluster;
            let entries = self.directory_cluster(cluster)?;
            if let Some(index) = entries.iter().position(DirectoryEntry::is_free) {
                let handle = EntryHandle { cluster, index };
                found = Some((handle, entries[index].is_end_of_directory()));
                break;
            }
        }

        if let Some((handle, end_of_directory)) = found {
            if end_of_directory {
                if let Some(following) = self.following_slot(handle)? {
                    *self.entry_mut(following)? = DirectoryEntry::new_zeroed();
                }
            }
            return Ok(handle);
        }

        let cluster = self.extend_chain(tail, 1)?;
        self.cluster_bytes_mut(cluster)?.fill(0);
        log::debug!("grew directory {} with cluster {}", directory.0, cluster.0);
        Ok(EntryHandle { cluster, index: 0 })
    }
}

/// Iterator over directory slots, see [`Volume::read_dir`].
pub struct DirectoryIter<'a, B> {
    volume: &'a Volume<B>,
    clusters: ClusterChain<'a, B>,
    current: Option<(ClusterNumber, &'a [DirectoryEntry])>,
    index: usize,
    done: bool,
}

impl<'a, B: AsRef<[u8]>> Iterator for DirectoryIter<'a, B> {
    type Item = Result<(EntryHandle, &'a DirectoryEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if let Some((cluster, entries)) = self.current {
                if let Some(entry) = entries.get(self.index) {
                    let handle = EntryHandle {
                        cluster,
                        index: self.index,
                    };
                    self.index += 1;

                    // Nothing after the terminator is in use, not even in
                    // later clusters of the chain.
                    if entry.is_end_of_directory() {
                        self.done = true;
                        return None;
                    }
                    return Some(Ok((handle, entry)));
                }
            }

            let volume = self.volume;
            let next = self.clusters.next().map(|cluster| -> Result<_> {
                let cluster = cluster?;
                Ok((cluster, volume.directory_cluster(cluster)?))
            });
            match next {
                Some(Ok(current)) => {
                    self.current = Some(current);
                    self.index = 0;
                }
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                None => self.done = true,
            }
        }
        None
    }
}
