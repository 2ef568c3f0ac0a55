//! In-memory FAT32 images for tests.

use alloc::vec;
use alloc::vec::Vec;

use crate::Volume;

/// Builds a small FAT32 volume: 512-byte sectors, one sector per cluster, two
/// FATs of one sector each, and the root directory in cluster 2.
pub(crate) struct ImageBuilder {
    image: Vec<u8>,
}

impl ImageBuilder {
    pub(crate) const BYTES_PER_SECTOR: usize = 512;
    pub(crate) const RESERVED_SECTORS: u16 = 32;
    pub(crate) const FAT_SECTORS: u32 = 1;
    pub(crate) const DEFAULT_CLUSTERS: u32 = 64;

    pub(crate) const ATTR_DIRECTORY: u8 = 0x10;

    const FAT_OFFSET: usize = Self::RESERVED_SECTORS as usize * Self::BYTES_PER_SECTOR;
    const DATA_OFFSET: usize = (Self::RESERVED_SECTORS as usize + 2 * Self::FAT_SECTORS as usize)
        * Self::BYTES_PER_SECTOR;

    pub(crate) fn new() -> Self {
        let total_sectors =
            Self::DATA_OFFSET / Self::BYTES_PER_SECTOR + Self::DEFAULT_CLUSTERS as usize;
        let mut image = vec![0u8; total_sectors * Self::BYTES_PER_SECTOR];

        image[0..3].copy_from_slice(&[0xEB, 0x58, 0x90]);
        image[3..11].copy_from_slice(b"MSWIN4.1");
        image[11..13].copy_from_slice(&(Self::BYTES_PER_SECTOR as u16).to_le_bytes());
        image[13] = 1;
        image[14..16].copy_from_slice(&Self::RESERVED_SECTORS.to_le_bytes());
        image[16] = 2;
        image[21] = 0xF8;
        image[32..36].copy_from_slice(&(total_sectors as u32).to_le_bytes());
        image[36..40].copy_from_slice(&Self::FAT_SECTORS.to_le_bytes());
        image[44..48].copy_from_slice(&2_u32.to_le_bytes());
        image[66] = 0x29;
        image[71..82].copy_from_slice(b"TEST VOLUME");
        image[82..90].copy_from_slice(b"FAT32   ");
        image[510] = 0x55;
        image[511] = 0xAA;

        Self { image }
            .fat_entry(0, 0x0FFF_FFF8)
            .fat_entry(1, 0x0FFF_FFFF)
            .fat_entry(2, 0x0FFF_FFFF)
    }

    pub(crate) fn cluster_offset(cluster: u32) -> usize {
        Self::DATA_OFFSET + (cluster as usize - 2) * Self::BYTES_PER_SECTOR
    }

    /// Writes a raw value into the first FAT.
    pub(crate) fn fat_entry(mut self, cluster: u32, raw: u32) -> Self {
        let offset = Self::FAT_OFFSET + cluster as usize * 4;
        self.image[offset..offset + 4].copy_from_slice(&raw.to_le_bytes());
        self
    }

    /// Links the given clusters in order and terminates the chain.
    pub(crate) fn chain(mut self, clusters: &[u32]) -> Self {
        for pair in clusters.windows(2) {
            self = self.fat_entry(pair[0], pair[1]);
        }
        if let Some(&last) = clusters.last() {
            self = self.fat_entry(last, 0x0FFF_FFFF);
        }
        self
    }

    /// Writes raw bytes into a cluster.
    pub(crate) fn bytes(mut self, cluster: u32, offset: usize, bytes: &[u8]) -> Self {
        let start = Self::cluster_offset(cluster) + offset;
        self.image[start..start + bytes.len()].copy_from_slice(bytes);
        self
    }

    /// Writes a 32-byte directory entry into slot `index` of `dir_cluster`.
    pub(crate) fn entry(
        self,
        dir_cluster: u32,
        index: usize,
        name: &[u8; 11],
        attributes: u8,
        first_cluster: u32,
        size: u32,
    ) -> Self {
        let mut record = [0u8; 32];
        record[0..11].copy_from_slice(name);
        record[11] = attributes;
        record[20..22].copy_from_slice(&((first_cluster >> 16) as u16).to_le_bytes());
        record[26..28].copy_from_slice(&(first_cluster as u16).to_le_bytes());
        record[28..32].copy_from_slice(&size.to_le_bytes());
        self.bytes(dir_cluster, index * 32, &record)
    }

    /// Adds a regular file whose contents are spread over `clusters`.
    pub(crate) fn file(
        mut self,
        dir_cluster: u32,
        index: usize,
        name: &[u8; 11],
        clusters: &[u32],
        contents: &[u8],
    ) -> Self {
        assert!(
            contents.len() <= clusters.len() * Self::BYTES_PER_SECTOR,
            "file contents don't fit in {} clusters",
            clusters.len()
        );
        self = self.chain(clusters);
        for (cluster, chunk) in clusters.iter().zip(contents.chunks(Self::BYTES_PER_SECTOR)) {
            self = self.bytes(*cluster, 0, chunk);
        }
        let first = clusters.first().copied().unwrap_or(0);
        self.entry(dir_cluster, index, name, 0x20, first, contents.len() as u32)
    }

    /// Adds a subdirectory with `.` and `..` entries in its first two slots.
    /// `parent` is 0 when the parent is the root directory.
    pub(crate) fn directory(
        self,
        dir_cluster: u32,
        index: usize,
        name: &[u8; 11],
        clusters: &[u32],
        parent: u32,
    ) -> Self {
        let first = clusters[0];
        self.chain(clusters)
            .entry(dir_cluster, index, name, Self::ATTR_DIRECTORY, first, 0)
            .entry(first, 0, b".          ", Self::ATTR_DIRECTORY, first, 0)
            .entry(first, 1, b"..         ", Self::ATTR_DIRECTORY, parent, 0)
    }

    /// Fills every slot of a directory cluster with a visible file entry, so
    /// the directory has no free slot left.
    pub(crate) fn fill_directory_cluster(mut self, dir_cluster: u32) -> Self {
        for index in 0..Self::BYTES_PER_SECTOR / 32 {
            let mut name = *b"FILL00  TXT";
            name[4] = b'0' + (index / 10) as u8;
            name[5] = b'0' + (index % 10) as u8;
            self = self.entry(dir_cluster, index, &name, 0x20, 0, 0);
        }
        self
    }

    pub(crate) fn build(mut self) -> Vec<u8> {
        let fat_len = Self::FAT_SECTORS as usize * Self::BYTES_PER_SECTOR;
        self.image
            .copy_within(Self::FAT_OFFSET..Self::FAT_OFFSET + fat_len, Self::FAT_OFFSET + fat_len);
        self.image
    }

    pub(crate) fn mount(self) -> Volume<Vec<u8>> {
        Volume::mount(self.build()).expect("failed to mount test image")
    }
}
