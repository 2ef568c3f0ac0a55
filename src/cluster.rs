//! Cluster addressing and the File Allocation Table.
//!
//! The FAT is an array of little-endian `u32` links, one per cluster. A chain
//! starts at the cluster stored in a directory entry and follows the links
//! until an end-of-chain marker.

use alloc::vec::Vec;

use zerocopy::byteorder::{LittleEndian, U32};

use crate::transmute::{try_cast_bytes_ref_mut_offset, try_cast_bytes_ref_offset};
use crate::{Error, Result, Volume};

/// Number of a cluster in the data region. Clusters 0 and 1 are reserved, so
/// the first addressable cluster is 2. A cluster number of 0 inside a
/// directory entry means "no cluster".
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterNumber(pub u32);

impl ClusterNumber {
    pub const FIRST: Self = Self(2);
}

/// Any FAT value at or above this marks the end of a chain.
pub const END_OF_CHAIN: u32 = 0x0FFF_FFF8;

/// Value written for newly terminated chains.
const END_OF_CHAIN_MARKER: u32 = 0x0FFF_FFFF;

/// FAT32 entries are 28 bits wide. The top nibble is reserved and must be
/// preserved on write.
const ENTRY_MASK: u32 = 0x0FFF_FFFF;

const FAT_ENTRY_SIZE: usize = core::mem::size_of::<u32>();

/// Decoded FAT entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FatEntry {
    Free,
    Next(ClusterNumber),
    EndOfChain,
}

impl FatEntry {
    pub fn from_raw(raw: u32) -> Self {
        match raw & ENTRY_MASK {
            0 => Self::Free,
            value if value >= END_OF_CHAIN => Self::EndOfChain,
            value => Self::Next(ClusterNumber(value)),
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            Self::Free => 0,
            Self::Next(cluster) => cluster.0 & ENTRY_MASK,
            Self::EndOfChain => END_OF_CHAIN_MARKER,
        }
    }
}

impl<B: AsRef<[u8]>> Volume<B> {
    fn check_cluster(&self, cluster: ClusterNumber) -> Result<()> {
        if cluster < ClusterNumber::FIRST || cluster.0 >= self.geometry().cluster_limit() {
            return Err(Error::ClusterOutOfRange(cluster));
        }
        Ok(())
    }

    /// Byte offset of a cluster's data from the start of the image.
    pub fn cluster_offset(&self, cluster: ClusterNumber) -> Result<usize> {
        self.check_cluster(cluster)?;
        let geometry = self.geometry();
        let index = (cluster.0 - ClusterNumber::FIRST.0) as usize;
        Ok(geometry.data_offset + index * geometry.bytes_per_cluster)
    }

    pub fn cluster_bytes(&self, cluster: ClusterNumber) -> Result<&[u8]> {
        let start = self.cluster_offset(cluster)?;
        let end = start + self.bytes_per_cluster();
        self.image()
            .get(start..end)
            .ok_or(Error::ClusterOutOfRange(cluster))
    }

    fn fat_entry_offset(&self, cluster: ClusterNumber) -> Result<usize> {
        self.check_cluster(cluster)?;
        Ok(self.geometry().fat_offset + cluster.0 as usize * FAT_ENTRY_SIZE)
    }

    pub fn fat_entry(&self, cluster: ClusterNumber) -> Result<FatEntry> {
        let offset = self.fat_entry_offset(cluster)?;
        let raw: &U32<LittleEndian> = try_cast_bytes_ref_offset(self.image(), offset)
            .ok_or(Error::CorruptVolume("FAT runs past end of image"))?;
        Ok(FatEntry::from_raw(raw.get()))
    }

    /// Follows one link of a chain. Returns `None` at the end of the chain.
    pub fn next_cluster(&self, cluster: ClusterNumber) -> Result<Option<ClusterNumber>> {
        match self.fat_entry(cluster)? {
            FatEntry::Next(next) => Ok(Some(next)),
            FatEntry::EndOfChain => Ok(None),
            FatEntry::Free => {
                log::warn!("cluster chain runs into free cluster {}", cluster.0);
                Ok(None)
            }
        }
    }

    /// Iterates over the clusters of a chain, starting with `start`. A start
    /// cluster of `0` is an empty chain.
    pub fn chain(&self, start: ClusterNumber) -> ClusterChain<'_, B> {
        ClusterChain {
            volume: self,
            next: (start.0 != 0).then_some(start),
            remaining: self.geometry().cluster_count,
        }
    }

    /// Last cluster of the chain containing `start`.
    pub fn chain_tail(&self, start: ClusterNumber) -> Result<ClusterNumber> {
        let mut tail = start;
        for cluster in self.chain(start) {
            tail = cluster?;
        }
        Ok(tail)
    }

    pub fn free_cluster_count(&self) -> Result<u32> {
        let mut count = 0;
        for number in ClusterNumber::FIRST.0..self.geometry().cluster_limit() {
            if self.fat_entry(ClusterNumber(number))? == FatEntry::Free {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Lowest-numbered `n` free clusters. There is no free-cluster cache, so
    /// this is a linear scan of the FAT.
    fn find_free_clusters(&self, n: usize) -> Result<Vec<ClusterNumber>> {
        let mut free = Vec::with_capacity(n);
        if n == 0 {
            return Ok(free);
        }

        for number in ClusterNumber::FIRST.0..self.geometry().cluster_limit() {
            let cluster = ClusterNumber(number);
            if self.fat_entry(cluster)? == FatEntry::Free {
                free.push(cluster);
                if free.len() == n {
                    return Ok(free);
                }
            }
        }

        log::error!("wanted {n} free clusters, only found {}", free.len());
        Err(Error::NoEnoughMemory)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Volume<B> {
    pub fn cluster_bytes_mut(&mut self, cluster: ClusterNumber) -> Result<&mut [u8]> {
        let start = self.cluster_offset(cluster)?;
        let end = start + self.bytes_per_cluster();
        self.image_mut()
            .get_mut(start..end)
            .ok_or(Error::ClusterOutOfRange(cluster))
    }

    fn set_fat_entry(&mut self, cluster: ClusterNumber, entry: FatEntry) -> Result<()> {
        let offset = self.fat_entry_offset(cluster)?;
        let raw: &mut U32<LittleEndian> = try_cast_bytes_ref_mut_offset(self.image_mut(), offset)
            .ok_or(Error::CorruptVolume("FAT runs past end of image"))?;
        let reserved_bits = raw.get() & !ENTRY_MASK;
        raw.set(reserved_bits | entry.to_raw());
        Ok(())
    }

    /// Appends `n` free clusters to the chain containing `tail_hint` and
    /// returns the new tail. `tail_hint` may be any cluster of the chain; the
    /// real tail is found by walking forward from it.
    ///
    /// All `n` clusters are found before the FAT is modified, so a volume
    /// without enough free clusters is left untouched.
    pub fn extend_chain(&mut self, tail_hint: ClusterNumber, n: usize) -> Result<ClusterNumber> {
        self.check_cluster(tail_hint)?;
        let mut tail = self.chain_tail(tail_hint)?;
        let free = self.find_free_clusters(n)?;

        for cluster in free {
            log::debug!("linking cluster {} after {}", cluster.0, tail.0);
            self.set_fat_entry(tail, FatEntry::Next(cluster))?;
            tail = cluster;
        }
        self.set_fat_entry(tail, FatEntry::EndOfChain)?;

        Ok(tail)
    }
}

/// Iterator over a cluster chain, see [`Volume::chain`].
///
/// Yields an error and stops if the chain is longer than the number of
/// clusters on the volume, which can only happen if the FAT has a loop.
pub struct ClusterChain<'a, B> {
    volume: &'a Volume<B>,
    next: Option<ClusterNumber>,
    remaining: u32,
}

impl<B: AsRef<[u8]>> Iterator for ClusterChain<'_, B> {
    type Item = Result<ClusterNumber>;

    fn next(&mut self) -> Option<Self::Item> {
        let cluster = self.next.take()?;
        if self.remaining == 0 {
            log::warn!("cluster chain through {} loops", cluster.0);
            return Some(Err(Error::CorruptVolume("cluster chain loops")));
        }
        self.remaining -= 1;

        match self.volume.next_cluster(cluster) {
            Ok(next) => {
                self.next = next;
                Some(Ok(cluster))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_image::ImageBuilder;

    fn collect_chain<B: AsRef<[u8]>>(volume: &Volume<B>, start: u32) -> Vec<u32> {
        volume
            .chain(ClusterNumber(start))
            .map(|cluster| cluster.unwrap().0)
            .collect()
    }

    #[test]
    fn cluster_offsets() {
        let volume = ImageBuilder::new().mount();
        let data_offset = volume.geometry().data_offset;
        assert_eq!(volume.cluster_offset(ClusterNumber(2)), Ok(data_offset));
        assert_eq!(volume.cluster_offset(ClusterNumber(5)), Ok(data_offset + 3 * 512));
        assert_eq!(
            volume.cluster_offset(ClusterNumber(1)),
            Err(Error::ClusterOutOfRange(ClusterNumber(1)))
        );

        let limit = ClusterNumber(volume.geometry().cluster_limit());
        assert_eq!(
            volume.cluster_bytes(limit),
            Err(Error::ClusterOutOfRange(limit))
        );
        let last = ClusterNumber(limit.0 - 1);
        assert_eq!(volume.cluster_bytes(last).unwrap().len(), 512);
    }

    #[test]
    fn decode_fat_entries() {
        assert_eq!(FatEntry::from_raw(0), FatEntry::Free);
        assert_eq!(FatEntry::from_raw(7), FatEntry::Next(ClusterNumber(7)));
        assert_eq!(FatEntry::from_raw(0x0FFF_FFF7), FatEntry::Next(ClusterNumber(0x0FFF_FFF7)));
        assert_eq!(FatEntry::from_raw(0x0FFF_FFF8), FatEntry::EndOfChain);
        assert_eq!(FatEntry::from_raw(0x0FFF_FFFF), FatEntry::EndOfChain);
        // Reserved high bits are ignored.
        assert_eq!(FatEntry::from_raw(0xF000_0000), FatEntry::Free);
        assert_eq!(FatEntry::from_raw(0x1000_0009), FatEntry::Next(ClusterNumber(9)));
    }

    #[test]
    fn follow_chain() {
        let volume = ImageBuilder::new().chain(&[5, 9, 6]).mount();
        assert_eq!(volume.next_cluster(ClusterNumber(5)), Ok(Some(ClusterNumber(9))));
        assert_eq!(volume.next_cluster(ClusterNumber(6)), Ok(None));
        assert_eq!(collect_chain(&volume, 5), [5, 9, 6]);
        assert_eq!(collect_chain(&volume, 9), [9, 6]);
        assert!(collect_chain(&volume, 0).is_empty());
        assert_eq!(volume.chain_tail(ClusterNumber(5)), Ok(ClusterNumber(6)));
    }

    #[test]
    fn looping_chain_is_reported() {
        let volume = ImageBuilder::new()
            .fat_entry(5, 6)
            .fat_entry(6, 5)
            .mount();
        let result: Result<Vec<_>> = volume.chain(ClusterNumber(5)).collect();
        assert_eq!(result, Err(Error::CorruptVolume("cluster chain loops")));
    }

    #[test]
    fn chain_with_bad_link() {
        let volume = ImageBuilder::new().fat_entry(5, 1).mount();
        let result: Result<Vec<_>> = volume.chain(ClusterNumber(5)).collect();
        assert_eq!(result, Err(Error::ClusterOutOfRange(ClusterNumber(1))));
    }

    #[test]
    fn extend_chain_from_middle() {
        // Root directory occupies cluster 2, the chain 3 -> 4 -> 6 leaves 5
        // and 7 as the lowest free clusters.
        let mut volume = ImageBuilder::new().chain(&[3, 4, 6]).mount();
        let free_before = volume.free_cluster_count().unwrap();

        let tail = volume.extend_chain(ClusterNumber(4), 2).unwrap();
        assert_eq!(tail, ClusterNumber(7));
        assert_eq!(collect_chain(&volume, 3), [3, 4, 6, 5, 7]);
        assert_eq!(volume.free_cluster_count().unwrap(), free_before - 2);
    }

    #[test]
    fn extend_chain_writes_end_marker_and_keeps_reserved_bits() {
        let mut volume = ImageBuilder::new()
            .fat_entry(3, 0xF000_0000 | END_OF_CHAIN_MARKER)
            .mount();
        let tail = volume.extend_chain(ClusterNumber(3), 1).unwrap();
        assert_eq!(tail, ClusterNumber(4));

        let fat = volume.geometry().fat_offset;
        let image = volume.image();
        assert_eq!(image[fat + 3 * 4..fat + 4 * 4], 0xF000_0004_u32.to_le_bytes());
        assert_eq!(image[fat + 4 * 4..fat + 5 * 4], END_OF_CHAIN_MARKER.to_le_bytes());
    }

    #[test]
    fn extend_chain_out_of_space() {
        let mut builder = ImageBuilder::new();
        let clusters: Vec<u32> = (3..ImageBuilder::DEFAULT_CLUSTERS + 2).collect();
        builder = builder.chain(&clusters);
        let mut volume = builder.mount();
        assert_eq!(volume.free_cluster_count(), Ok(0));

        let image_before = volume.image().to_vec();
        assert_eq!(
            volume.extend_chain(ClusterNumber(3), 1),
            Err(Error::NoEnoughMemory)
        );
        assert_eq!(volume.image(), image_before.as_slice());
    }
}
