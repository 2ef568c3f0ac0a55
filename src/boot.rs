use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, Unaligned};

use crate::transmute::try_cast_bytes_ref;
use crate::{ClusterNumber, Error, Result};

/// The BIOS parameter block is the first part of the boot sector. Only the
/// FAT32 layout (with the extended boot record) is supported.
///
/// See <https://wiki.osdev.org/FAT#BPB_.28BIOS_Parameter_Block.29>
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, Unaligned)]
#[repr(C)]
pub struct BIOSParameterBlock {
    pub jmp_boot: [u8; 3],
    pub oem_name: [u8; 8],
    pub bytes_per_sector: U16<LittleEndian>,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: U16<LittleEndian>,
    pub fat_count: u8,
    pub root_dir_entries: U16<LittleEndian>,
    pub total_sectors: U16<LittleEndian>,
    pub media_descriptor: u8,
    pub sectors_per_fat: U16<LittleEndian>,
    pub sectors_per_track: U16<LittleEndian>,
    pub head_count: U16<LittleEndian>,
    pub hidden_sectors: U32<LittleEndian>,
    pub total_sectors_large: U32<LittleEndian>,

    // FAT32 extended boot record
    pub fat_size_32: U32<LittleEndian>,
    pub ext_flags: U16<LittleEndian>,
    pub fs_version: U16<LittleEndian>,
    pub root_cluster: U32<LittleEndian>,
    pub fs_info_sector: U16<LittleEndian>,
    pub backup_boot_sector: U16<LittleEndian>,
    pub reserved: [u8; 12],
    pub drive_number: u8,
    pub reserved1: u8,
    pub boot_signature: u8,
    pub volume_id: U32<LittleEndian>,
    pub volume_label: [u8; 11],
    pub fs_type: [u8; 8],
}

impl BIOSParameterBlock {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    /// Reads the parameter block from the start of a volume image.
    pub fn read(image: &[u8]) -> Result<&Self> {
        try_cast_bytes_ref(image).ok_or(Error::CorruptVolume("image shorter than boot sector"))
    }

    fn total_sectors(&self) -> u64 {
        match self.total_sectors.get() {
            0 => u64::from(self.total_sectors_large.get()),
            small => u64::from(small),
        }
    }

    /// Computes the layout of the volume, checked against the length of the
    /// mapped image.
    pub fn geometry(&self, image_len: usize) -> Result<Geometry> {
        let bytes_per_sector = u64::from(self.bytes_per_sector.get());
        if !(512..=4096).contains(&bytes_per_sector) || !bytes_per_sector.is_power_of_two() {
            return Err(Error::CorruptVolume("invalid bytes per sector"));
        }
        let sectors_per_cluster = u64::from(self.sectors_per_cluster);
        if sectors_per_cluster == 0 {
            return Err(Error::CorruptVolume("zero sectors per cluster"));
        }
        let fat_count = u64::from(self.fat_count);
        let fat_size = u64::from(self.fat_size_32.get());
        if fat_count == 0 || fat_size == 0 {
            return Err(Error::CorruptVolume("volume has no FAT"));
        }

        let reserved_sectors = u64::from(self.reserved_sectors.get());
        let data_start_sector = reserved_sectors + fat_count * fat_size;
        let bytes_per_cluster = bytes_per_sector * sectors_per_cluster;
        let fat_offset = reserved_sectors * bytes_per_sector;
        let data_offset = data_start_sector * bytes_per_sector;

        let image_len = image_len as u64;
        if data_offset > image_len {
            return Err(Error::CorruptVolume("data region starts past end of image"));
        }

        // The number of data clusters is bounded by what the FAT can describe,
        // by what the image actually maps, and by the declared sector count.
        let fat_entries = fat_size * bytes_per_sector / 4;
        let mut cluster_count = fat_entries.saturating_sub(2);
        cluster_count = cluster_count.min((image_len - data_offset) / bytes_per_cluster);
        let total_sectors = self.total_sectors();
        if total_sectors != 0 {
            let data_sectors = total_sectors.saturating_sub(data_start_sector);
            cluster_count = cluster_count.min(data_sectors / sectors_per_cluster);
        }

        let root_cluster = self.root_cluster.get();
        if root_cluster < 2 || u64::from(root_cluster) >= cluster_count + 2 {
            return Err(Error::CorruptVolume("root cluster outside of data region"));
        }

        let to_usize = |value: u64| {
            usize::try_from(value).map_err(|_| Error::CorruptVolume("volume too large"))
        };
        Ok(Geometry {
            bytes_per_sector: to_usize(bytes_per_sector)?,
            sectors_per_cluster: self.sectors_per_cluster,
            bytes_per_cluster: to_usize(bytes_per_cluster)?,
            fat_offset: to_usize(fat_offset)?,
            data_offset: to_usize(data_offset)?,
            cluster_count: u32::try_from(cluster_count)
                .map_err(|_| Error::CorruptVolume("too many clusters"))?,
            root_cluster: ClusterNumber(root_cluster),
        })
    }
}

/// Layout of a mounted volume, derived once from the [`BIOSParameterBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub bytes_per_sector: usize,
    pub sectors_per_cluster: u8,

    /// `bytes_per_sector * sectors_per_cluster`
    pub bytes_per_cluster: usize,

    /// Byte offset of the first FAT from the start of the image.
    pub fat_offset: usize,

    /// Byte offset of cluster 2 from the start of the image.
    pub data_offset: usize,

    /// Number of addressable data clusters. Valid cluster numbers are
    /// `2..cluster_count + 2`.
    pub cluster_count: u32,

    pub root_cluster: ClusterNumber,
}

impl Geometry {
    /// One past the largest valid cluster number.
    pub fn cluster_limit(&self) -> u32 {
        self.cluster_count + 2
    }
}
