use alloc::string::{String, ToString};
use core::fmt;

use crate::{BIOSParameterBlock, ClusterNumber, Geometry, Result};

/// A mounted FAT32 volume. All filesystem operations go through this handle.
///
/// `B` is the backing image: a `&'static mut [u8]` over the memory-mapped
/// volume in the kernel, or an owned `Vec<u8>` on the host. Operations that
/// only read the image take `&self`; operations that write the FAT, a
/// directory, or the current directory take `&mut self`.
pub struct Volume<B> {
    image: B,
    geometry: Geometry,
    current_directory: String,
}

impl<B: AsRef<[u8]>> Volume<B> {
    /// Binds a volume handle to an already mapped image and caches the
    /// cluster geometry. The current directory starts at `/`.
    pub fn mount(image: B) -> Result<Self> {
        let bpb = BIOSParameterBlock::read(image.as_ref())?;
        let geometry = bpb.geometry(image.as_ref().len())?;
        log::info!(
            "mounted FAT32 volume: {} clusters of {} bytes, root directory at cluster {}",
            geometry.cluster_count,
            geometry.bytes_per_cluster,
            geometry.root_cluster.0,
        );

        Ok(Self {
            image,
            geometry,
            current_directory: String::from("/"),
        })
    }

    pub fn parameter_block(&self) -> &BIOSParameterBlock {
        // Invariant: the image was long enough to hold the parameter block
        // when it was mounted, and the image length never changes.
        BIOSParameterBlock::read(self.image())
            .expect("INTERNAL ERROR: parameter block cast is supposed to be infallible")
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn bytes_per_cluster(&self) -> usize {
        self.geometry.bytes_per_cluster
    }

    pub fn root_cluster(&self) -> ClusterNumber {
        self.geometry.root_cluster
    }

    pub fn current_directory(&self) -> &str {
        &self.current_directory
    }

    /// Sets the current directory verbatim, or back to `/` when no
    /// destination is given. The destination is not checked for existence.
    pub fn change_directory(&mut self, destination: Option<&str>) {
        self.current_directory = destination.unwrap_or("/").to_string();
    }

    pub fn image(&self) -> &[u8] {
        self.image.as_ref()
    }

    pub fn into_image(self) -> B {
        self.image
    }

    /// Directory cluster `0` stands for the root directory (used both for
    /// "no starting directory" and by `..` entries of top-level directories).
    pub(crate) fn directory_start(&self, cluster: ClusterNumber) -> ClusterNumber {
        if cluster.0 == 0 {
            self.geometry.root_cluster
        } else {
            cluster
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Volume<B> {
    pub(crate) fn image_mut(&mut self) -> &mut [u8] {
        self.image.as_mut()
    }
}

impl<B> fmt::Debug for Volume<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Volume")
            .field("geometry", &self.geometry)
            .field("current_directory", &self.current_directory)
            .finish_non_exhaustive()
    }
}
