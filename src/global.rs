//! The process-wide boot volume.
//!
//! The kernel maps the volume image once at boot and hands it to
//! [`initialize`]. Afterwards any context can reach the volume through
//! [`with_volume`] (shared, for lookups and reads) or [`with_volume_mut`]
//! (exclusive, for anything that changes the FAT, a directory, or the current
//! directory).

use spin::RwLock;

use crate::{Error, Result, Volume};

pub type BootVolume = Volume<&'static mut [u8]>;

static BOOT_VOLUME: RwLock<Option<BootVolume>> = RwLock::new(None);

/// Mounts the boot volume. Calling this again replaces the mounted volume.
pub fn initialize(image: &'static mut [u8]) -> Result<()> {
    let volume = Volume::mount(image)?;
    let previous = BOOT_VOLUME.write().replace(volume);
    if previous.is_some() {
        log::warn!("boot volume re-initialized");
    }
    Ok(())
}

pub fn with_volume<F, R>(func: F) -> Result<R>
where
    F: FnOnce(&BootVolume) -> R,
{
    let guard = BOOT_VOLUME.read();
    let volume = guard.as_ref().ok_or(Error::NotInitialized)?;
    Ok(func(volume))
}

pub fn with_volume_mut<F, R>(func: F) -> Result<R>
where
    F: FnOnce(&mut BootVolume) -> R,
{
    let mut guard = BOOT_VOLUME.write();
    let volume = guard.as_mut().ok_or(Error::NotInitialized)?;
    Ok(func(volume))
}
