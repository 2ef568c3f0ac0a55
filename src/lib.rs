//! Pure code for interacting with FAT32 volumes. Used in our kernel.
//!
//! The volume is a byte image that is already mapped into memory. There is no
//! block device or VFS underneath: clusters, the FAT, and directory entries
//! are read and written in place.
//!
//! # Resources
//!
//! - <https://en.wikipedia.org/wiki/Design_of_the_FAT_file_system>
//! - <https://academy.cba.mit.edu/classes/networking_communications/SD/FAT.pdf>
//! - <https://wiki.osdev.org/FAT>

#![cfg_attr(not(test), no_std)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cargo_common_metadata,
    clippy::doc_markdown,
    clippy::implicit_hasher,
    clippy::implicit_return,
    clippy::missing_const_for_fn,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::multiple_crate_versions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::redundant_pub_crate,
    clippy::suboptimal_flops,
    clippy::upper_case_acronyms,
    clippy::wildcard_imports
)]

extern crate alloc;

mod boot;
mod cluster;
mod create;
mod directory;
mod error;
mod file;
pub mod global;
mod lookup;
pub mod path;
#[cfg(test)]
mod test_image;
mod transmute;
mod volume;

pub use boot::*;
pub use cluster::*;
pub use directory::*;
pub use error::*;
pub use file::*;
pub use lookup::*;
pub use volume::*;
