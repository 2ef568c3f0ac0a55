//! Bounds-checked views of on-disk records inside the mapped volume image.
//!
//! Offsets come from the volume itself (FAT entries, directory slots), so a
//! corrupt volume can point anywhere. Every view checks that the whole record
//! lies inside the image and yields `None` otherwise.

use zerocopy::{AsBytes, FromBytes, LayoutVerified};

/// View of the record at the very start of `bytes`.
pub(crate) fn try_cast_bytes_ref<T: FromBytes>(bytes: &[u8]) -> Option<&T> {
    try_cast_bytes_ref_offset(bytes, 0)
}

/// View of the record that starts `offset` bytes into the image.
pub(crate) fn try_cast_bytes_ref_offset<T: FromBytes>(bytes: &[u8], offset: usize) -> Option<&T> {
    let (record, _) = LayoutVerified::<_, T>::new_from_prefix(bytes.get(offset..)?)?;
    Some(record.into_ref())
}

/// Mutable view of the record that starts `offset` bytes into the image.
pub(crate) fn try_cast_bytes_ref_mut_offset<T: FromBytes + AsBytes>(
    bytes: &mut [u8],
    offset: usize,
) -> Option<&mut T> {
    let (record, _) = LayoutVerified::<_, T>::new_from_prefix(bytes.get_mut(offset..)?)?;
    Some(record.into_mut())
}

/// All records of one cluster. A cluster that isn't a whole number of
/// records yields `None`.
pub(crate) fn try_cast_bytes_slice<T: FromBytes>(bytes: &[u8]) -> Option<&[T]> {
    Some(LayoutVerified::<_, [T]>::new_slice(bytes)?.into_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    use zerocopy::byteorder::{LittleEndian, U32};

    #[test]
    fn offset_casts_are_bounds_checked() {
        let mut bytes = [0u8; 8];
        bytes[4..8].copy_from_slice(&0x0FFF_FFF8_u32.to_le_bytes());

        let value: &U32<LittleEndian> = try_cast_bytes_ref_offset(&bytes, 4).unwrap();
        assert_eq!(value.get(), 0x0FFF_FFF8);

        assert!(try_cast_bytes_ref_offset::<U32<LittleEndian>>(&bytes, 5).is_none());
        assert!(try_cast_bytes_ref_offset::<U32<LittleEndian>>(&bytes, 100).is_none());
        assert!(try_cast_bytes_ref::<U32<LittleEndian>>(&bytes[..3]).is_none());

        let value: &mut U32<LittleEndian> = try_cast_bytes_ref_mut_offset(&mut bytes, 0).unwrap();
        value.set(7);
        assert_eq!(bytes[..4], [7, 0, 0, 0]);
    }

    #[test]
    fn slice_cast_requires_whole_elements() {
        let bytes = [0u8; 12];
        let values: &[U32<LittleEndian>] = try_cast_bytes_slice(&bytes).unwrap();
        assert_eq!(values.len(), 3);
        assert!(try_cast_bytes_slice::<U32<LittleEndian>>(&bytes[..10]).is_none());
    }
}
