use crate::error::AnnounceError;

macro_rules! get_checked_impl {
    ($checked_getter: ident, $ty:ty, $getter: ident) => {
        fn $checked_getter(&mut self) -> Result<$ty, AnnounceError> {
            self.ensure_remaining(std::mem::size_of::<$ty>())?;
            Ok(self.$getter())
        }
    }
}

/// Bounds-checked reads for decoding untrusted input: every read checks the remaining length
///  first, so a short buffer is reported as `Truncated` instead of panicking inside `bytes`.
pub trait BufExt: bytes::Buf {
    fn ensure_remaining(&self, needed: usize) -> Result<(), AnnounceError> {
        if self.remaining() < needed {
            return Err(AnnounceError::Truncated { needed, available: self.remaining() });
        }
        Ok(())
    }

    get_checked_impl!(checked_get_u8, u8, get_u8);
    get_checked_impl!(checked_get_u16, u16, get_u16);
    get_checked_impl!(checked_get_u32, u32, get_u32);
    get_checked_impl!(checked_get_u64, u64, get_u64);
    get_checked_impl!(checked_get_u128, u128, get_u128);

    fn checked_get_array<const N: usize>(&mut self) -> Result<[u8; N], AnnounceError> {
        self.ensure_remaining(N)?;
        let mut result = [0u8; N];
        self.copy_to_slice(&mut result);
        Ok(result)
    }
}

/// The write-side counterpart: writing into a fixed-capacity target fails with `BufferTooSmall`
///  before anything is written.
pub trait BufMutExt: bytes::BufMut {
    fn ensure_remaining_mut(&self, needed: usize) -> Result<(), AnnounceError> {
        if self.remaining_mut() < needed {
            return Err(AnnounceError::BufferTooSmall { needed, available: self.remaining_mut() });
        }
        Ok(())
    }
}

impl <T: bytes::Buf> BufExt for T {
}

impl <T: bytes::BufMut> BufMutExt for T {
}
