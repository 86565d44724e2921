//! Owned media buffer with a used-length marker.

use crate::BufferError;

/// An owned, fixed-capacity byte region with a used length distinct from
/// its capacity.
///
/// A buffer has exactly one owner at a time. Writing goes through
/// `lock_for_write` / `write` / `set_used_length` / `unlock`; reading
/// through `read_locked` once the buffer is unlocked and populated.
#[derive(Debug)]
pub struct Buffer {
    data: Box<[u8]>,
    used: usize,
    locked: bool,
    populated: bool,
}

impl Buffer {
    /// Allocate a zeroed buffer with the given capacity.
    #[must_use]
    pub fn allocate(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            used: 0,
            locked: false,
            populated: false,
        }
    }

    /// Allocate a buffer sized to `bytes` and fill it.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, BufferError> {
        let mut buffer = Self::allocate(bytes.len());
        buffer.fill(bytes)?;
        Ok(buffer)
    }

    /// Lock, write `bytes` at offset 0, set the used length and unlock.
    pub fn fill(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        self.lock_for_write()?;
        let result = self
            .write(0, bytes)
            .and_then(|()| self.set_used_length(bytes.len()));
        self.unlock();
        result
    }

    /// Lock the buffer for writing and return the whole writable region.
    ///
    /// The returned slice length is the buffer capacity.
    pub fn lock_for_write(&mut self) -> Result<&mut [u8], BufferError> {
        if self.locked {
            return Err(BufferError::AlreadyLocked);
        }
        self.locked = true;
        Ok(&mut self.data[..])
    }

    /// Copy `bytes` into the buffer at `offset`. The buffer must be locked.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), BufferError> {
        if !self.locked {
            return Err(BufferError::NotLocked);
        }
        let capacity = self.data.len();
        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= capacity)
            .ok_or(BufferError::Overflow {
                offset,
                len: bytes.len(),
                capacity,
            })?;
        self.data[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Mark the first `len` bytes as holding valid data. The buffer must be
    /// locked.
    pub fn set_used_length(&mut self, len: usize) -> Result<(), BufferError> {
        if !self.locked {
            return Err(BufferError::NotLocked);
        }
        if len > self.data.len() {
            return Err(BufferError::InvalidLength {
                len,
                capacity: self.data.len(),
            });
        }
        self.used = len;
        self.populated = true;
        Ok(())
    }

    /// Release the write lock. Unlocking an unlocked buffer is a no-op.
    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Read the used bytes.
    pub fn read_locked(&self) -> Result<&[u8], BufferError> {
        if self.locked || !self.populated {
            return Err(BufferError::NotReadable);
        }
        Ok(&self.data[..self.used])
    }

    /// Total capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of bytes marked as used.
    #[must_use]
    pub fn used_length(&self) -> usize {
        self.used
    }

    /// Returns true while the buffer is write-locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}
