use std::fs;
use std::marker::PhantomData;
use std::path::Path;

use crate::codec::Frame;
use crate::error::Result;

/// Iterator over the frames in a byte buffer.
///
/// Yields frames in file order. The first decode error is yielded once and
/// ends the iteration; [`FrameIter::offset`] then still points at the start
/// of the failing frame, which is where a torn tail begins.
pub struct FrameIter<'a, T> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
    _marker: PhantomData<T>,
}

impl<'a, T: Frame> FrameIter<'a, T> {
    pub fn new(data: &'a [u8]) -> Self {
        FrameIter {
            data,
            offset: 0,
            failed: false,
            _marker: PhantomData,
        }
    }

    /// Byte offset of the next frame to decode.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<T: Frame> Iterator for FrameIter<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }

        match T::decode_at(self.data, self.offset) {
            Ok((item, next)) => {
                self.offset = next;
                Some(Ok(item))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Loads a whole level file into memory for decoding.
pub struct FileReader {
    data: Vec<u8>,
}

impl FileReader {
    pub fn new(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(FileReader { data })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn iter<T: Frame>(&self) -> FrameIter<'_, T> {
        FrameIter::new(&self.data)
    }
}
