use std::io::{self, BufReader, Read};

/// Sequential byte input for the decoder. Never seeks backward.
pub trait ByteSource {
    /// Next byte, or `None` once the input is exhausted.
    fn read_u8(&mut self) -> io::Result<Option<u8>>;
    /// Number of bytes consumed so far.
    fn offset(&self) -> u64;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_u8(&mut self) -> io::Result<Option<u8>> {
        (**self).read_u8()
    }
    fn offset(&self) -> u64 {
        (**self).offset()
    }
}

/// In-memory input.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}

impl ByteSource for SliceSource<'_> {
    fn read_u8(&mut self) -> io::Result<Option<u8>> {
        let b = self.bytes.get(self.pos).copied();
        if b.is_some() {
            self.pos += 1;
        }
        Ok(b)
    }
    fn offset(&self) -> u64 {
        self.pos as u64
    }
}

/// Buffered input over any [`Read`] (file, stdin, pipe).
pub struct ReaderSource<R> {
    inner: BufReader<R>,
    pos: u64,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self { inner: BufReader::new(reader), pos: 0 }
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn read_u8(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.pos += 1;
                    return Ok(Some(buf[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
    fn offset(&self) -> u64 {
        self.pos
    }
}
