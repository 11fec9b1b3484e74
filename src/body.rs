use std::{
    fs::File,
    io::{self, Cursor, Read},
};

/// Response payload.
///
/// Static files are streamed straight from disk with their known length, small
/// generated pages are kept in memory.
#[derive(Default)]
pub struct Body(BodyInner);

#[derive(Default)]
enum BodyInner {
    #[default]
    Empty,
    Buffered(Vec<u8>),
    Reader(Box<dyn Read + Send>, u64),
}

impl Body {
    pub fn empty() -> Self {
        Body(BodyInner::Empty)
    }

    /// A body read from `reader`, cut off after `length` bytes.
    pub fn from_reader(reader: impl Read + Send + 'static, length: u64) -> Self {
        Body(BodyInner::Reader(Box::new(reader), length))
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        match &self.0 {
            BodyInner::Empty => 0,
            BodyInner::Buffered(bytes) => bytes.len() as u64,
            BodyInner::Reader(_, len) => *len,
        }
    }

    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.len() as usize);
        self.into_reader().read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn into_reader(self) -> BodyReader {
        match self.0 {
            BodyInner::Empty => BodyReader(BodyReaderInner::Buffered(Cursor::new(Vec::new()))),
            BodyInner::Buffered(bytes) => BodyReader(BodyReaderInner::Buffered(Cursor::new(bytes))),
            BodyInner::Reader(stream, len) => {
                BodyReader(BodyReaderInner::Reader(Box::new(stream.take(len))))
            }
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(body: Vec<u8>) -> Self {
        Body(BodyInner::Buffered(body))
    }
}

impl From<&[u8]> for Body {
    fn from(body: &[u8]) -> Self {
        body.to_vec().into()
    }
}

impl From<&str> for Body {
    fn from(body: &str) -> Self {
        body.as_bytes().to_vec().into()
    }
}

impl From<String> for Body {
    fn from(body: String) -> Self {
        body.into_bytes().into()
    }
}

impl TryFrom<File> for Body {
    type Error = io::Error;

    fn try_from(file: File) -> Result<Self, Self::Error> {
        match file.metadata() {
            Ok(meta) if meta.is_file() => Ok(Body::from_reader(file, meta.len())),
            Ok(_) => Err(io::Error::new(io::ErrorKind::Other, "not a file")),
            Err(err) => Err(err),
        }
    }
}

pub struct BodyReader(BodyReaderInner);

enum BodyReaderInner {
    Buffered(Cursor<Vec<u8>>),
    Reader(Box<dyn Read + Send>),
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0 {
            BodyReaderInner::Buffered(ref mut cursor) => cursor.read(buf),
            BodyReaderInner::Reader(ref mut reader) => reader.read(buf),
        }
    }
}
