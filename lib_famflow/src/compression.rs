use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use flate2::read::MultiGzDecoder;
use log::debug;
use xz2::read::XzDecoder;

use crate::error::{Error, Result};


const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Plain,
    Gzip,
    Xz,
}

impl Compression {
    /// Recognises the compression format from the first bytes of a file.
    pub fn detect(header: &[u8]) -> Self {
        if header.starts_with(GZIP_MAGIC) {
            Self::Gzip
        } else if header.starts_with(XZ_MAGIC) {
            Self::Xz
        } else {
            Self::Plain
        }
    }
}

/// Opens a file for buffered reading, decompressing gzip and xz content on the fly.
pub fn open_decompressed(path: impl AsRef<Path>) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path).map_err(Error::io(path))?);
    let compression = Compression::detect(reader.fill_buf().map_err(Error::io(path))?);
    debug!("Reading {path:?} as {compression:?}");

    Ok(match compression {
        Compression::Plain => Box::new(reader),
        Compression::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(reader))),
        Compression::Xz => Box::new(BufReader::new(XzDecoder::new(reader))),
    })
}
