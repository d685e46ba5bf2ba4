//! Image inputs accepted by the upload and search-by-image operations.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

use crate::error::BirseError;
use crate::http::Multipart;

pub(crate) const IMAGE_FIELD: &str = "image";
const IMAGE_FILENAME: &str = "image.jpg";
const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// Where the bytes of an uploaded image come from.
///
/// Files are opened and readers are consumed by the call that receives the
/// source; both are dropped when that call returns, whatever its outcome.
pub enum ImageSource<'a> {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Reader(Box<dyn Read + 'a>),
}

impl<'a> ImageSource<'a> {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        ImageSource::Path(path.into())
    }

    pub fn reader(reader: impl Read + 'a) -> Self {
        ImageSource::Reader(Box::new(reader))
    }

    /// Read the whole image. Runs before any request is built, so local
    /// failures never reach the network.
    pub(crate) fn load(self) -> Result<Vec<u8>, BirseError> {
        match self {
            ImageSource::Bytes(bytes) => Ok(bytes),
            ImageSource::Path(path) => {
                let mut file = match File::open(&path) {
                    Ok(file) => file,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        return Err(BirseError::ImageNotFound(path))
                    }
                    Err(e) => return Err(BirseError::ImageRead(e)),
                };
                read_all(&mut file)
            }
            ImageSource::Reader(mut reader) => read_all(&mut reader),
        }
    }
}

fn read_all(reader: &mut dyn Read) -> Result<Vec<u8>, BirseError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(BirseError::ImageRead)?;
    Ok(bytes)
}

impl From<Vec<u8>> for ImageSource<'_> {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(bytes)
    }
}

impl From<&[u8]> for ImageSource<'_> {
    fn from(bytes: &[u8]) -> Self {
        ImageSource::Bytes(bytes.to_vec())
    }
}

impl From<PathBuf> for ImageSource<'_> {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<&std::path::Path> for ImageSource<'_> {
    fn from(path: &std::path::Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

impl fmt::Debug for ImageSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ImageSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            ImageSource::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// Start a form whose image part holds `bytes`.
pub(crate) fn image_form(bytes: &[u8]) -> Multipart {
    Multipart::new().file(IMAGE_FIELD, IMAGE_FILENAME, IMAGE_CONTENT_TYPE, bytes)
}
