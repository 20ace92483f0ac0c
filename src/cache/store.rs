use std::io::{Read, Seek, SeekFrom, Write};

use crate::fsutil::LockedFile;

use super::models::Classification;
use super::{Error, Result};

/// Reads the classification from the start of the locked file.
///
/// An empty file is an empty classification. Undecodable contents, including
/// bytes that are not UTF-8, are logged and treated as empty; they get replaced
/// by the next write.
pub(super) fn read(locked: &mut LockedFile) -> Result<Classification> {
    let path = locked.path().to_path_buf();
    let mut contents = Vec::new();
    let file = locked.file();
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.read_to_end(&mut contents))
        .map_err(|source| Error::Read {
            path: path.clone(),
            source,
        })?;

    if contents.iter().all(u8::is_ascii_whitespace) {
        return Ok(Classification::default());
    }

    match serde_json::from_slice(&contents) {
        Ok(classification) => Ok(classification),
        Err(err) => {
            log::warn!(
                "ignoring malformed cache file `{}`: {}",
                path.display(),
                err
            );
            Ok(Classification::default())
        }
    }
}

/// Replaces the contents of the locked file with `classification`.
pub(super) fn write(locked: &mut LockedFile, classification: &Classification) -> Result<()> {
    let path = locked.path().to_path_buf();
    let encoded = serde_json::to_vec(classification).map_err(|source| Error::Encode {
        path: path.clone(),
        source,
    })?;

    let file = locked.file();
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.set_len(0))
        .and_then(|_| file.write_all(&encoded))
        .and_then(|_| file.sync_data())
        .map_err(|source| Error::Write { path, source })
}
