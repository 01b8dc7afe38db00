//! Last-line extraction for station result files.
//!
//! Result files are append-only and can grow over a whole shift, so only
//! the end of the file is read: fixed-size blocks are pulled backward from
//! the end until the start of the final non-blank line is found.

use crate::constants::TAIL_CHUNK_SIZE;
use crate::error::{MergerError, Result};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;

/// Return the last non-blank line of `path`, trimmed.
///
/// `Ok(None)` means the file is empty or holds only blank lines.
pub fn read_last_line(path: &Path) -> Result<Option<String>> {
    read_last_line_with_chunk(path, TAIL_CHUNK_SIZE)
}

fn read_last_line_with_chunk(path: &Path, chunk_size: usize) -> Result<Option<String>> {
    let tail_error = |source| MergerError::TailRead {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(tail_error)?;
    let Some(span) = last_line_span(&mut file, chunk_size).map_err(tail_error)? else {
        return Ok(None);
    };

    let mut line = vec![0u8; (span.end - span.start) as usize];
    file.seek(SeekFrom::Start(span.start)).map_err(tail_error)?;
    file.read_exact(&mut line).map_err(tail_error)?;

    let line = String::from_utf8_lossy(&line).trim().to_string();
    Ok((!line.is_empty()).then_some(line))
}

/// Byte range of the final non-blank line.
///
/// Blocks are read backward from the end and each byte is looked at once:
/// trailing whitespace is skipped until the line's last byte is found, then
/// the scan continues to the newline that precedes it (or the file start).
fn last_line_span<R: Read + Seek>(
    reader: &mut R,
    chunk_size: usize,
) -> io::Result<Option<Range<u64>>> {
    let mut position = reader.seek(SeekFrom::End(0))?;
    let mut block = vec![0u8; chunk_size.max(1)];
    let mut line_end = None;

    while position > 0 {
        let step = position.min(block.len() as u64) as usize;
        position -= step as u64;
        reader.seek(SeekFrom::Start(position))?;
        reader.read_exact(&mut block[..step])?;

        for (offset, &byte) in block[..step].iter().enumerate().rev() {
            let at = position + offset as u64;
            match line_end {
                None if !byte.is_ascii_whitespace() => line_end = Some(at + 1),
                Some(end) if byte == b'\n' => return Ok(Some(at + 1..end)),
                _ => {}
            }
        }
    }

    Ok(line_end.map(|end| 0..end))
}
