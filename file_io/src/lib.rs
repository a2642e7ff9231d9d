use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter};
use std::path::Path;

pub fn open_file_buf_read<P: AsRef<Path>>(path: P) -> io::Result<BufReader<File>> {
    let file = File::open(path)?;
    Ok(BufReader::new(file))
}

/// Creates (or truncates) the file, creating missing parent directories
/// first.
pub fn create_file_buf_write<P: AsRef<Path>>(path: P) -> io::Result<BufWriter<File>> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    Ok(BufWriter::new(file))
}

/// Whether `reader` still has bytes before EOF. Loaders use it to reject
/// files with junk after the decoded value.
pub fn has_data_left<R: BufRead>(mut reader: R) -> io::Result<bool> {
    Ok(!reader.fill_buf()?.is_empty())
}
