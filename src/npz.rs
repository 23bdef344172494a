//! Reading and writing `.npz` archives of float64 matrices.
//!
//! An `.npz` file is a zip archive holding one `<name>.npy` member per array.
//! Members are stored uncompressed, the same way `numpy.savez` writes them,
//! so `np.load("painting_corners.npz")["corners_0"]` works on the output.
//!
//! Only what this crate writes is understood on the way back in: version 1.0
//! headers, little-endian `f8`, C order, two dimensions.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use tracing::{debug, error, info, trace, warn};

use ndarray::Array2;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
/// Magic, version and the u16 header length.
const PREAMBLE_LEN: usize = MAGIC.len() + 2 + 2;
const HEADER_ALIGN: usize = 64;
const MAX_SIZE_HINT: usize = 1 << 20;

#[derive(thiserror::Error, Debug)]
pub enum NpzError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
    #[error("{0}: not an npy member")]
    BadMagic(String),
    #[error("{name}: unsupported npy header {header:?}")]
    UnsupportedHeader { name: String, header: String },
    #[error("{name}: expected {expected} data bytes, found {found}")]
    Truncated {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("duplicate array name {0:?}")]
    DuplicateName(String),
}

/// Writes `arrays` into a new archive at `path`, replacing any existing file.
///
/// The archive is built in a temporary file next to `path` and renamed over
/// it once complete, so a failed write never leaves a half-written archive.
pub fn write_npz<P: AsRef<Path>>(path: P, arrays: &[(String, Array2<f64>)]) -> Result<(), NpzError> {
    let path = path.as_ref();
    for (i, (name, _)) in arrays.iter().enumerate() {
        if arrays[..i].iter().any(|(n, _)| n == name) {
            return Err(NpzError::DuplicateName(name.clone()));
        }
    }

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    let mut zip = ZipWriter::new(BufWriter::new(tmp));

    for (name, array) in arrays {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        zip.start_file(format!("{}.npy", name), options)?;
        zip.write_all(&encode_npy(array))?;
        trace!("npz member {} shape {:?}", name, array.shape());
    }

    let writer = zip.finish()?;
    let tmp = writer.into_inner().map_err(|e| e.into_error())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Reads every member of the archive, in archive order.
pub fn read_npz<P: AsRef<Path>>(path: P) -> Result<Vec<(String, Array2<f64>)>, NpzError> {
    let file = File::open(path.as_ref())?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let mut out = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut member = archive.by_index(i)?;
        let member_name = member.name().to_string();
        /// the declared size is only a hint from the archive
        let hint = usize::try_from(member.size()).unwrap_or(0).min(MAX_SIZE_HINT);
        let mut bytes = Vec::with_capacity(hint);
        member.read_to_end(&mut bytes)?;

        let name = member_name
            .strip_suffix(".npy")
            .unwrap_or(&member_name)
            .to_string();
        let array = decode_npy(&name, &bytes)?;
        out.push((name, array));
    }
    Ok(out)
}

fn header_text(shape: (usize, usize)) -> String {
    let dict = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, {}), }}",
        shape.0, shape.1
    );
    /// pad with spaces so the data starts on an aligned offset, newline last
    let unpadded = PREAMBLE_LEN + dict.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    format!("{}{}\n", dict, " ".repeat(padding))
}

/// Serializes one matrix as an npy v1.0 byte stream.
pub fn encode_npy(array: &Array2<f64>) -> Vec<u8> {
    let header = header_text(array.dim());
    let mut out = Vec::with_capacity(PREAMBLE_LEN + header.len() + array.len() * 8);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    /// iter() walks logical (row-major) order regardless of memory layout
    for v in array.iter() {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Parses an npy v1.0 byte stream holding a C-ordered `<f8` matrix.
pub fn decode_npy(name: &str, bytes: &[u8]) -> Result<Array2<f64>, NpzError> {
    if bytes.len() < PREAMBLE_LEN || &bytes[..MAGIC.len()] != MAGIC || bytes[6] != 1 {
        return Err(NpzError::BadMagic(name.to_string()));
    }
    let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let data_start = PREAMBLE_LEN + header_len;
    if bytes.len() < data_start {
        return Err(NpzError::BadMagic(name.to_string()));
    }
    let header = String::from_utf8_lossy(&bytes[PREAMBLE_LEN..data_start]).to_string();

    let unsupported = || NpzError::UnsupportedHeader {
        name: name.to_string(),
        header: header.trim_end().to_string(),
    };

    if !header.contains("'descr': '<f8'") || !header.contains("'fortran_order': False") {
        return Err(unsupported());
    }
    let (rows, cols) = parse_shape(&header).ok_or_else(unsupported)?;

    let data = &bytes[data_start..];
    let expected = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(8))
        .ok_or_else(unsupported)?;
    if data.len() < expected {
        return Err(NpzError::Truncated {
            name: name.to_string(),
            expected,
            found: data.len(),
        });
    }

    let values = data[..expected]
        .chunks_exact(8)
        .map(|c| {
            let mut b = [0u8; 8];
            b.copy_from_slice(c);
            f64::from_le_bytes(b)
        })
        .collect::<Vec<_>>();
    Ok(Array2::from_shape_vec((rows, cols), values)?)
}

fn parse_shape(header: &str) -> Option<(usize, usize)> {
    let start = header.find("'shape': (")? + "'shape': (".len();
    let end = start + header[start..].find(')')?;
    let dims = header[start..end]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().ok())
        .collect::<Option<Vec<_>>>()?;
    match dims.as_slice() {
        [rows, cols] => Some((*rows, *cols)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn header_matches_numpy_layout() {
        let bytes = encode_npy(&array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0]]);
        assert_eq!(&bytes[..6], MAGIC);
        assert_eq!(&bytes[6..8], &[1, 0]);

        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((PREAMBLE_LEN + header_len) % HEADER_ALIGN, 0);

        let header = std::str::from_utf8(&bytes[PREAMBLE_LEN..PREAMBLE_LEN + header_len]).unwrap();
        assert!(header.starts_with("{'descr': '<f8', 'fortran_order': False, 'shape': (4, 2), }"));
        assert!(header.ends_with('\n'));

        assert_eq!(bytes.len(), PREAMBLE_LEN + header_len + 8 * 8);
        let first = f64::from_le_bytes(bytes[PREAMBLE_LEN + header_len..][..8].try_into().unwrap());
        assert_eq!(first, 1.0);
    }

    #[test]
    fn transposed_views_are_written_row_major() {
        let a = array![[1.0, 3.0], [2.0, 4.0]];
        let t = a.t().to_owned();
        let decoded = decode_npy("t", &encode_npy(&t)).unwrap();
        assert_eq!(decoded, array![[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn archive_round_trip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.npz");

        let arrays = vec![
            (
                "corners_0".to_string(),
                array![[0.1, 0.2], [1e-300, -3.5], [f64::MAX, 1.0 / 3.0], [812.4375, 96.0]],
            ),
            ("empty".to_string(), Array2::zeros((0, 2))),
        ];
        write_npz(&path, &arrays).unwrap();

        let loaded = read_npz(&path).unwrap();
        assert_eq!(loaded, arrays);
    }

    #[test]
    fn duplicate_names_are_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.npz");
        let arrays = vec![
            ("a".to_string(), Array2::zeros((1, 2))),
            ("a".to_string(), Array2::zeros((1, 2))),
        ];
        assert!(matches!(write_npz(&path, &arrays), Err(NpzError::DuplicateName(_))));
        assert!(!path.exists());
    }

    #[test]
    fn foreign_dtypes_are_refused() {
        let mut bytes = encode_npy(&array![[1.0, 2.0]]);
        let pos = bytes.windows(3).position(|w| w == b"<f8").unwrap();
        bytes[pos..pos + 3].copy_from_slice(b"<i8");
        assert!(matches!(
            decode_npy("ints", &bytes),
            Err(NpzError::UnsupportedHeader { .. })
        ));
    }

    #[test]
    fn short_data_is_reported() {
        let bytes = encode_npy(&array![[1.0, 2.0], [3.0, 4.0]]);
        let cut = &bytes[..bytes.len() - 8];
        assert!(matches!(
            decode_npy("cut", cut),
            Err(NpzError::Truncated { expected: 32, found: 24, .. })
        ));
    }

    #[test]
    fn overwrite_replaces_archive_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.npz");
        std::fs::write(&path, b"previous run").unwrap();

        let arrays = vec![("corners_0".to_string(), Array2::from_elem((4, 2), 2.5))];
        write_npz(&path, &arrays).unwrap();

        assert_eq!(read_npz(&path).unwrap(), arrays);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_replace_cleans_up_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        /// a directory in the way makes the final rename fail
        let path = dir.path().join("points.npz");
        std::fs::create_dir(&path).unwrap();

        let arrays = vec![("a".to_string(), Array2::zeros((1, 2)))];
        assert!(matches!(write_npz(&path, &arrays), Err(NpzError::Io(_))));

        assert!(path.is_dir());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn oversized_shapes_are_refused() {
        let mut bytes = encode_npy(&array![[1.0, 2.0]]);
        let pos = bytes.windows(6).position(|w| w == b"(1, 2)").unwrap();
        let huge = format!("({}, 2)", usize::MAX / 2);
        let mut patched = bytes[..pos].to_vec();
        patched.extend_from_slice(huge.as_bytes());
        patched.extend_from_slice(&bytes[pos + 6..]);
        /// keep the declared header length in step with the longer text
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize + huge.len() - 6;
        patched[8..10].copy_from_slice(&(header_len as u16).to_le_bytes());
        bytes = patched;

        assert!(matches!(
            decode_npy("huge", &bytes),
            Err(NpzError::UnsupportedHeader { .. })
        ));
    }

    #[test]
    fn garbage_is_not_npy() {
        assert!(matches!(decode_npy("x", b"hello world"), Err(NpzError::BadMagic(_))));
    }
}
