//! Content digests and gzip trailer sizes

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Read size used when streaming a file through the hasher
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Compute the SHA-256 of a file's contents as lowercase hex.
///
/// The file is streamed in [`HASH_CHUNK_SIZE`] chunks. A missing or
/// unreadable file is an error.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Read the uncompressed size recorded in a gzip stream's trailer.
///
/// gzip ends with ISIZE: the input length modulo 2^32, little-endian, in
/// the last four bytes. The value is only meaningful for gzip payloads and
/// wraps for inputs of 4 GiB or more. Files shorter than four bytes are an
/// error.
pub fn gzip_uncompressed_size(path: &Path) -> io::Result<u32> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::End(-4))?;
    let mut trailer = [0u8; 4];
    file.read_exact(&mut trailer)?;
    Ok(u32::from_le_bytes(trailer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_empty_file_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, b"").unwrap();

        assert_eq!(sha256_file(&path).unwrap(), EMPTY_SHA256);
    }

    #[test]
    fn test_known_vector() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("abc");
        fs::write(&path, b"abc").unwrap();

        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_deterministic_and_content_sensitive() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        // Larger than one chunk so the streaming path is exercised.
        let mut content = vec![0x5au8; HASH_CHUNK_SIZE * 2 + 17];
        fs::write(&a, &content).unwrap();
        content[HASH_CHUNK_SIZE + 3] ^= 1;
        fs::write(&b, &content).unwrap();

        let first = sha256_file(&a).unwrap();
        assert_eq!(first, sha256_file(&a).unwrap());
        assert_ne!(first, sha256_file(&b).unwrap());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let err = sha256_file(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_trailer_read_little_endian() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("payload.gz");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"arbitrary compressed bytes").unwrap();
        file.write_all(&0x0102_0304u32.to_le_bytes()).unwrap();
        drop(file);

        assert_eq!(gzip_uncompressed_size(&path).unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_trailer_matches_real_gzip() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rootfs.img.gz");
        let payload = vec![7u8; 123_456];
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();

        assert_eq!(gzip_uncompressed_size(&path).unwrap(), 123_456);
    }

    #[test]
    fn test_short_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short");
        fs::write(&path, b"abc").unwrap();

        assert!(gzip_uncompressed_size(&path).is_err());
    }

    #[test]
    fn test_exactly_four_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("four");
        fs::write(&path, 42u32.to_le_bytes()).unwrap();

        assert_eq!(gzip_uncompressed_size(&path).unwrap(), 42);
    }
}
