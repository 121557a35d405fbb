// src/freshness/signature.rs

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;

use crate::fileset::glob_matches;
use crate::fs::FileSystem;

/// Hex blake3 digest of an in-memory buffer.
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Compute the hash of a single file, streaming its content.
pub fn hash_file(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut reader = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hash of the sorted list of files a glob matches below `dir` (`skip`
/// excluded). Changes when a matching file is added, removed or renamed.
pub fn glob_signature(fs: &dyn FileSystem, dir: &Path, pattern: &str, skip: &Path) -> Result<String> {
    let matches = glob_matches(fs, dir, pattern, skip)?;
    Ok(hash_bytes(matches.join("\n").as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn streamed_hash_matches_buffer_hash() {
        let fs = MockFileSystem::new();
        let content = vec![7u8; 20_000];
        fs.add_file("big.bin", content.clone());

        assert_eq!(hash_file(&fs, Path::new("big.bin")).unwrap(), hash_bytes(&content));
    }

    #[test]
    fn glob_signature_tracks_the_match_list() {
        let fs = MockFileSystem::new();
        fs.add_file("/s/scss/main.scss", "@import 'blocks/*.scss';");
        fs.add_file("/s/scss/blocks/_a.scss", "a");
        let dir = Path::new("/s/scss");
        let main = Path::new("/s/scss/main.scss");

        let before = glob_signature(&fs, dir, "blocks/*.scss", main).unwrap();
        fs.add_file("/s/scss/blocks/_a.scss", "edited");
        assert_eq!(glob_signature(&fs, dir, "blocks/*.scss", main).unwrap(), before);

        fs.add_file("/s/scss/blocks/_b.scss", "b");
        assert_ne!(glob_signature(&fs, dir, "blocks/*.scss", main).unwrap(), before);
    }
}
