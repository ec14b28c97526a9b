use std::{fs::File, io::Read, path::Path};

use sha3::{Digest, Sha3_256};

use crate::error::{Result, ResultExt};

/// Computes the SHA3-256 hash of a file as lowercase hex
pub fn compute_file_hash<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha3_256::new();
    let mut buffer = [0; 8192];

    loop {
        let count = file
            .read(&mut buffer)
            .with_context(|| format!("reading {}", path.display()))?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Computes the SHA3-256 hash of byte data
pub fn compute_sha3_256(data: &[u8]) -> String {
    hex::encode(Sha3_256::digest(data))
}
