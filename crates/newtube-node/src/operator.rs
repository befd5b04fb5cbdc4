//! Operator commands: key generation and data-directory backup/restore.
//!
//! No diagnostics bundle here: there's no API/metrics server on this
//! node to diagnose.

use anyhow::{Context, Result};
use newtube_identity::Keypair;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Result of a backup operation.
#[derive(Debug, Serialize, Deserialize)]
pub struct BackupInfo {
    pub data_dir: PathBuf,
    pub output_path: PathBuf,
    pub size_bytes: u64,
    pub checksum: String,
}

/// Generates a fresh writer keypair, returning its seed and public key
/// as hex strings. The seed is what `swarm_key_path` persists.
#[must_use]
pub fn keygen() -> (String, String) {
    let keypair = Keypair::generate();
    let seed_hex = hex::encode(keypair.to_seed_bytes());
    let public_hex = keypair.public_key().to_string();
    (seed_hex, public_hex)
}

/// Generates a keypair and writes its seed to `path`, returning the
/// public key.
pub fn keygen_to_file(path: &Path) -> Result<String> {
    let (seed_hex, public_hex) = keygen();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, seed_hex).context("writing swarm key file")?;
    Ok(public_hex)
}

/// Loads the keypair persisted by [`keygen_to_file`].
pub fn load_keypair(path: &Path) -> Result<Keypair> {
    let seed_hex = fs::read_to_string(path).context("reading swarm key file")?;
    let bytes = hex::decode(seed_hex.trim()).context("swarm key file is not valid hex")?;
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("swarm key file must contain a 32-byte seed"))?;
    Ok(Keypair::from_seed(seed))
}

/// Tars and gzips `data_dir` into `output_path`, recording a SHA-256
/// checksum of the archive.
pub fn create_backup(data_dir: &Path, output_path: &Path) -> Result<BackupInfo> {
    if !data_dir.exists() {
        anyhow::bail!("data directory does not exist: {}", data_dir.display());
    }
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tar_file = File::create(output_path).context("creating backup file")?;
    let encoder = flate2::write::GzEncoder::new(tar_file, flate2::Compression::default());
    let mut tar = tar::Builder::new(encoder);
    tar.append_dir_all(".", data_dir)
        .context("adding data directory to backup")?;
    tar.finish().context("finalizing backup")?;

    let checksum = sha256_file(output_path)?;
    let size_bytes = fs::metadata(output_path)?.len();

    Ok(BackupInfo {
        data_dir: data_dir.to_path_buf(),
        output_path: output_path.to_path_buf(),
        size_bytes,
        checksum,
    })
}

/// Extracts a backup produced by [`create_backup`] into `target_dir`.
pub fn restore_backup(backup_path: &Path, target_dir: &Path) -> Result<()> {
    if !backup_path.exists() {
        anyhow::bail!("backup file does not exist: {}", backup_path.display());
    }
    fs::create_dir_all(target_dir)?;

    let file = File::open(backup_path)?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);
    archive.unpack(target_dir).context("extracting backup")?;

    tracing::info!(
        backup = %backup_path.display(),
        target = %target_dir.display(),
        "restored node data directory from backup"
    );
    Ok(())
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
