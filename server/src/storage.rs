use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use log::{debug, info};
use rand::RngCore;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

const TEMP_PREFIX: &str = ".uploading";
const PAYLOAD_EXTENSION: &str = "payload";
const ANONYMOUS_DIR: &str = "anonymous";
const ACCOUNTS_DIR: &str = "accounts";

/// Who a stored payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner<'a> {
    Anonymous,
    Account(&'a str),
}

impl fmt::Display for Owner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Anonymous => f.write_str("anonymous sender"),
            Owner::Account(login) => write!(f, "account {login}"),
        }
    }
}

/// Anonymous payloads and account payloads live under separate roots, so no
/// login can land in the anonymous directory.
pub fn owner_dir(storage_path: impl AsRef<Path>, owner: Owner<'_>) -> Result<PathBuf> {
    let storage_path = storage_path.as_ref();
    match owner {
        Owner::Anonymous => Ok(storage_path.join(ANONYMOUS_DIR)),
        Owner::Account(login) => {
            if login.is_empty() || login == "." || login == ".." || login.contains(['/', '\\']) {
                bail!("Login {login:?} cannot be used as a storage directory");
            }
            Ok(storage_path.join(ACCOUNTS_DIR).join(login))
        }
    }
}

/// Incoming payload spooled to a temp file in the storage root.
///
/// The temp file is removed on drop unless `persist` moved it into place.
#[derive(Debug)]
pub struct PayloadWriter {
    file: File,
    temp_path: PathBuf,
    size: u64,
    released: bool,
}

impl PayloadWriter {
    pub async fn create(storage_path: impl AsRef<Path>) -> std::io::Result<Self> {
        loop {
            let temp_path = storage_path.as_ref().join(format!(
                "{TEMP_PREFIX}-{:08x}.tmp",
                rand::thread_rng().next_u32()
            ));
            match File::options()
                .create_new(true)
                .write(true)
                .open(&temp_path)
                .await
            {
                Ok(file) => {
                    debug!("Spooling payload to {temp_path:?}");
                    return Ok(Self {
                        file,
                        temp_path,
                        size: 0,
                        released: false,
                    });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.file.write_all(data).await?;
        self.size += data.len() as u64;
        Ok(())
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Moves the payload to `<owner dir>/<time>-<random>.payload`.
    ///
    /// On any error the temp file is still owned by the writer and goes
    /// away with it.
    pub async fn persist(
        mut self,
        storage_path: impl AsRef<Path>,
        owner: Owner<'_>,
        time: u64,
    ) -> Result<PathBuf> {
        let dir = owner_dir(storage_path, owner)?;
        self.file.sync_all().await?;
        tokio::fs::create_dir_all(&dir).await?;

        let payload_path = loop {
            let path = dir.join(format!(
                "{time}-{:08x}.{PAYLOAD_EXTENSION}",
                rand::thread_rng().next_u32()
            ));
            if !tokio::fs::try_exists(&path).await? {
                break path;
            }
        };
        tokio::fs::rename(&self.temp_path, &payload_path).await?;
        self.released = true;
        info!("Payload of {} bytes from {owner} written to {payload_path:?}", self.size);

        Ok(payload_path)
    }

    pub async fn discard(mut self) -> std::io::Result<()> {
        self.released = true;
        tokio::fs::remove_file(&self.temp_path).await
    }
}

impl Drop for PayloadWriter {
    fn drop(&mut self) {
        if !self.released {
            std::fs::remove_file(&self.temp_path).ok();
        }
    }
}
