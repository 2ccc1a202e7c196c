//! Durable local store for data fetched from the network.
//!
//! Everything stored here is keyed by CID and therefore never invalidated.

use crate::error::{ClientError, ClientResult};
use bytes::Bytes;
use cairn_core::Cid;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const LISTINGS_DIR: &str = "listings";

pub struct BlockStore {
    root: PathBuf,
}

impl BlockStore {
    /// Open the store at `root`, creating its layout if needed.
    pub async fn open(root: impl AsRef<Path>) -> ClientResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(LISTINGS_DIR))
            .await
            .map_err(|e| {
                ClientError::Construction(format!(
                    "failed to open block store at {}: {e}",
                    root.display()
                ))
            })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn listing_path(&self, cid: &Cid) -> PathBuf {
        self.root.join(LISTINGS_DIR).join(format!("{cid}.json"))
    }

    /// Raw listing payload for `cid`, if stored.
    pub async fn get_listing(&self, cid: &Cid) -> Option<Bytes> {
        match fs::read(self.listing_path(cid)).await {
            Ok(data) => Some(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(cid = %cid, error = %e, "Failed to read stored listing");
                None
            }
        }
    }

    /// Store a listing payload atomically.
    pub async fn put_listing(&self, cid: &Cid, data: &[u8]) -> std::io::Result<()> {
        let path = self.listing_path(cid);
        let temp_path = path.with_extension(format!("tmp.{}", Uuid::new_v4()));
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
        Ok(())
    }
}
