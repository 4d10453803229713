//! Transfer proof images.
//!
//! Batch items only carry the filename handed out by a [`ProofStore`]. Rows
//! written before proofs moved out of the database may still hold an inline
//! `data:image/<ext>;base64,<payload>` value until [`migrate_inline_proofs`]
//! rewrites them.

use crate::{
    core::{
        batch::get_batch_by_id,
        batch_item::{BatchItemPatch, get_batch_item_by_id, update_batch_item},
        recipient::get_recipient_by_id,
    },
    entities::{BatchItem, PaymentMethod, TransferStatus, batch_item},
    errors::{Error, Result},
};
use async_trait::async_trait;
use base64::Engine as _;
use chrono::Utc;
use sea_orm::{Set, prelude::*};
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

const INLINE_PREFIX: &str = "data:";

/// Storage for proof image bytes, addressed by filename.
#[async_trait]
pub trait ProofStore: Send + Sync {
    /// Stores `bytes` as `{base_name}.{extension}` and returns the filename.
    async fn save(&self, bytes: &[u8], base_name: &str, extension: &str) -> Result<String>;

    /// Bytes of `filename`, or `None` if it is not stored.
    async fn read(&self, filename: &str) -> Result<Option<Vec<u8>>>;

    /// Removes `filename`. Missing files are not an error.
    async fn delete(&self, filename: &str) -> Result<()>;
}

/// Filename for a proof: whitespace runs in `base_name` become `-`.
fn stored_name(base_name: &str, extension: &str) -> Result<String> {
    let base = base_name.split_whitespace().collect::<Vec<_>>().join("-");
    let name = format!("{base}.{extension}");
    check_filename(&name)?;
    Ok(name)
}

fn check_filename(filename: &str) -> Result<()> {
    let invalid = filename.is_empty()
        || filename.starts_with('.')
        || filename.contains("..")
        || filename.contains(['/', '\\']);
    if invalid {
        return Err(Error::Validation {
            message: format!("Invalid proof filename '{filename}'"),
        });
    }
    Ok(())
}

/// Proof store rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct FsProofStore {
    root: PathBuf,
}

impl FsProofStore {
    /// A store writing under `root`, created on first save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory the files live in.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, filename: &str) -> Result<PathBuf> {
        check_filename(filename)?;
        Ok(self.root.join(filename))
    }
}

#[async_trait]
impl ProofStore for FsProofStore {
    async fn save(&self, bytes: &[u8], base_name: &str, extension: &str) -> Result<String> {
        let filename = stored_name(base_name, extension)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.path_of(&filename)?, bytes).await?;
        Ok(filename)
    }

    async fn read(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_of(filename)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, filename: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_of(filename)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Proof store kept in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryProofStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryProofStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored files.
    pub async fn len(&self) -> usize {
        self.files.lock().await.len()
    }

    /// Whether nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.files.lock().await.is_empty()
    }
}

#[async_trait]
impl ProofStore for MemoryProofStore {
    async fn save(&self, bytes: &[u8], base_name: &str, extension: &str) -> Result<String> {
        let filename = stored_name(base_name, extension)?;
        self.files.lock().await.insert(filename.clone(), bytes.to_vec());
        Ok(filename)
    }

    async fn read(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.files.lock().await.get(filename).cloned())
    }

    async fn delete(&self, filename: &str) -> Result<()> {
        self.files.lock().await.remove(filename);
        Ok(())
    }
}

/// Reduces `value` to runs of ASCII letters and digits joined by `-`,
/// at most 80 characters.
#[must_use]
pub fn filename_part(value: &str) -> String {
    let joined = value
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|run| !run.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let mut part: String = joined.chars().take(80).collect();
    while part.ends_with('-') {
        part.pop();
    }
    part
}

/// Base filename for an item's proof: the batch description, batch name and
/// recipient name followed by the item id, so no two items share a file.
#[must_use]
pub fn proof_base_name(
    item_id: i64,
    batch_description: Option<&str>,
    batch_name: Option<&str>,
    recipient_name: Option<&str>,
) -> String {
    let parts: Vec<String> = [batch_description, batch_name, recipient_name]
        .into_iter()
        .flatten()
        .map(filename_part)
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        format!("proof-{item_id}")
    } else {
        format!("{}-{item_id}", parts.join("-"))
    }
}

/// Splits an inline `data:image/<ext>;base64,<payload>` value.
fn parse_inline(value: &str) -> Option<(&str, &str)> {
    let (ext, payload) = value.strip_prefix("data:image/")?.split_once(";base64,")?;
    let ext_ok = !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    (ext_ok && !payload.is_empty()).then_some((ext, payload))
}

fn decode_inline(value: &str) -> Result<(String, Vec<u8>)> {
    let (ext, payload) = parse_inline(value).ok_or_else(|| Error::Validation {
        message: "Inline proof is not a base64 image data URL".to_string(),
    })?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| Error::Validation {
            message: format!("Inline proof is not valid base64: {e}"),
        })?;
    let ext = if ext == "jpeg" { "jpg" } else { ext };
    Ok((ext.to_string(), bytes))
}

/// Deletes a proof file the item no longer references. Failures are only
/// logged.
async fn discard_stored(store: &dyn ProofStore, previous: Option<&str>, current: Option<&str>) {
    let Some(filename) = previous.filter(|p| !p.starts_with(INLINE_PREFIX)) else {
        return;
    };
    if current == Some(filename) {
        return;
    }
    if let Err(e) = store.delete(filename).await {
        warn!(%filename, error = %e, "Failed to delete replaced proof");
    }
}

/// Stores `bytes` as the proof of an item and marks the item transferred.
///
/// The new file is saved and the item updated before any previous proof file
/// is deleted. Returns `None` if the item does not exist.
#[instrument(skip(db, store, bytes), fields(size = bytes.len()))]
pub async fn attach_proof(
    db: &DatabaseConnection,
    store: &dyn ProofStore,
    item_id: i64,
    bytes: &[u8],
    extension: &str,
) -> Result<Option<batch_item::Model>> {
    if bytes.is_empty() {
        return Err(Error::Validation {
            message: "Proof image is empty".to_string(),
        });
    }
    let Some(item) = get_batch_item_by_id(db, item_id).await? else {
        return Ok(None);
    };

    let batch = get_batch_by_id(db, item.batch_id).await?;
    let recipient = get_recipient_by_id(db, item.recipient_id).await?;
    let base_name = proof_base_name(
        item.id,
        batch.as_ref().and_then(|b| b.description.as_deref()),
        batch.as_ref().map(|b| b.name.as_str()),
        recipient.as_ref().map(|r| r.name.as_str()),
    );
    let filename = store.save(bytes, &base_name, extension).await?;
    info!(item_id, %filename, "Saved transfer proof");

    let patch = BatchItemPatch {
        payment_method: Some(PaymentMethod::Transfer),
        transfer_status: Some(TransferStatus::Done),
        transfer_at: Some(Some(Utc::now())),
        transfer_proof: Some(Some(filename.clone())),
        ..Default::default()
    };
    let updated = match update_batch_item(db, item_id, patch).await {
        Ok(Some(updated)) => updated,
        outcome => {
            // The row never pointed at the new file
            if item.transfer_proof.as_deref() != Some(filename.as_str()) {
                discard_stored(store, Some(filename.as_str()), None).await;
            }
            return outcome;
        }
    };

    discard_stored(store, item.transfer_proof.as_deref(), Some(filename.as_str())).await;
    Ok(Some(updated))
}

/// Returns an item to pending, then deletes its proof file.
#[instrument(skip(db, store))]
pub async fn remove_proof(
    db: &DatabaseConnection,
    store: &dyn ProofStore,
    item_id: i64,
) -> Result<Option<batch_item::Model>> {
    let Some(item) = get_batch_item_by_id(db, item_id).await? else {
        return Ok(None);
    };

    let patch = BatchItemPatch {
        transfer_status: Some(TransferStatus::Pending),
        transfer_at: Some(None),
        transfer_proof: Some(None),
        ..Default::default()
    };
    let updated = update_batch_item(db, item_id, patch).await?;
    if updated.is_some() {
        discard_stored(store, item.transfer_proof.as_deref(), None).await;
    }
    Ok(updated)
}

/// Image bytes of an item's proof, decoding legacy inline values.
pub async fn read_proof(
    db: &DatabaseConnection,
    store: &dyn ProofStore,
    item_id: i64,
) -> Result<Option<Vec<u8>>> {
    let Some(proof) = get_batch_item_by_id(db, item_id)
        .await?
        .and_then(|item| item.transfer_proof)
    else {
        return Ok(None);
    };
    if proof.starts_with(INLINE_PREFIX) {
        return decode_inline(&proof).map(|(_, bytes)| Some(bytes));
    }
    store.read(&proof).await
}

/// Moves inline base64 proofs into `store`. Returns the number migrated;
/// rows that fail are logged and left as they are.
#[instrument(skip(db, store))]
pub async fn migrate_inline_proofs(db: &DatabaseConnection, store: &dyn ProofStore) -> Result<usize> {
    let rows = BatchItem::find()
        .filter(batch_item::Column::TransferProof.starts_with(INLINE_PREFIX))
        .all(db)
        .await?;
    if rows.is_empty() {
        return Ok(0);
    }
    info!(count = rows.len(), "Migrating inline proofs");

    let mut migrated = 0;
    for row in rows {
        let Some(inline) = row.transfer_proof.as_deref() else {
            continue;
        };
        let (ext, bytes) = match decode_inline(inline) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(item_id = row.id, error = %e, "Skipping inline proof");
                continue;
            }
        };
        let filename = match store.save(&bytes, &format!("proof-{}", row.id), &ext).await {
            Ok(filename) => filename,
            Err(e) => {
                warn!(item_id = row.id, error = %e, "Failed to store inline proof");
                continue;
            }
        };

        let item_id = row.id;
        let mut item: batch_item::ActiveModel = row.into();
        item.transfer_proof = Set(Some(filename.clone()));
        item.update(db).await?;
        info!(item_id, size = bytes.len(), %filename, "Migrated inline proof");
        migrated += 1;
    }
    Ok(migrated)
}
