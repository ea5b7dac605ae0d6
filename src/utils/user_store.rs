#![forbid(unsafe_code)]

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures::future::try_join_all;
use log::{debug, error, info};
use uuid::Uuid;

use crate::utils::errors::StoreError;
use crate::utils::record_types::{StoredUser, UserRecord};
use crate::utils::userdir_utils::get_files_in_dir;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const RECORD_SUFFIX : &str = ".json";
const TEMP_SUFFIX   : &str = ".tmp";

type UserLock = Arc<tokio::sync::Mutex<()>>;

// ***************************************************************************
//                             UserRecordStore
// ***************************************************************************
/** One JSON document per username in a flat base directory.  Nothing is
 * cached between calls; every read goes to disk.
 *
 * Writers (update and delete) are serialized per username.  Readers take no
 * lock because replacement is a rename, so a reader always sees a whole
 * document.
 */
#[derive(Debug)]
pub struct UserRecordStore {
    base_dir: PathBuf,
    locks: Mutex<HashMap<String, UserLock>>,
}

impl UserRecordStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {base_dir: base_dir.into(), locks: Mutex::new(HashMap::new())}
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    // ---------------------------------------------------------------------------
    // resolve_path:
    // ---------------------------------------------------------------------------
    /** The file holding a username's record.  The username is not validated,
     * so a name containing path separators or ".." escapes the base directory.
     */
    pub fn resolve_path(&self, username: &str) -> PathBuf {
        self.base_dir.join(format!("{}{}", username, RECORD_SUFFIX))
    }

    // ---------------------------------------------------------------------------
    // read_one:
    // ---------------------------------------------------------------------------
    pub async fn read_one(&self, username: &str) -> Result<UserRecord, StoreError> {
        let stored = self.read_stored(username).await?;
        Ok(UserRecord::from(stored))
    }

    // ---------------------------------------------------------------------------
    // list_all:
    // ---------------------------------------------------------------------------
    /** Read every record in the base directory concurrently.  The result is
     * either every record, sorted by username, or the first failure.
     */
    pub async fn list_all(&self) -> Result<Vec<UserRecord>, StoreError> {
        let usernames = self.record_usernames().await?;
        let reads = usernames.iter().map(|u| self.read_one(u));
        let mut records = try_join_all(reads).await?;
        records.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(records)
    }

    // ---------------------------------------------------------------------------
    // list_usernames:
    // ---------------------------------------------------------------------------
    /** The file stems of the record files in the base directory, sorted.  This
     * blocks, so it's meant for startup diagnostics; request paths go through
     * record_usernames.
     */
    pub fn list_usernames(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.base_dir.to_string_lossy();
        if !self.base_dir.is_dir() {
            return Err(StoreError::ReadError {
                path: dir.to_string(),
                source: std::io::Error::new(ErrorKind::NotFound, "base directory does not exist"),
            });
        }
        let files = get_files_in_dir(&dir, RECORD_SUFFIX).map_err(|e| StoreError::ReadError {
            path: dir.to_string(),
            source: std::io::Error::new(ErrorKind::Other, e.to_string()),
        })?;

        let mut usernames: Vec<String> = files
            .iter()
            .filter_map(|f| record_stem(f))
            .collect();
        usernames.sort();
        Ok(usernames)
    }

    // ---------------------------------------------------------------------------
    // update_location:
    // ---------------------------------------------------------------------------
    /** Replace the user's whole location mapping.  The new values are stored
     * verbatim; title casing happens on read.
     */
    pub async fn update_location(&self, username: &str, new_location: BTreeMap<String, String>)
    -> Result<(), StoreError> {
        let lock = self.user_lock(username);
        let result = {
            let _guard = lock.lock().await;
            self.replace_location(username, new_location).await
        };
        self.release_lock(username, lock);
        result
    }

    // ---------------------------------------------------------------------------
    // delete_user:
    // ---------------------------------------------------------------------------
    pub async fn delete_user(&self, username: &str) -> Result<(), StoreError> {
        let lock = self.user_lock(username);
        let result = {
            let _guard = lock.lock().await;
            self.remove_file(username).await
        };
        self.release_lock(username, lock);
        result
    }

    // ***************************************************************************
    //                             Private Methods
    // ***************************************************************************
    // ---------------------------------------------------------------------------
    // record_usernames:
    // ---------------------------------------------------------------------------
    /** Async counterpart of list_usernames.  A missing base directory is a
     * ReadError, not an empty listing.
     */
    async fn record_usernames(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.base_dir.to_string_lossy().to_string();
        let read_error = |e: std::io::Error| StoreError::ReadError {path: dir.clone(), source: e};

        let mut entries = tokio::fs::read_dir(&self.base_dir).await.map_err(read_error)?;
        let mut usernames = vec!();
        while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
            if !entry.file_type().await.map_err(read_error)?.is_file() {
                continue;
            }
            if let Some(u) = record_stem(&entry.path()) {
                usernames.push(u);
            }
        }
        usernames.sort();
        Ok(usernames)
    }

    // ---------------------------------------------------------------------------
    // replace_location:
    // ---------------------------------------------------------------------------
    // Caller holds the user's lock.
    async fn replace_location(&self, username: &str, new_location: BTreeMap<String, String>)
    -> Result<(), StoreError> {
        let mut stored = self.read_stored(username).await?;
        stored.location = new_location;
        self.replace_file(username, &stored).await?;

        info!("Location of user {} replaced ({} field(s)).", username, stored.location.len());
        Ok(())
    }

    // ---------------------------------------------------------------------------
    // remove_file:
    // ---------------------------------------------------------------------------
    // Caller holds the user's lock.
    async fn remove_file(&self, username: &str) -> Result<(), StoreError> {
        let path = self.resolve_path(username);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => (),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(username.to_string()));
            },
            Err(e) => {
                return Err(StoreError::WriteError {path: path.to_string_lossy().to_string(), source: e});
            },
        }

        info!("User {} deleted.", username);
        Ok(())
    }

    // ---------------------------------------------------------------------------
    // read_stored:
    // ---------------------------------------------------------------------------
    async fn read_stored(&self, username: &str) -> Result<StoredUser, StoreError> {
        let path = self.resolve_path(username);
        let contents = match tokio::fs::read(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(username.to_string()));
            },
            Err(e) => {
                return Err(StoreError::ReadError {path: path.to_string_lossy().to_string(), source: e});
            },
        };

        serde_json::from_slice::<StoredUser>(&contents).map_err(|e| {
            let err = StoreError::Corrupt {username: username.to_string(), reason: e.to_string()};
            error!("{}", err);
            err
        })
    }

    // ---------------------------------------------------------------------------
    // replace_file:
    // ---------------------------------------------------------------------------
    /** Write the document to a temporary file next to the target and rename it
     * over the target.  On failure the temporary file is removed and the old
     * record is untouched.
     */
    async fn replace_file(&self, username: &str, stored: &StoredUser) -> Result<(), StoreError> {
        let path = self.resolve_path(username);
        let tmp_path = self.base_dir.join(format!(".{}.{}{}", username, Uuid::new_v4(), TEMP_SUFFIX));

        let contents = serde_json::to_vec_pretty(stored).map_err(|e| StoreError::WriteError {
            path: path.to_string_lossy().to_string(),
            source: std::io::Error::new(ErrorKind::InvalidData, e),
        })?;

        let result = match tokio::fs::write(&tmp_path, &contents).await {
            Ok(()) => tokio::fs::rename(&tmp_path, &path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            if let Err(rm) = tokio::fs::remove_file(&tmp_path).await {
                debug!("Temporary file {} not removed: {}", tmp_path.to_string_lossy(), rm);
            }
            let err = StoreError::WriteError {path: path.to_string_lossy().to_string(), source: e};
            error!("{}", err);
            return Err(err);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------------
    // user_lock:
    // ---------------------------------------------------------------------------
    fn user_lock(&self, username: &str) -> UserLock {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(username.to_string()).or_default().clone()
    }

    // ---------------------------------------------------------------------------
    // release_lock:
    // ---------------------------------------------------------------------------
    /** Drop the user's map entry once no other writer holds or awaits it.  The
     * map and our handle account for two references; any more means another
     * writer still needs the entry.
     */
    fn release_lock(&self, username: &str, lock: UserLock) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let unused = locks.get(username)
            .is_some_and(|l| Arc::ptr_eq(l, &lock) && Arc::strong_count(&lock) == 2);
        if unused {
            locks.remove(username);
        }
    }
}

// ---------------------------------------------------------------------------
// record_stem:
// ---------------------------------------------------------------------------
/** The username of a record file path, or None for any other file. */
fn record_stem(path: &Path) -> Option<String> {
    path.file_name()?.to_str()?.strip_suffix(RECORD_SUFFIX).map(str::to_owned)
}
