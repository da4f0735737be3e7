//! Storage module for saving and loading users and their study items.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{IdSequence, StudyItem, User};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("User not found: {0}")]
    UserNotFound(u64),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Persists a user's whole collection and review history in one go.
///
/// Saving unchanged data twice must have no further observable effect.
pub trait UserStore {
    fn save(&self, user: &User) -> Result<()>;
}

/// One pretty-printed JSON document per user under `<data_dir>/users/`.
pub struct JsonUserStore {
    users_dir: PathBuf,
}

impl JsonUserStore {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        let users_dir = data_dir.join("users");
        fs::create_dir_all(&users_dir)?;
        Ok(Self { users_dir })
    }

    /// Get default storage location.
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("emphizor")
    }

    fn user_path(&self, user_id: u64) -> PathBuf {
        self.users_dir.join(format!("{}.json", user_id))
    }

    /// Write the user's snapshot. Returns `false` when the file already held
    /// exactly this content and nothing was written.
    pub fn save_user(&self, user: &User) -> Result<bool> {
        let path = self.user_path(user.id());
        let json = serde_json::to_string_pretty(user)?;

        if let Ok(existing) = fs::read_to_string(&path) {
            if existing == json {
                tracing::debug!(user = user.id(), "snapshot unchanged, skipping write");
                return Ok(false);
            }
        }

        // Replace the old snapshot in one rename.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        tracing::info!(
            user = user.id(),
            items = user.items().len(),
            logs = user.review_logs().len(),
            "saved user snapshot"
        );
        Ok(true)
    }

    pub fn load_user(&self, user_id: u64) -> Result<Option<User>> {
        let path = self.user_path(user_id);
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)?;
        let user: User = serde_json::from_str(&json)?;
        Ok(Some(user))
    }

    /// List all stored users, sorted by name.
    pub fn list_users(&self) -> Result<Vec<UserInfo>> {
        let mut users = Vec::new();

        for entry in fs::read_dir(&self.users_dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == "json") {
                match fs::read_to_string(&path)
                    .map_err(StorageError::from)
                    .and_then(|json| Ok(serde_json::from_str::<User>(&json)?))
                {
                    Ok(user) => users.push(UserInfo {
                        id: user.id(),
                        name: user.name().to_string(),
                        item_count: user.items().len(),
                    }),
                    Err(e) => tracing::warn!("Skipping unreadable user file {:?}: {}", path, e),
                }
            }
        }

        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    /// An id sequence that continues after the highest stored user id.
    pub fn id_sequence(&self) -> Result<IdSequence> {
        let max = self.list_users()?.iter().map(|u| u.id).max().unwrap_or(0);
        Ok(IdSequence::starting_at(max + 1))
    }

    /// Load the user with this name, creating and saving a fresh one if none exists.
    pub fn open_or_create(&self, name: &str) -> Result<User> {
        let existing = self
            .list_users()?
            .into_iter()
            .find(|u| u.name.eq_ignore_ascii_case(name));

        if let Some(info) = existing {
            return self
                .load_user(info.id)?
                .ok_or(StorageError::UserNotFound(info.id));
        }

        let mut ids = self.id_sequence()?;
        let user = User::new(&mut ids, name.to_string(), String::new());
        self.save_user(&user)?;
        tracing::info!(user = user.id(), name, "created new user");
        Ok(user)
    }

    /// Import items from a CSV file with `question,answer[,tags]` rows.
    /// Quoted fields may contain commas. Tags are separated by `;`.
    /// Returns the number of items added.
    pub fn import_csv(&self, user: &mut User, csv_path: &Path, now: DateTime<Utc>) -> Result<usize> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(csv_path)?;
        let mut added = 0;

        for (i, record) in reader.records().enumerate() {
            let record = record?;

            // Skip header
            if i == 0 && record.get(0).map_or(false, |f| f.to_lowercase().contains("question")) {
                continue;
            }

            let (Some(question), Some(answer)) = (record.get(0), record.get(1)) else {
                continue;
            };
            if question.is_empty() || answer.is_empty() {
                continue;
            }

            let tags = record.get(2).map(|t| t.split(';').collect::<Vec<_>>()).unwrap_or_default();
            user.add_item(StudyItem::new(question.to_string(), answer.to_string(), tags, now));
            added += 1;
        }

        tracing::info!(user = user.id(), added, "imported items from {:?}", csv_path);
        Ok(added)
    }
}

impl UserStore for JsonUserStore {
    fn save(&self, user: &User) -> Result<()> {
        self.save_user(user).map(|_| ())
    }
}

/// Summary info for a stored user.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub id: u64,
    pub name: String,
    pub item_count: usize,
}

/// Backup format containing all users.
#[derive(Debug, Serialize, Deserialize)]
pub struct Backup {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub users: Vec<User>,
}

impl JsonUserStore {
    /// Export all users to a backup file.
    pub fn export_backup(&self, path: &Path) -> Result<usize> {
        let mut users = Vec::new();
        for info in self.list_users()? {
            if let Some(user) = self.load_user(info.id)? {
                users.push(user);
            }
        }

        let backup = Backup {
            version: 1,
            created_at: Utc::now(),
            users,
        };

        fs::write(path, serde_json::to_string_pretty(&backup)?)?;
        Ok(backup.users.len())
    }

    /// Import users from a backup file, skipping ids that already exist.
    /// Returns (imported_count, skipped_count).
    pub fn import_backup(&self, path: &Path) -> Result<(usize, usize)> {
        let backup: Backup = serde_json::from_str(&fs::read_to_string(path)?)?;

        let existing_ids: HashSet<u64> = self.list_users()?.into_iter().map(|u| u.id).collect();

        let mut imported = 0;
        let mut skipped = 0;

        for user in backup.users {
            if existing_ids.contains(&user.id()) {
                skipped += 1;
            } else {
                self.save_user(&user)?;
                imported += 1;
            }
        }

        Ok((imported, skipped))
    }

    /// Get default backup path.
    pub fn default_backup_path() -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(format!("emphizor_backup_{}.json", timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Rating, ReviewLog};
    use tempfile::TempDir;

    fn store() -> (TempDir, JsonUserStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonUserStore::new(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    fn sample_user(ids: &mut IdSequence) -> User {
        let now = Utc::now();
        let mut user = User::new(ids, "ana".into(), "ana@example.com".into());
        user.add_item(StudyItem::new("2+2".into(), "4".into(), ["math"], now));
        user.push_log(ReviewLog::new(Rating::Good, now));
        user
    }

    #[test]
    fn save_then_load_returns_same_user() {
        let (_dir, store) = store();
        let user = sample_user(&mut IdSequence::default());

        store.save(&user).unwrap();
        let loaded = store.load_user(user.id()).unwrap().unwrap();
        assert_eq!(loaded, user);
    }

    #[test]
    fn saving_unchanged_user_is_a_no_op() {
        let (_dir, store) = store();
        let mut user = sample_user(&mut IdSequence::default());

        assert!(store.save_user(&user).unwrap());
        assert!(!store.save_user(&user).unwrap());

        user.push_log(ReviewLog::new(Rating::Easy, Utc::now()));
        assert!(store.save_user(&user).unwrap());
    }

    #[test]
    fn load_missing_user_is_none() {
        let (_dir, store) = store();
        assert!(store.load_user(42).unwrap().is_none());
    }

    #[test]
    fn open_or_create_reuses_existing_user() {
        let (_dir, store) = store();
        let created = store.open_or_create("Ana").unwrap();
        let again = store.open_or_create("ana").unwrap();
        assert_eq!(created.id(), again.id());

        let other = store.open_or_create("ben").unwrap();
        assert_eq!(other.id(), created.id() + 1);
        assert_eq!(store.list_users().unwrap().len(), 2);
    }

    #[test]
    fn list_users_skips_corrupt_files() {
        let (dir, store) = store();
        store.save(&sample_user(&mut IdSequence::default())).unwrap();
        fs::write(dir.path().join("users").join("999.json"), "{ not json").unwrap();

        let users = store.list_users().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].item_count, 1);
    }

    #[test]
    fn import_csv_reads_tags() {
        let (dir, store) = store();
        let csv = dir.path().join("cards.csv");
        fs::write(
            &csv,
            "question,answer,tags\nCapital of France,Paris,geo;europe\n2+2,4\n,missing\n",
        )
        .unwrap();

        let mut user = User::new(&mut IdSequence::default(), "u".into(), String::new());
        let added = store.import_csv(&mut user, &csv, Utc::now()).unwrap();

        assert_eq!(added, 2);
        let tags: Vec<&str> = user.items()[0].tags().iter().map(|t| t.as_str()).collect();
        assert_eq!(tags, vec!["europe", "geo"]);
        assert!(user.items()[1].tags().is_empty());
    }

    #[test]
    fn import_csv_keeps_commas_in_quoted_fields() {
        let (dir, store) = store();
        let csv = dir.path().join("cards.csv");
        fs::write(
            &csv,
            "\"Largest city in Japan, by population\",\"Tokyo, Japan\",geo\nName three primes,\"2, 3, 5\"\n",
        )
        .unwrap();

        let mut user = User::new(&mut IdSequence::default(), "u".into(), String::new());
        let added = store.import_csv(&mut user, &csv, Utc::now()).unwrap();

        assert_eq!(added, 2);
        assert_eq!(user.items()[0].question(), "Largest city in Japan, by population");
        assert_eq!(user.items()[0].answer(), "Tokyo, Japan");
        assert!(user.items()[0].tags().contains("geo"));
        assert_eq!(user.items()[1].answer(), "2, 3, 5");
    }

    #[test]
    fn backup_round_trip_skips_existing() {
        let (dir, store) = store();
        let mut ids = IdSequence::default();
        store.save(&sample_user(&mut ids)).unwrap();

        let backup_path = dir.path().join("backup.json");
        assert_eq!(store.export_backup(&backup_path).unwrap(), 1);

        let (other_dir, other) = self::store();
        assert_eq!(other.import_backup(&backup_path).unwrap(), (1, 0));
        assert_eq!(other.import_backup(&backup_path).unwrap(), (0, 1));
        drop(other_dir);
    }
}
