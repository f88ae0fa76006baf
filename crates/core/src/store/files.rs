//! Sharded YAML record store.
//!
//! Each record is one YAML file named after its identifier:
//!
//! ```text
//! <data_dir>/
//! ├── users/<s1>/<s2>/<id>.yaml
//! ├── results/<s1>/<s2>/<id>.yaml
//! ├── reports/<s1>/<s2>/<id>.yaml
//! ├── review_requests/<s1>/<s2>/<id>.yaml
//! └── notifications/<s1>/<s2>/<id>.yaml
//! ```
//!
//! Mutations are serialised behind a single lock, so check-then-write operations such as
//! [`RecordStore::insert_request_unless_active`] are atomic within the process. Files are
//! written to a temporary name and renamed into place, so a reader never observes a partial
//! record.

use super::{
    apply_update, check_user_unique, find_active, sort_notifications, sort_requests,
    sort_results, sort_users, CasOutcome, InsertOutcome, RecordStore, RequestFilter,
    RequestUpdate,
};
use crate::constants::{
    NOTIFICATIONS_DIR_NAME, RECORD_FILE_EXTENSION, REPORTS_DIR_NAME, RESULTS_DIR_NAME,
    REVIEW_REQUESTS_DIR_NAME, USERS_DIR_NAME,
};
use crate::ids::{NotificationId, ReportId, RequestId, ResultId, UserId};
use crate::model::{
    DocumentRef, Notification, PredictionResult, Report, ReviewRequest, Role, UserAccount,
};
use crate::status::ReviewStatus;
use crate::{CoreError, CoreResult};
use riskcare_uuid::ShardableUuid;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// A record type with its own top-level directory.
trait StoredRecord: Serialize + DeserializeOwned {
    const DIR_NAME: &'static str;

    fn record_id(&self) -> &ShardableUuid;
}

impl StoredRecord for UserAccount {
    const DIR_NAME: &'static str = USERS_DIR_NAME;

    fn record_id(&self) -> &ShardableUuid {
        self.id.shardable()
    }
}

impl StoredRecord for PredictionResult {
    const DIR_NAME: &'static str = RESULTS_DIR_NAME;

    fn record_id(&self) -> &ShardableUuid {
        self.id.shardable()
    }
}

impl StoredRecord for Report {
    const DIR_NAME: &'static str = REPORTS_DIR_NAME;

    fn record_id(&self) -> &ShardableUuid {
        self.id.shardable()
    }
}

impl StoredRecord for ReviewRequest {
    const DIR_NAME: &'static str = REVIEW_REQUESTS_DIR_NAME;

    fn record_id(&self) -> &ShardableUuid {
        self.id.shardable()
    }
}

impl StoredRecord for Notification {
    const DIR_NAME: &'static str = NOTIFICATIONS_DIR_NAME;

    fn record_id(&self) -> &ShardableUuid {
        self.id.shardable()
    }
}

/// State guarded by the write lock.
struct WriteState {
    last_sequence: u64,
}

pub struct FileStore {
    data_dir: PathBuf,
    writes: Mutex<WriteState>,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `data_dir`.
    ///
    /// The notification sequence resumes from the highest value already on disk.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StorageDirCreation`] if the directory cannot be created.
    pub fn open(data_dir: &Path) -> CoreResult<Self> {
        fs::create_dir_all(data_dir).map_err(CoreError::StorageDirCreation)?;

        let store = Self {
            data_dir: data_dir.to_path_buf(),
            writes: Mutex::new(WriteState { last_sequence: 0 }),
        };
        let last_sequence = store
            .scan::<Notification>()?
            .iter()
            .map(|n| n.sequence)
            .max()
            .unwrap_or(0);
        store.lock_writes()?.last_sequence = last_sequence;

        Ok(store)
    }

    fn lock_writes(&self) -> CoreResult<MutexGuard<'_, WriteState>> {
        self.writes.lock().map_err(|_| CoreError::LockPoisoned)
    }

    fn record_path<R: StoredRecord>(&self, id: &ShardableUuid) -> PathBuf {
        id.sharded_file(&self.data_dir.join(R::DIR_NAME), RECORD_FILE_EXTENSION)
    }

    fn write<R: StoredRecord>(&self, record: &R) -> CoreResult<()> {
        let path = self.record_path::<R>(record.record_id());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(CoreError::StorageDirCreation)?;
        }

        let yaml = serde_yaml::to_string(record).map_err(CoreError::YamlSerialization)?;
        let tmp_path = path.with_extension("yaml.tmp");
        fs::write(&tmp_path, yaml).map_err(CoreError::FileWrite)?;
        fs::rename(&tmp_path, &path).map_err(CoreError::FileWrite)?;
        Ok(())
    }

    fn load<R: StoredRecord>(&self, id: &ShardableUuid) -> CoreResult<Option<R>> {
        let path = self.record_path::<R>(id);
        if !path.is_file() {
            return Ok(None);
        }
        read_record(&path).map(Some)
    }

    /// Reads every record of type `R`. Unreadable files are logged and skipped.
    fn scan<R: StoredRecord>(&self) -> CoreResult<Vec<R>> {
        let base = self.data_dir.join(R::DIR_NAME);
        let mut records = Vec::new();
        if !base.is_dir() {
            return Ok(records);
        }

        for s1 in fs::read_dir(&base).map_err(CoreError::FileRead)? {
            let s1_path = s1.map_err(CoreError::FileRead)?.path();
            if !s1_path.is_dir() {
                continue;
            }
            for s2 in fs::read_dir(&s1_path).map_err(CoreError::FileRead)? {
                let s2_path = s2.map_err(CoreError::FileRead)?.path();
                if !s2_path.is_dir() {
                    continue;
                }
                for entry in fs::read_dir(&s2_path).map_err(CoreError::FileRead)? {
                    let path = entry.map_err(CoreError::FileRead)?.path();
                    if path.extension().and_then(|e| e.to_str()) != Some(RECORD_FILE_EXTENSION) {
                        continue;
                    }
                    match read_record::<R>(&path) {
                        Ok(record) => records.push(record),
                        Err(e) => {
                            tracing::warn!("skipping unreadable record {}: {}", path.display(), e);
                        }
                    }
                }
            }
        }

        Ok(records)
    }
}

fn read_record<R: DeserializeOwned>(path: &Path) -> CoreResult<R> {
    let text = fs::read_to_string(path).map_err(CoreError::FileRead)?;
    let deserializer = serde_yaml::Deserializer::from_str(&text);
    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let field = err.path().to_string();
        let field = if field.is_empty() {
            "<root>".to_string()
        } else {
            field
        };
        CoreError::YamlDeserialization {
            path: format!("{} ({})", field, path.display()),
            message: err.into_inner().to_string(),
        }
    })
}

impl RecordStore for FileStore {
    fn insert_user(&self, user: &UserAccount) -> CoreResult<()> {
        let _guard = self.lock_writes()?;
        let existing = self.scan::<UserAccount>()?;
        check_user_unique(&existing, user)?;
        self.write(user)
    }

    fn get_user(&self, id: UserId) -> CoreResult<Option<UserAccount>> {
        self.load(id.shardable())
    }

    fn find_user_by_username(&self, username: &str) -> CoreResult<Option<UserAccount>> {
        Ok(self
            .scan::<UserAccount>()?
            .into_iter()
            .find(|u| u.username.as_str().eq_ignore_ascii_case(username.trim())))
    }

    fn list_users(&self, role: Option<Role>) -> CoreResult<Vec<UserAccount>> {
        let mut users: Vec<_> = self
            .scan::<UserAccount>()?
            .into_iter()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .collect();
        sort_users(&mut users);
        Ok(users)
    }

    fn put_result(&self, result: &PredictionResult) -> CoreResult<()> {
        let _guard = self.lock_writes()?;
        self.write(result)
    }

    fn get_result(&self, id: ResultId) -> CoreResult<Option<PredictionResult>> {
        self.load(id.shardable())
    }

    fn list_results_for_owner(&self, owner_id: UserId) -> CoreResult<Vec<PredictionResult>> {
        let mut results: Vec<_> = self
            .scan::<PredictionResult>()?
            .into_iter()
            .filter(|r| r.owner_id == owner_id)
            .collect();
        sort_results(&mut results);
        Ok(results)
    }

    fn get_report(&self, id: ReportId) -> CoreResult<Option<Report>> {
        self.load(id.shardable())
    }

    fn find_report_for_result(&self, result_id: ResultId) -> CoreResult<Option<Report>> {
        Ok(self
            .scan::<Report>()?
            .into_iter()
            .find(|r| r.result_id == result_id))
    }

    fn insert_report_if_absent(&self, report: Report) -> CoreResult<Report> {
        let _guard = self.lock_writes()?;
        if let Some(existing) = self.find_report_for_result(report.result_id)? {
            return Ok(existing);
        }
        self.write(&report)?;
        Ok(report)
    }

    fn attach_report_document(&self, id: ReportId, document: DocumentRef) -> CoreResult<Report> {
        let _guard = self.lock_writes()?;
        let mut report = self
            .get_report(id)?
            .ok_or_else(|| CoreError::not_found("report", id))?;
        report.document = Some(document);
        self.write(&report)?;
        Ok(report)
    }

    fn insert_request_unless_active(&self, request: ReviewRequest) -> CoreResult<InsertOutcome> {
        let _guard = self.lock_writes()?;
        let existing = self.scan::<ReviewRequest>()?;
        if let Some(active) = find_active(&existing, &request) {
            return Ok(InsertOutcome::Existing(active));
        }
        self.write(&request)?;
        Ok(InsertOutcome::Inserted(request))
    }

    fn get_request(&self, id: RequestId) -> CoreResult<Option<ReviewRequest>> {
        self.load(id.shardable())
    }

    fn list_requests(&self, filter: &RequestFilter) -> CoreResult<Vec<ReviewRequest>> {
        let mut requests: Vec<_> = self
            .scan::<ReviewRequest>()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        sort_requests(&mut requests);
        Ok(requests)
    }

    fn compare_and_set_request(
        &self,
        id: RequestId,
        expected: ReviewStatus,
        update: RequestUpdate,
    ) -> CoreResult<CasOutcome> {
        let _guard = self.lock_writes()?;
        let Some(mut request) = self.get_request(id)? else {
            return Ok(CasOutcome::Missing);
        };
        if request.status != expected {
            return Ok(CasOutcome::StatusMismatch(request.status));
        }
        apply_update(&mut request, update);
        self.write(&request)?;
        Ok(CasOutcome::Updated(request))
    }

    fn append_notification(&self, mut notification: Notification) -> CoreResult<Notification> {
        let mut state = self.lock_writes()?;
        notification.sequence = state.last_sequence + 1;
        self.write(&notification)?;
        state.last_sequence = notification.sequence;
        Ok(notification)
    }

    fn get_notification(&self, id: NotificationId) -> CoreResult<Option<Notification>> {
        self.load(id.shardable())
    }

    fn list_notifications(&self, recipient_id: UserId) -> CoreResult<Vec<Notification>> {
        let mut notifications: Vec<_> = self
            .scan::<Notification>()?
            .into_iter()
            .filter(|n| n.recipient_id == recipient_id)
            .collect();
        sort_notifications(&mut notifications);
        Ok(notifications)
    }

    fn mark_notification_read(&self, id: NotificationId) -> CoreResult<bool> {
        let _guard = self.lock_writes()?;
        let Some(mut notification) = self.get_notification(id)? else {
            return Ok(false);
        };
        if !notification.is_read {
            notification.is_read = true;
            self.write(&notification)?;
        }
        Ok(true)
    }

    fn mark_all_notifications_read(&self, recipient_id: UserId) -> CoreResult<usize> {
        let _guard = self.lock_writes()?;
        let mut flipped = 0;
        for mut notification in self.list_notifications(recipient_id)? {
            if notification.is_read {
                continue;
            }
            notification.is_read = true;
            self.write(&notification)?;
            flipped += 1;
        }
        Ok(flipped)
    }
}
