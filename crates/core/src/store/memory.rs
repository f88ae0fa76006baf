use super::{
    apply_update, check_user_unique, find_active, sort_notifications, sort_requests,
    sort_results, sort_users, CasOutcome, InsertOutcome, RecordStore, RequestFilter,
    RequestUpdate,
};
use crate::ids::{NotificationId, ReportId, RequestId, ResultId, UserId};
use crate::model::{
    DocumentRef, Notification, PredictionResult, Report, ReviewRequest, Role, UserAccount,
};
use crate::status::ReviewStatus;
use crate::{CoreError, CoreResult};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, UserAccount>,
    results: HashMap<ResultId, PredictionResult>,
    reports: HashMap<ReportId, Report>,
    requests: HashMap<RequestId, ReviewRequest>,
    notifications: HashMap<NotificationId, Notification>,
    next_sequence: u64,
}

/// Process-local store. Every operation holds one lock, so each call is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CoreResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| CoreError::LockPoisoned)
    }
}

impl RecordStore for MemoryStore {
    fn insert_user(&self, user: &UserAccount) -> CoreResult<()> {
        let mut tables = self.lock()?;
        check_user_unique(tables.users.values(), user)?;
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    fn get_user(&self, id: UserId) -> CoreResult<Option<UserAccount>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    fn find_user_by_username(&self, username: &str) -> CoreResult<Option<UserAccount>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.username.as_str().eq_ignore_ascii_case(username.trim()))
            .cloned())
    }

    fn list_users(&self, role: Option<Role>) -> CoreResult<Vec<UserAccount>> {
        let mut users: Vec<_> = self
            .lock()?
            .users
            .values()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .cloned()
            .collect();
        sort_users(&mut users);
        Ok(users)
    }

    fn put_result(&self, result: &PredictionResult) -> CoreResult<()> {
        self.lock()?.results.insert(result.id, result.clone());
        Ok(())
    }

    fn get_result(&self, id: ResultId) -> CoreResult<Option<PredictionResult>> {
        Ok(self.lock()?.results.get(&id).cloned())
    }

    fn list_results_for_owner(&self, owner_id: UserId) -> CoreResult<Vec<PredictionResult>> {
        let mut results: Vec<_> = self
            .lock()?
            .results
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        sort_results(&mut results);
        Ok(results)
    }

    fn get_report(&self, id: ReportId) -> CoreResult<Option<Report>> {
        Ok(self.lock()?.reports.get(&id).cloned())
    }

    fn find_report_for_result(&self, result_id: ResultId) -> CoreResult<Option<Report>> {
        Ok(self
            .lock()?
            .reports
            .values()
            .find(|r| r.result_id == result_id)
            .cloned())
    }

    fn insert_report_if_absent(&self, report: Report) -> CoreResult<Report> {
        let mut tables = self.lock()?;
        if let Some(existing) = tables
            .reports
            .values()
            .find(|r| r.result_id == report.result_id)
        {
            return Ok(existing.clone());
        }
        tables.reports.insert(report.id, report.clone());
        Ok(report)
    }

    fn attach_report_document(&self, id: ReportId, document: DocumentRef) -> CoreResult<Report> {
        let mut tables = self.lock()?;
        let report = tables
            .reports
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("report", id))?;
        report.document = Some(document);
        Ok(report.clone())
    }

    fn insert_request_unless_active(&self, request: ReviewRequest) -> CoreResult<InsertOutcome> {
        let mut tables = self.lock()?;
        if let Some(existing) = find_active(tables.requests.values(), &request) {
            return Ok(InsertOutcome::Existing(existing));
        }
        tables.requests.insert(request.id, request.clone());
        Ok(InsertOutcome::Inserted(request))
    }

    fn get_request(&self, id: RequestId) -> CoreResult<Option<ReviewRequest>> {
        Ok(self.lock()?.requests.get(&id).cloned())
    }

    fn list_requests(&self, filter: &RequestFilter) -> CoreResult<Vec<ReviewRequest>> {
        let mut requests: Vec<_> = self
            .lock()?
            .requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
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
        let mut tables = self.lock()?;
        let Some(request) = tables.requests.get_mut(&id) else {
            return Ok(CasOutcome::Missing);
        };
        if request.status != expected {
            return Ok(CasOutcome::StatusMismatch(request.status));
        }
        apply_update(request, update);
        Ok(CasOutcome::Updated(request.clone()))
    }

    fn append_notification(&self, mut notification: Notification) -> CoreResult<Notification> {
        let mut tables = self.lock()?;
        tables.next_sequence += 1;
        notification.sequence = tables.next_sequence;
        tables
            .notifications
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    fn get_notification(&self, id: NotificationId) -> CoreResult<Option<Notification>> {
        Ok(self.lock()?.notifications.get(&id).cloned())
    }

    fn list_notifications(&self, recipient_id: UserId) -> CoreResult<Vec<Notification>> {
        let mut notifications: Vec<_> = self
            .lock()?
            .notifications
            .values()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect();
        sort_notifications(&mut notifications);
        Ok(notifications)
    }

    fn mark_notification_read(&self, id: NotificationId) -> CoreResult<bool> {
        let mut tables = self.lock()?;
        match tables.notifications.get_mut(&id) {
            Some(notification) => {
                notification.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn mark_all_notifications_read(&self, recipient_id: UserId) -> CoreResult<usize> {
        let mut tables = self.lock()?;
        let mut flipped = 0;
        for notification in tables
            .notifications
            .values_mut()
            .filter(|n| n.recipient_id == recipient_id && !n.is_read)
        {
            notification.is_read = true;
            flipped += 1;
        }
        Ok(flipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    #[test]
    fn test_memory_store_contract() {
        contract::run_all(&MemoryStore::new());
    }
}
