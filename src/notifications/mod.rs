//! Reconciles server-side notification records with the user's watched dates
//! and centres.
//!
//! Notifications carry the long date form (`Monday 3 March 2025`) while the
//! profile keys availability on the short form (`03/03/25`); matching happens
//! on the parsed date, and centre names compare case- and
//! whitespace-insensitively. A centre-wide "no available dates" notice
//! applies to every watched date at that centre and beats per-date entries.

use crate::api::{ApiClient, ApiError, NotificationRecord};
use crate::domain::{SelectedCentre, SlotDate};
use crate::store::{ProfileStore, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const CENTRE_WIDE_PREFIX: &str = "No available dates in the center";

/// The notification text chosen for one watched date, if any matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateNotice {
    pub date: SlotDate,
    pub text: Option<String>,
}

/// Match notifications against the watched dates and centres.
pub fn reconcile(
    records: &[NotificationRecord],
    dates: &[SlotDate],
    centres: &[SelectedCentre],
) -> Vec<DateNotice> {
    let mut centre_wide: HashMap<String, &str> = HashMap::new();
    let mut per_date: HashMap<(SlotDate, String), &str> = HashMap::new();

    for record in records {
        let Some(centre) = &record.selected_centre else {
            continue;
        };
        let centre_key = centre.key();

        if record.text.starts_with(CENTRE_WIDE_PREFIX) {
            centre_wide.insert(centre_key, record.text.as_str());
            continue;
        }

        let Some(date) = record
            .selected_date
            .as_deref()
            .and_then(|raw| SlotDate::parse_flexible(raw).ok())
        else {
            debug!(id = %record.id, "notification without a parseable date; skipped");
            continue;
        };
        // First record wins for a given date/centre pair; the server appends
        // newer entries after older ones.
        per_date
            .entry((date, centre_key))
            .or_insert(record.text.as_str());
    }

    dates
        .iter()
        .map(|date| {
            let text = centres.iter().find_map(|centre| {
                let key = centre.key();
                centre_wide
                    .get(&key)
                    .or_else(|| per_date.get(&(*date, key)))
                    .map(|text| text.to_string())
            });
            DateNotice { date: *date, text }
        })
        .collect()
}

/// Unread records (either delivery flag unset), oldest first.
pub fn unread(records: &[NotificationRecord]) -> Vec<&NotificationRecord> {
    let mut unread: Vec<&NotificationRecord> = records
        .iter()
        .filter(|record| !record.read || !record.read_app)
        .collect();
    unread.sort_by(|a, b| a.date.cmp(&b.date));
    unread
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no profile stored; log in first")]
    MissingProfile,
    #[error("stored profile has no user id; log in first")]
    MissingUserId,
}

/// Fetch/acknowledge notifications for the stored user.
pub struct NotificationFeed<S> {
    api: Arc<ApiClient>,
    store: Arc<S>,
}

impl<S: ProfileStore> NotificationFeed<S> {
    pub fn new(api: Arc<ApiClient>, store: Arc<S>) -> Self {
        Self { api, store }
    }

    fn user_id(&self) -> Result<String, NotificationError> {
        let profile = self.store.load()?.ok_or(NotificationError::MissingProfile)?;
        profile.user_id.ok_or(NotificationError::MissingUserId)
    }

    pub async fn fetch_all(&self) -> Result<Vec<NotificationRecord>, NotificationError> {
        Ok(self.api.notifications(&self.user_id()?).await?)
    }

    pub async fn fetch_new(&self) -> Result<Vec<NotificationRecord>, NotificationError> {
        Ok(self.api.new_notifications(&self.user_id()?).await?)
    }

    /// Notices matched to the stored availability dates and centres.
    pub async fn fetch_matched(&self) -> Result<Vec<DateNotice>, NotificationError> {
        let profile = self.store.load()?.ok_or(NotificationError::MissingProfile)?;
        let user_id = profile
            .user_id
            .as_deref()
            .ok_or(NotificationError::MissingUserId)?;
        let records = self.api.notifications(user_id).await?;
        let dates: Vec<SlotDate> = profile.availability.keys().copied().collect();
        Ok(reconcile(&records, &dates, &profile.selected_centres))
    }

    pub async fn mark_read(&self, notification_ids: &[String]) -> Result<(), NotificationError> {
        if notification_ids.is_empty() {
            return Ok(());
        }
        Ok(self
            .api
            .mark_notifications_read(&self.user_id()?, notification_ids)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centre(name: &str, postal_code: &str) -> SelectedCentre {
        SelectedCentre {
            name: name.to_string(),
            postal_code: postal_code.to_string(),
        }
    }

    fn record(
        id: &str,
        text: &str,
        centre_name: Option<&str>,
        selected_date: Option<&str>,
    ) -> NotificationRecord {
        let body = serde_json::json!({
            "_id": id,
            "text": text,
            "read": false,
            "readApp": false,
            "selectedCentre": centre_name.map(|name| serde_json::json!({
                "name": name,
                "postalCode": "N22 5EY",
            })),
            "selectedDate": selected_date,
        });
        serde_json::from_value(body).expect("valid notification record")
    }

    fn slot(raw: &str) -> SlotDate {
        SlotDate::parse_short(raw).expect("valid date")
    }

    #[test]
    fn per_date_notifications_match_on_normalized_dates() {
        let records = vec![record(
            "n1",
            "A slot opened on your date",
            Some("Wood Green"),
            Some("Monday 3 March 2025"),
        )];
        let notices = reconcile(
            &records,
            &[slot("03/03/25"), slot("04/03/25")],
            &[centre("Wood Green", "N22 5EY")],
        );

        assert_eq!(notices[0].text.as_deref(), Some("A slot opened on your date"));
        assert_eq!(notices[1].text, None);
    }

    #[test]
    fn centre_matching_ignores_case_and_whitespace() {
        let records = vec![record(
            "n1",
            "A slot opened on your date",
            Some("  WOOD green "),
            Some("Monday 3 March 2025"),
        )];
        let notices = reconcile(
            &records,
            &[slot("03/03/25")],
            &[centre("wood GREEN", "N22 5EY")],
        );
        assert!(notices[0].text.is_some());
    }

    #[test]
    fn centre_wide_notice_wins_over_per_date_entries() {
        let records = vec![
            record(
                "n1",
                "A slot opened on your date",
                Some("Wood Green"),
                Some("Monday 3 March 2025"),
            ),
            record(
                "n2",
                "No available dates in the center Wood Green",
                Some("Wood Green"),
                Some("Tuesday 4 March 2025"),
            ),
        ];
        let notices = reconcile(
            &records,
            &[slot("03/03/25")],
            &[centre("Wood Green", "N22 5EY")],
        );
        assert_eq!(
            notices[0].text.as_deref(),
            Some("No available dates in the center Wood Green")
        );
    }

    #[test]
    fn first_record_wins_per_date_and_centre() {
        let records = vec![
            record("n1", "first", Some("Wood Green"), Some("Monday 3 March 2025")),
            record("n2", "second", Some("Wood Green"), Some("Monday 3 March 2025")),
        ];
        let notices = reconcile(
            &records,
            &[slot("03/03/25")],
            &[centre("Wood Green", "N22 5EY")],
        );
        assert_eq!(notices[0].text.as_deref(), Some("first"));
    }

    #[test]
    fn records_without_centre_or_date_are_skipped() {
        let records = vec![
            record("n1", "orphan", None, Some("Monday 3 March 2025")),
            record("n2", "undated", Some("Wood Green"), None),
            record("n3", "garbled", Some("Wood Green"), Some("sometime soon")),
        ];
        let notices = reconcile(
            &records,
            &[slot("03/03/25")],
            &[centre("Wood Green", "N22 5EY")],
        );
        assert_eq!(notices[0].text, None);
    }

    #[test]
    fn unread_filters_on_either_flag_and_sorts_oldest_first() {
        let mut newer = record("n1", "newer", None, None);
        newer.read = false;
        newer.read_app = true;
        newer.date = Some("2025-03-04T09:00:00Z".to_string());

        let mut older = record("n2", "older", None, None);
        older.read = true;
        older.read_app = false;
        older.date = Some("2025-03-01T09:00:00Z".to_string());

        let mut seen = record("n3", "seen", None, None);
        seen.read = true;
        seen.read_app = true;

        let records = vec![newer, older, seen];
        let unread = unread(&records);
        assert_eq!(unread.len(), 2);
        assert_eq!(unread[0].text, "older");
        assert_eq!(unread[1].text, "newer");
    }
}
