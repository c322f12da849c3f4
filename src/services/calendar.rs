//! Calendar aggregation:
//!
//! - Fans out one task per calendar source (the viewer's own bookings plus
//!   every accepted share) with an independent timeout per task.
//! - Merges the per-source occurrence lists in fixed source order and
//!   stable-sorts them by start, so fetch completion order never shows.
//! - Keeps the latest merged result per viewer; visibility toggles and date
//!   views are computed from that snapshot at read time without re-fetching.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use futures::future::{join_all, BoxFuture};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::CalendarConfig;
use crate::db::models::RawBookingRow;
use crate::db::{BookingRepository, CalendarShareRepository, UserRepository};
use crate::error::{AppError, AppResult};
use crate::services::occurrences::{EventOccurrence, OccurrenceProjector, SELF_SOURCE};

const SELF_LABEL: &str = "My calendar";

// ============================================================================
// Booking feed
// ============================================================================

/// Where booking rows for each calendar source come from.
#[async_trait]
pub trait BookingFeed: Send + Sync + 'static {
    /// Pending and confirmed bookings of the viewer.
    async fn fetch_own_bookings(&self, user_id: &str) -> AppResult<Vec<RawBookingRow>>;

    /// Owners whose accepted share lets the viewer read their calendar.
    async fn fetch_shared_source_ids(&self, viewer_id: &str) -> AppResult<Vec<String>>;

    async fn fetch_bookings_for(&self, source_id: &str) -> AppResult<Vec<RawBookingRow>>;

    async fn resolve_display_name(&self, source_id: &str) -> AppResult<String>;
}

#[derive(Clone)]
pub struct SqliteBookingFeed {
    pool: SqlitePool,
}

impl SqliteBookingFeed {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteBookingFeed { pool }
    }
}

#[async_trait]
impl BookingFeed for SqliteBookingFeed {
    async fn fetch_own_bookings(&self, user_id: &str) -> AppResult<Vec<RawBookingRow>> {
        BookingRepository::fetch_active_for_user(&self.pool, user_id).await
    }

    async fn fetch_shared_source_ids(&self, viewer_id: &str) -> AppResult<Vec<String>> {
        CalendarShareRepository::list_accepted_owner_ids(&self.pool, viewer_id).await
    }

    async fn fetch_bookings_for(&self, source_id: &str) -> AppResult<Vec<RawBookingRow>> {
        BookingRepository::fetch_active_for_user(&self.pool, source_id).await
    }

    async fn resolve_display_name(&self, source_id: &str) -> AppResult<String> {
        UserRepository::display_name(&self.pool, source_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", source_id)))
    }
}

// ============================================================================
// Aggregation
// ============================================================================

pub type RowsFuture = BoxFuture<'static, AppResult<Vec<RawBookingRow>>>;

/// One calendar contributor and the pending fetch of its rows.
pub struct SourceFetch {
    pub source_id: String,
    pub label: String,
    pub fetch: RowsFuture,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SourceStatus {
    Loaded { count: usize },
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub id: String,
    pub label: String,
    #[serde(flatten)]
    pub status: SourceStatus,
}

/// Merged, start-ordered occurrences of one refresh. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub occurrences: Vec<EventOccurrence>,
    pub sources: Vec<SourceSummary>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CalendarAggregator {
    projector: Arc<OccurrenceProjector>,
    source_timeout: Duration,
}

impl CalendarAggregator {
    pub fn new(projector: Arc<OccurrenceProjector>, source_timeout: Duration) -> Self {
        CalendarAggregator {
            projector,
            source_timeout,
        }
    }

    /// Fetch and project every source concurrently, then merge in source order.
    /// A source that fails, panics or times out contributes nothing and is
    /// reported as unavailable.
    pub async fn aggregate(&self, sources: Vec<SourceFetch>, now: DateTime<Utc>) -> AggregateResult {
        let today = self.projector.resolver().today(now);
        let mut labels = Vec::with_capacity(sources.len());
        let mut handles = Vec::with_capacity(sources.len());

        for source in sources {
            labels.push((source.source_id.clone(), source.label));

            let projector = self.projector.clone();
            let limit = self.source_timeout;
            let source_id = source.source_id;
            let fetch = source.fetch;
            handles.push(tokio::spawn(async move {
                match tokio::time::timeout(limit, fetch).await {
                    Ok(Ok(rows)) => Ok(projector.project(&rows, &source_id, today)),
                    Ok(Err(e)) => Err(format!("fetch failed: {}", e)),
                    Err(_) => Err(format!("timed out after {} ms", limit.as_millis())),
                }
            }));
        }

        let outcomes = join_all(handles).await;

        let mut occurrences = Vec::new();
        let mut summaries = Vec::with_capacity(labels.len());
        for ((source_id, label), outcome) in labels.into_iter().zip(outcomes) {
            let status = match outcome {
                Ok(Ok(mut projected)) => {
                    let count = projected.len();
                    occurrences.append(&mut projected);
                    SourceStatus::Loaded { count }
                }
                Ok(Err(reason)) => {
                    warn!("Calendar source {} unavailable: {}", source_id, reason);
                    SourceStatus::Unavailable { reason }
                }
                Err(e) => {
                    warn!("Calendar source {} task failed: {:?}", source_id, e);
                    SourceStatus::Unavailable {
                        reason: "fetch task aborted".to_string(),
                    }
                }
            };
            summaries.push(SourceSummary {
                id: source_id,
                label,
                status,
            });
        }

        // Stable: equal starts keep source order, then row order.
        occurrences.sort_by_key(|o| o.start);

        AggregateResult {
            occurrences,
            sources: summaries,
            generated_at: now,
        }
    }
}

// ============================================================================
// Read-time views
// ============================================================================

pub fn visible<'a>(
    result: &'a AggregateResult,
    hidden: &'a HashSet<String>,
) -> impl Iterator<Item = &'a EventOccurrence> + 'a {
    result
        .occurrences
        .iter()
        .filter(move |o| !hidden.contains(&o.source_id))
}

/// Group occurrences by the local calendar date of their start.
pub fn bucket_by_date<'a>(
    occurrences: impl Iterator<Item = &'a EventOccurrence>,
    zone: Tz,
) -> BTreeMap<NaiveDate, Vec<EventOccurrence>> {
    let mut days: BTreeMap<NaiveDate, Vec<EventOccurrence>> = BTreeMap::new();
    for occurrence in occurrences {
        let date = occurrence.start.with_timezone(&zone).date_naive();
        days.entry(date).or_default().push(occurrence.clone());
    }
    days
}

/// Visible occurrences that have not ended yet, bucketed by day.
pub fn upcoming(
    result: &AggregateResult,
    hidden: &HashSet<String>,
    zone: Tz,
    now: DateTime<Utc>,
) -> BTreeMap<NaiveDate, Vec<EventOccurrence>> {
    bucket_by_date(visible(result, hidden).filter(|o| o.end.with_timezone(&Utc) >= now), zone)
}

/// Visible occurrences whose local start date lies in the month beginning at `month_start`.
pub fn in_month(
    result: &AggregateResult,
    hidden: &HashSet<String>,
    zone: Tz,
    month_start: NaiveDate,
) -> AppResult<BTreeMap<NaiveDate, Vec<EventOccurrence>>> {
    if month_start.day() != 1 {
        return Err(AppError::BadRequest(format!(
            "Month start {} is not the first day of a month",
            month_start
        )));
    }
    let month_end = month_start
        .checked_add_months(Months::new(1))
        .ok_or_else(|| AppError::BadRequest(format!("Month {} is out of range", month_start)))?;

    let mut days = bucket_by_date(visible(result, hidden), zone);
    days.retain(|date, _| *date >= month_start && *date < month_end);
    Ok(days)
}

// ============================================================================
// Per-viewer calendars
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceView {
    pub id: String,
    pub label: String,
    pub visible: bool,
    #[serde(flatten)]
    pub status: SourceStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarView {
    pub days: BTreeMap<NaiveDate, Vec<EventOccurrence>>,
    pub sources: Vec<SourceView>,
    pub generated_at: DateTime<Utc>,
}

struct Snapshot {
    result: Arc<AggregateResult>,
    taken_at: Instant,
}

/// Latest merged calendar and source visibility for every viewer.
pub struct CalendarService {
    feed: Arc<dyn BookingFeed>,
    aggregator: CalendarAggregator,
    zone: Tz,
    snapshot_ttl: Duration,
    snapshots: RwLock<HashMap<String, Snapshot>>,
    hidden: RwLock<HashMap<String, HashSet<String>>>,
}

impl CalendarService {
    pub fn new(
        feed: Arc<dyn BookingFeed>,
        projector: Arc<OccurrenceProjector>,
        config: &CalendarConfig,
    ) -> Self {
        let zone = projector.resolver().zone();
        CalendarService {
            feed,
            aggregator: CalendarAggregator::new(
                projector,
                Duration::from_millis(config.source_timeout_ms),
            ),
            zone,
            snapshot_ttl: Duration::from_secs(config.snapshot_ttl_seconds),
            snapshots: RwLock::new(HashMap::new()),
            hidden: RwLock::new(HashMap::new()),
        }
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// Re-fetch every source for the viewer and replace their snapshot.
    pub async fn refresh(&self, viewer_id: &str) -> AppResult<Arc<AggregateResult>> {
        let limit = self.aggregator.source_timeout;
        let shared_ids =
            match tokio::time::timeout(limit, self.feed.fetch_shared_source_ids(viewer_id)).await {
                Ok(Ok(ids)) => ids,
                Ok(Err(e)) => {
                    warn!(
                        "Failed to list shared calendars for viewer {}: {:?}",
                        viewer_id, e
                    );
                    Vec::new()
                }
                Err(_) => {
                    warn!(
                        "Listing shared calendars for viewer {} timed out after {} ms",
                        viewer_id,
                        limit.as_millis()
                    );
                    Vec::new()
                }
            };

        let labels = join_all(shared_ids.iter().map(|id| self.label_for(id))).await;

        let mut sources = Vec::with_capacity(shared_ids.len() + 1);
        {
            let feed = self.feed.clone();
            let viewer = viewer_id.to_string();
            sources.push(SourceFetch {
                source_id: SELF_SOURCE.to_string(),
                label: SELF_LABEL.to_string(),
                fetch: Box::pin(async move { feed.fetch_own_bookings(&viewer).await }),
            });
        }
        for (source_id, label) in shared_ids.into_iter().zip(labels) {
            let feed = self.feed.clone();
            let id = source_id.clone();
            sources.push(SourceFetch {
                source_id,
                label,
                fetch: Box::pin(async move { feed.fetch_bookings_for(&id).await }),
            });
        }

        let result = Arc::new(self.aggregator.aggregate(sources, Utc::now()).await);
        info!(
            "Refreshed calendar for viewer {}: {} occurrences from {} sources",
            viewer_id,
            result.occurrences.len(),
            result.sources.len()
        );

        self.snapshots.write().await.insert(
            viewer_id.to_string(),
            Snapshot {
                result: result.clone(),
                taken_at: Instant::now(),
            },
        );

        Ok(result)
    }

    /// Display name for a shared source, or its id when the lookup fails or
    /// takes longer than one source fetch may.
    async fn label_for(&self, source_id: &str) -> String {
        let limit = self.aggregator.source_timeout;
        match tokio::time::timeout(limit, self.feed.resolve_display_name(source_id)).await {
            Ok(Ok(name)) => name,
            Ok(Err(e)) => {
                debug!("No display name for source {}: {:?}", source_id, e);
                source_id.to_string()
            }
            Err(_) => {
                warn!("Display name lookup for source {} timed out", source_id);
                source_id.to_string()
            }
        }
    }

    /// The viewer's current snapshot, fetching when there is none, it has
    /// expired, or `force` is set.
    pub async fn snapshot(&self, viewer_id: &str, force: bool) -> AppResult<Arc<AggregateResult>> {
        if !force {
            let snapshots = self.snapshots.read().await;
            if let Some(snapshot) = snapshots.get(viewer_id) {
                if snapshot.taken_at.elapsed() < self.snapshot_ttl {
                    return Ok(snapshot.result.clone());
                }
            }
        }
        self.refresh(viewer_id).await
    }

    async fn hidden_for(&self, viewer_id: &str) -> HashSet<String> {
        self.hidden
            .read()
            .await
            .get(viewer_id)
            .cloned()
            .unwrap_or_default()
    }

    fn source_views(result: &AggregateResult, hidden: &HashSet<String>) -> Vec<SourceView> {
        result
            .sources
            .iter()
            .map(|s| SourceView {
                id: s.id.clone(),
                label: s.label.clone(),
                visible: !hidden.contains(&s.id),
                status: s.status.clone(),
            })
            .collect()
    }

    pub async fn sources(&self, viewer_id: &str) -> AppResult<Vec<SourceView>> {
        let result = self.snapshot(viewer_id, false).await?;
        let hidden = self.hidden_for(viewer_id).await;
        Ok(Self::source_views(&result, &hidden))
    }

    pub async fn get_upcoming(&self, viewer_id: &str, force: bool) -> AppResult<CalendarView> {
        let result = self.snapshot(viewer_id, force).await?;
        let hidden = self.hidden_for(viewer_id).await;
        Ok(CalendarView {
            days: upcoming(&result, &hidden, self.zone, Utc::now()),
            sources: Self::source_views(&result, &hidden),
            generated_at: result.generated_at,
        })
    }

    pub async fn get_month(
        &self,
        viewer_id: &str,
        month_start: NaiveDate,
        force: bool,
    ) -> AppResult<CalendarView> {
        let result = self.snapshot(viewer_id, force).await?;
        let hidden = self.hidden_for(viewer_id).await;
        Ok(CalendarView {
            days: in_month(&result, &hidden, self.zone, month_start)?,
            sources: Self::source_views(&result, &hidden),
            generated_at: result.generated_at,
        })
    }

    /// Show or hide one source. Only the filter changes; nothing is re-fetched.
    pub async fn set_source_visible(
        &self,
        viewer_id: &str,
        source_id: &str,
        visible: bool,
    ) -> AppResult<Vec<SourceView>> {
        let result = self.snapshot(viewer_id, false).await?;
        if !result.sources.iter().any(|s| s.id == source_id) {
            return Err(AppError::NotFound(format!(
                "Calendar source {} not found",
                source_id
            )));
        }

        let hidden = {
            let mut all = self.hidden.write().await;
            if visible {
                let now_empty = match all.get_mut(viewer_id) {
                    Some(hidden) => {
                        hidden.remove(source_id);
                        hidden.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    all.remove(viewer_id);
                }
            } else {
                all.entry(viewer_id.to_string())
                    .or_default()
                    .insert(source_id.to_string());
            }
            all.get(viewer_id).cloned().unwrap_or_default()
        };

        debug!(
            "Viewer {} set source {} visible={}",
            viewer_id, source_id, visible
        );
        Ok(Self::source_views(&result, &hidden))
    }

    /// Forget the viewer's snapshot so the next read re-fetches. Visibility is kept.
    pub async fn invalidate(&self, viewer_id: &str) {
        self.snapshots.write().await.remove(viewer_id);
    }

    /// Forget the snapshots of several viewers at once.
    pub async fn invalidate_all<I, S>(&self, viewer_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut snapshots = self.snapshots.write().await;
        for viewer_id in viewer_ids {
            snapshots.remove(viewer_id.as_ref());
        }
    }

    /// Forget every calendar that shows bookings of `user_ids`: the users
    /// themselves and everyone they share with. If the grantee lookup fails
    /// all snapshots are dropped.
    pub async fn invalidate_watchers_of(&self, pool: &SqlitePool, user_ids: &[String]) {
        let mut viewers: HashSet<String> = user_ids.iter().cloned().collect();
        for user_id in user_ids {
            match CalendarShareRepository::list_accepted_grantee_ids(pool, user_id).await {
                Ok(grantees) => viewers.extend(grantees),
                Err(e) => {
                    warn!(
                        "Failed to list grantees of {}, dropping all snapshots: {:?}",
                        user_id, e
                    );
                    self.snapshots.write().await.clear();
                    return;
                }
            }
        }
        debug!("Invalidating {} calendar snapshots", viewers.len());
        self.invalidate_all(viewers).await;
    }

    /// Forget every calendar showing a booking on the activity.
    pub async fn invalidate_for_activity(&self, pool: &SqlitePool, activity_id: &str) {
        match BookingRepository::list_active_user_ids(pool, activity_id).await {
            Ok(bookers) => self.invalidate_watchers_of(pool, &bookers).await,
            Err(e) => {
                warn!(
                    "Failed to list bookers of activity {}, dropping all snapshots: {:?}",
                    activity_id, e
                );
                self.snapshots.write().await.clear();
            }
        }
    }

    /// Drop snapshots older than the configured TTL. Returns how many were dropped.
    pub async fn sweep_expired(&self) -> usize {
        let mut snapshots = self.snapshots.write().await;
        let before = snapshots.len();
        snapshots.retain(|_, s| s.taken_at.elapsed() < self.snapshot_ttl);
        before - snapshots.len()
    }
}
