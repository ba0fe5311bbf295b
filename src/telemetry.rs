use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use rand::{Rng, SeedableRng, distributions::Alphanumeric, rngs::SmallRng};
use serde::Serialize;
use tracing::warn;

const SNAPSHOT_INTERVAL_SECS: u64 = 300;
const MAX_SESSION_COUNT: usize = 4096;
const MAX_KEYWORD_RECORDS: usize = 10_000;
const MAX_SESSION_DISTINCT: usize = 512;
const SNAPSHOT_TOP_KEYWORDS: usize = 100;
const SESSION_ID_LEN: usize = 16;

/// Usage counters for the browsing surfaces: which formatted keywords get
/// viewed, and how far each session has explored. Never load-bearing; a
/// telemetry failure must not affect browsing.
#[derive(Clone)]
pub struct Telemetry {
    shared: Arc<TelemetryShared>,
}

impl Telemetry {
    /// Counters plus periodic JSON snapshots written to `path`.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self::with_path(Some(path.into()))
    }

    /// In-memory counters only.
    pub fn ephemeral() -> Self {
        Self::with_path(None)
    }

    fn with_path(path: Option<PathBuf>) -> Self {
        Self {
            shared: Arc::new(TelemetryShared {
                inner: RwLock::new(TelemetryData::default()),
                persistence: TelemetryPersistence::new(path),
            }),
        }
    }

    pub fn record_keyword_view(&self, formatted: &str, session_id: &str) -> SessionProgress {
        let now = now_ts();
        let mut guard = self.shared.inner.write();
        guard.record(formatted, session_id, now);
        let progress = guard
            .sessions
            .get(session_id)
            .map(SessionStats::as_progress)
            .unwrap_or_default();
        let snapshot = if self.shared.persistence.should_snapshot(now) {
            Some(guard.snapshot(now))
        } else {
            None
        };
        drop(guard);
        if let Some(snapshot) = snapshot {
            self.shared.persistence.write_snapshot(&snapshot);
        }
        progress
    }

    pub fn session_progress(&self, session_id: &str) -> Option<SessionProgress> {
        let guard = self.shared.inner.read();
        guard
            .sessions
            .get(session_id)
            .map(SessionStats::as_progress)
    }

    /// Most-viewed keywords, ties broken alphabetically.
    pub fn trending(&self, limit: usize) -> Vec<TrendingKeyword> {
        let guard = self.shared.inner.read();
        let mut rows: Vec<TrendingKeyword> = guard
            .keyword_views
            .iter()
            .map(|(keyword, stats)| TrendingKeyword {
                keyword: keyword.clone(),
                total_views: stats.total_views,
            })
            .collect();
        drop(guard);
        rows.sort_by(|a, b| {
            b.total_views
                .cmp(&a.total_views)
                .then_with(|| a.keyword.cmp(&b.keyword))
        });
        rows.truncate(limit);
        rows
    }
}

/// Fresh random session identifier for cookie-less callers.
pub fn mint_session_id() -> String {
    let mut rng = SmallRng::from_entropy();
    (0..SESSION_ID_LEN)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionProgress {
    pub views: u64,
    pub distinct_keywords: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendingKeyword {
    pub keyword: String,
    pub total_views: u64,
}

struct TelemetryShared {
    inner: RwLock<TelemetryData>,
    persistence: TelemetryPersistence,
}

#[derive(Default)]
struct TelemetryData {
    keyword_views: HashMap<String, KeywordStats>,
    sessions: HashMap<String, SessionStats>,
}

impl TelemetryData {
    fn record(&mut self, formatted: &str, session_id: &str, now: u64) {
        if let Some(stats) = self.keyword_views.get_mut(formatted) {
            stats.total_views += 1;
            stats.last_seen = now;
        } else if self.keyword_views.len() < MAX_KEYWORD_RECORDS {
            self.keyword_views.insert(
                formatted.to_string(),
                KeywordStats {
                    total_views: 1,
                    last_seen: now,
                },
            );
        }

        if let Some(session) = self.sessions.get_mut(session_id) {
            session.views += 1;
            if session.distinct.len() < MAX_SESSION_DISTINCT {
                session.distinct.insert(formatted.to_string());
            }
        } else if self.sessions.len() < MAX_SESSION_COUNT {
            let mut session = SessionStats {
                views: 1,
                ..SessionStats::default()
            };
            session.distinct.insert(formatted.to_string());
            self.sessions.insert(session_id.to_string(), session);
        }
    }

    fn snapshot(&self, now: u64) -> TelemetrySnapshot {
        let mut keywords: Vec<SnapshotKeyword> = self
            .keyword_views
            .iter()
            .map(|(keyword, stats)| SnapshotKeyword {
                keyword: keyword.clone(),
                total_views: stats.total_views,
                last_seen: stats.last_seen,
            })
            .collect();
        keywords.sort_by(|a, b| {
            b.total_views
                .cmp(&a.total_views)
                .then_with(|| a.keyword.cmp(&b.keyword))
        });
        keywords.truncate(SNAPSHOT_TOP_KEYWORDS);
        TelemetrySnapshot {
            generated_at: now,
            session_count: self.sessions.len(),
            keywords,
        }
    }
}

#[derive(Default)]
struct KeywordStats {
    total_views: u64,
    last_seen: u64,
}

#[derive(Default)]
struct SessionStats {
    views: u64,
    distinct: HashSet<String>,
}

impl SessionStats {
    fn as_progress(&self) -> SessionProgress {
        SessionProgress {
            views: self.views,
            distinct_keywords: self.distinct.len(),
        }
    }
}

#[derive(Serialize)]
struct TelemetrySnapshot {
    generated_at: u64,
    session_count: usize,
    keywords: Vec<SnapshotKeyword>,
}

#[derive(Serialize)]
struct SnapshotKeyword {
    keyword: String,
    total_views: u64,
    last_seen: u64,
}

struct TelemetryPersistence {
    path: Option<PathBuf>,
    last_snapshot: AtomicU64,
}

impl TelemetryPersistence {
    fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            last_snapshot: AtomicU64::new(0),
        }
    }

    fn should_snapshot(&self, now: u64) -> bool {
        if self.path.is_none() {
            return false;
        }
        let last = self.last_snapshot.load(AtomicOrdering::Relaxed);
        if now.saturating_sub(last) < SNAPSHOT_INTERVAL_SECS {
            return false;
        }
        self.last_snapshot
            .compare_exchange(last, now, AtomicOrdering::Relaxed, AtomicOrdering::Relaxed)
            .is_ok()
    }

    fn write_snapshot(&self, snapshot: &TelemetrySnapshot) {
        let Some(path) = &self.path else {
            return;
        };
        let payload = match serde_json::to_string_pretty(snapshot) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, "Failed to encode telemetry snapshot");
                return;
            }
        };
        let result = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .and_then(|mut file| file.write_all(payload.as_bytes()));
        if let Err(err) = result {
            warn!(%err, path = %path.display(), "Failed to write telemetry snapshot");
        }
    }
}

fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn views_accumulate_per_keyword_and_session() {
        let telemetry = Telemetry::ephemeral();
        telemetry.record_keyword_view("default rate", "s1");
        telemetry.record_keyword_view("default rate", "s1");
        let progress = telemetry.record_keyword_view("npl ratio", "s1");
        assert_eq!(progress.views, 3);
        assert_eq!(progress.distinct_keywords, 2);
        assert!(telemetry.session_progress("s2").is_none());
    }

    #[test]
    fn trending_orders_by_views_then_keyword() {
        let telemetry = Telemetry::ephemeral();
        telemetry.record_keyword_view("beta", "s1");
        telemetry.record_keyword_view("alpha", "s1");
        telemetry.record_keyword_view("alpha", "s2");
        telemetry.record_keyword_view("gamma", "s2");
        let trending = telemetry.trending(2);
        assert_eq!(trending.len(), 2);
        assert_eq!(trending[0].keyword, "alpha");
        assert_eq!(trending[0].total_views, 2);
        assert_eq!(trending[1].keyword, "beta");
    }

    #[test]
    fn minted_session_ids_are_distinct() {
        let first = mint_session_id();
        let second = mint_session_id();
        assert_eq!(first.len(), SESSION_ID_LEN);
        assert_ne!(first, second);
    }
}
