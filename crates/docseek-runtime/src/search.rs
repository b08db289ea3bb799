//! Similarity search: one request per submit, ranked results with highlights.

use std::sync::atomic::{AtomicU64, Ordering};

use docseek_api::{BackendClient, SearchHit};
use docseek_core::{Error, Result};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::credential::CredentialHandle;
use crate::gate::RequestGate;
use crate::highlight::{Highlighter, ScoreTier, Span};

/// Result-count options offered to the user.
pub const LIMIT_OPTIONS: &[u32] = &[5, 10, 20, 50];

/// Similarity-threshold options offered to the user.
pub const THRESHOLD_OPTIONS: &[f64] = &[0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

/// Limit and threshold, each drawn from its fixed option set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchParams {
    limit: u32,
    threshold: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: 0.7,
        }
    }
}

impl SearchParams {
    pub fn new(limit: u32, threshold: f64) -> Result<Self> {
        if !LIMIT_OPTIONS.contains(&limit) {
            return Err(Error::Validation(format!(
                "Result limit must be one of {:?}, got {}",
                LIMIT_OPTIONS, limit
            )));
        }
        let threshold = THRESHOLD_OPTIONS
            .iter()
            .copied()
            .find(|t| (t - threshold).abs() < 1e-9)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "Similarity threshold must be one of {:?}, got {}",
                    THRESHOLD_OPTIONS, threshold
                ))
            })?;
        Ok(Self { limit, threshold })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// e.g. `Showing results with 70%+ similarity`.
    pub fn summary(&self) -> String {
        format!("Showing results with {:.0}%+ similarity", self.threshold * 100.0)
    }
}

/// A returned chunk plus its presentation data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub hit: SearchHit,
    pub tier: ScoreTier,
    pub highlights: Vec<Span>,
}

impl RankedResult {
    /// Content split into `(segment, highlighted)` pairs.
    pub fn segments(&self) -> Vec<(&str, bool)> {
        crate::highlight::split_segments(&self.hit.content, &self.highlights)
    }
}

/// What the search panel shows. Error and no-results are mutually exclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchView {
    Idle,
    Loading,
    Error(String),
    NoResults,
    Results(Vec<RankedResult>),
}

#[derive(Debug, Default)]
struct SearchState {
    query: String,
    params: SearchParams,
    results: Vec<RankedResult>,
    error: Option<String>,
    loading: bool,
    settled: bool,
}

pub struct SearchController {
    backend: BackendClient,
    credential: CredentialHandle,
    state: RwLock<SearchState>,
    epoch: AtomicU64,
    gate: RequestGate,
}

impl SearchController {
    pub fn new(backend: BackendClient, credential: CredentialHandle) -> Self {
        Self {
            backend,
            credential,
            state: RwLock::new(SearchState::default()),
            epoch: AtomicU64::new(0),
            gate: RequestGate::new("search"),
        }
    }

    /// Search across all documents.
    pub async fn search(&self, query: &str, params: SearchParams) -> Result<Vec<RankedResult>> {
        self.search_within(query, params, &[]).await
    }

    /// Search restricted to `file_ids`; an empty slice searches everything.
    pub async fn search_within(
        &self,
        query: &str,
        params: SearchParams,
        file_ids: &[String],
    ) -> Result<Vec<RankedResult>> {
        let query = query.trim();
        if query.is_empty() {
            let mut state = self.state.write();
            state.results.clear();
            state.query.clear();
            state.settled = false;
            return Ok(Vec::new());
        }

        let key = match self.credential.require_valid() {
            Ok(key) => key,
            Err(e) => {
                self.state.write().error = Some(e.user_message());
                return Err(e);
            }
        };
        let ticket = self.gate.begin()?;

        {
            let mut state = self.state.write();
            state.query = query.to_string();
            state.params = params;
            state.loading = true;
            state.error = None;
        }

        let result = if file_ids.is_empty() {
            self.backend
                .search(query, &key, params.limit(), params.threshold())
                .await
        } else {
            self.backend
                .search_within(query, &key, params.limit(), params.threshold(), file_ids)
                .await
        };
        if !ticket.is_current() {
            debug!("Discarding results for {:?} from a previous epoch", query);
            return Err(Error::Superseded);
        }

        let mut state = self.state.write();
        state.loading = false;
        state.settled = true;
        match result {
            Ok(hits) => {
                check_ranking(&hits, params.threshold());
                let ranked = rank(hits, query);
                info!("Search {:?} returned {} results", query, ranked.len());
                state.error = None;
                state.results = ranked.clone();
                Ok(ranked)
            }
            Err(e) => {
                warn!("Search {:?} failed: {}", query, e);
                state.error = Some(e.user_message());
                state.results.clear();
                Err(e)
            }
        }
    }

    pub fn view(&self) -> SearchView {
        let state = self.state.read();
        if state.loading {
            SearchView::Loading
        } else if let Some(err) = &state.error {
            SearchView::Error(err.clone())
        } else if !state.results.is_empty() {
            SearchView::Results(state.results.clone())
        } else if state.settled {
            SearchView::NoResults
        } else {
            SearchView::Idle
        }
    }

    pub fn results(&self) -> Vec<RankedResult> {
        self.state.read().results.clone()
    }

    pub fn last_query(&self) -> String {
        self.state.read().query.clone()
    }

    pub fn params(&self) -> SearchParams {
        self.state.read().params
    }

    pub fn is_searching(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Discard query, results and errors for a new refresh-epoch.
    pub fn invalidate(&self, epoch: u64) {
        self.gate.invalidate();
        *self.state.write() = SearchState::default();
        self.epoch.store(epoch, Ordering::Release);
        debug!("Search state invalidated at epoch {}", epoch);
    }
}

fn rank(hits: Vec<SearchHit>, query: &str) -> Vec<RankedResult> {
    let highlighter = Highlighter::new(query);
    hits.into_iter()
        .map(|hit| RankedResult {
            tier: ScoreTier::from_score(hit.similarity_score),
            highlights: highlighter.spans(&hit.content),
            hit,
        })
        .collect()
}

/// Ordering and filtering belong to the backend; violations are only logged.
fn check_ranking(hits: &[SearchHit], threshold: f64) {
    for pair in hits.windows(2) {
        if pair[1].similarity_score > pair[0].similarity_score {
            warn!(
                "Backend returned out-of-order scores: {} after {}",
                pair[1].similarity_score, pair[0].similarity_score
            );
            break;
        }
    }
    if let Some(low) = hits.iter().find(|h| h.similarity_score < threshold) {
        warn!(
            "Backend returned {} below threshold {}",
            low.chunk_id, threshold
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialManager;
    use crate::session::{MemorySession, SessionStorage};
    use docseek_api::KeyValidator;
    use docseek_core::{ClientConfig, SESSION_KEY};
    use std::sync::Arc;
    use wiremock::matchers::{any, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials(with_key: bool) -> CredentialManager {
        let storage = Arc::new(MemorySession::new());
        if with_key {
            storage.set(SESSION_KEY, "sk-search-test").unwrap();
        }
        let mgr = CredentialManager::new(KeyValidator::new(&ClientConfig::default()).unwrap(), storage);
        mgr.initialize();
        mgr
    }

    fn controller(server: &MockServer, creds: &CredentialManager) -> SearchController {
        let backend = BackendClient::new(&ClientConfig::with_base_url(server.uri())).unwrap();
        SearchController::new(backend, creds.handle())
    }

    fn hit(id: &str, score: f64, content: &str) -> serde_json::Value {
        serde_json::json!({
            "chunk_id": id,
            "file_id": "f",
            "filename": "guide.pdf",
            "chunk_index": 0,
            "content": content,
            "similarity_score": score,
        })
    }

    #[test]
    fn test_params_option_sets() {
        assert_eq!(SearchParams::default().limit(), 10);
        assert_eq!(SearchParams::default().threshold(), 0.7);
        assert!(SearchParams::new(20, 0.3).is_ok());
        assert!(SearchParams::new(7, 0.7).is_err());
        assert!(SearchParams::new(10, 0.75).is_err());
        assert_eq!(SearchParams::new(50, 0.8).unwrap().summary(), "Showing results with 80%+ similarity");
    }

    #[tokio::test]
    async fn test_blank_query_is_noop() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let creds = credentials(true);
        let ctl = controller(&server, &creds);
        let results = ctl.search("   ", SearchParams::default()).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(ctl.view(), SearchView::Idle);
    }

    #[tokio::test]
    async fn test_missing_credential() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let creds = credentials(false);
        let ctl = controller(&server, &creds);
        let err = ctl
            .search("how to configure caching", SearchParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Credential(_)));
        assert!(matches!(ctl.view(), SearchView::Error(_)));
    }

    #[tokio::test]
    async fn test_results_ranked_and_highlighted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search/"))
            .and(query_param("query", "eviction policy"))
            .and(query_param("limit", "5"))
            .and(query_param("threshold", "0.5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                hit("c1", 0.88, "The eviction Policy decides what goes."),
                hit("c2", 0.61, "Nothing relevant here.")
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let creds = credentials(true);
        let ctl = controller(&server, &creds);
        let params = SearchParams::new(5, 0.5).unwrap();
        let results = ctl.search("  eviction policy ", params).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tier, ScoreTier::Strong);
        assert_eq!(results[1].tier, ScoreTier::Weak);
        let marked: Vec<&str> = results[0]
            .segments()
            .into_iter()
            .filter(|(_, m)| *m)
            .map(|(s, _)| s)
            .collect();
        assert_eq!(marked, vec!["eviction", "Policy"]);
        assert!(results[1].highlights.is_empty());
        assert_eq!(ctl.last_query(), "eviction policy");
        assert_eq!(ctl.params(), params);
    }

    #[tokio::test]
    async fn test_no_results_vs_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("query", "nothing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("query", "boom"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"detail": "Search failed: quota exceeded"})),
            )
            .mount(&server)
            .await;

        let creds = credentials(true);
        let ctl = controller(&server, &creds);

        ctl.search("nothing", SearchParams::default()).await.unwrap();
        assert_eq!(ctl.view(), SearchView::NoResults);

        assert!(ctl.search("boom", SearchParams::default()).await.is_err());
        assert_eq!(
            ctl.view(),
            SearchView::Error("Search failed: quota exceeded".into())
        );

        ctl.search("nothing", SearchParams::default()).await.unwrap();
        assert_eq!(ctl.view(), SearchView::NoResults);
    }

    #[tokio::test]
    async fn test_second_query_rejected_while_outstanding() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([hit("c1", 0.95, "redis")]))
                    .set_delay(std::time::Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let creds = credentials(true);
        let ctl = controller(&server, &creds);
        let (first, second) = tokio::join!(ctl.search("redis", SearchParams::default()), async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            ctl.search("other", SearchParams::default()).await
        });
        assert!(first.is_ok());
        assert!(matches!(second, Err(Error::Busy("search"))));
    }

    #[tokio::test]
    async fn test_fresh_results_clear_earlier_credential_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([hit("c1", 0.95, "redis")]))
                    .set_delay(std::time::Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let creds = credentials(true);
        let ctl = controller(&server, &creds);
        let (first, second) = tokio::join!(ctl.search("redis", SearchParams::default()), async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            creds.clear();
            ctl.search("other", SearchParams::default()).await
        });

        assert!(matches!(second, Err(Error::Credential(_))));
        assert_eq!(first.unwrap().len(), 1);
        assert!(matches!(ctl.view(), SearchView::Results(r) if r.len() == 1));
    }

    #[tokio::test]
    async fn test_invalidate_discards_stale_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([hit("c1", 0.95, "redis")]))
                    .set_delay(std::time::Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let creds = credentials(true);
        let ctl = controller(&server, &creds);
        let (stale, _) = tokio::join!(ctl.search("redis", SearchParams::default()), async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            ctl.invalidate(3);
        });
        assert!(matches!(stale, Err(Error::Superseded)));
        assert!(ctl.results().is_empty());
        assert_eq!(ctl.view(), SearchView::Idle);
        assert_eq!(ctl.epoch(), 3);
    }

    #[tokio::test]
    async fn test_scoped_search_posts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/search/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                hit("c1", 0.9, "scoped")
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let creds = credentials(true);
        let ctl = controller(&server, &creds);
        let ids = vec!["f".to_string()];
        let results = ctl
            .search_within("scoped", SearchParams::default(), &ids)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }
}
