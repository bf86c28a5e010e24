use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{Instrument, debug, instrument, warn};

use common::logger::child_span;

use super::errors::BackendError;
use super::types::{
    FetchRequest, PushMetadata, PushPayload, PushReceipt, PushResponse, SearchEnvelope,
    SuggestEnvelope, SuggestRequest, SuggestResult,
};
use super::{Pusher, QuerySuggester, RecentSearch, Scraper};
use crate::timeline::{Order, Timeline};

const SUGGEST_PATH: &str = "/api/suggest.json";
const SEARCH_PATH: &str = "/api/search.json";
const PUSH_PATH: &str = "/api/push.json";

/// HTTP client for backend peers.
///
/// Lookups try each peer in order and return the first success. Remote
/// scraping is delegated to the peer's search endpoint.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    peers: Vec<String>,
}

impl BackendClient {
    pub fn new(peers: Vec<String>, timeout: Duration) -> Result<Self, BackendError> {
        if peers.is_empty() {
            return Err(BackendError::NoPeers);
        }

        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, peers })
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
        timeout: Option<Duration>,
    ) -> Result<T, BackendError> {
        let mut last = BackendError::NoPeers;

        for peer in &self.peers {
            let url = format!("{peer}{path}");
            let span = child_span("peer_get");
            span.record("target_url", tracing::field::display(&url));

            match self.get_json_from(&url, params, timeout).instrument(span).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    warn!(%url, error = %e, "peer request failed; trying next peer");
                    last = e;
                }
            }
        }

        Err(last)
    }

    async fn get_json_from<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&'static str, String)],
        timeout: Option<Duration>,
    ) -> Result<T, BackendError> {
        let mut req = self.http.get(url).query(params);
        if let Some(t) = timeout {
            req = req.timeout(t);
        }

        let resp = req.send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }
}

pub(crate) fn suggest_params(req: &SuggestRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("q", req.query.clone()),
        ("source", req.source.clone()),
        ("count", req.count.to_string()),
        (
            "order",
            if req.order_ascending { "asc" } else { "desc" }.to_string(),
        ),
        ("orderby", req.order_by.clone()),
        ("timezoneOffset", req.timezone_offset.to_string()),
        ("selectby", req.select_by.clone()),
        ("random", req.random.to_string()),
    ];
    if let Some(since) = &req.since {
        params.push(("since", since.clone()));
    }
    if let Some(until) = &req.until {
        params.push(("until", until.clone()));
    }
    params
}

pub(crate) fn fetch_params(req: &FetchRequest) -> Vec<(&'static str, String)> {
    vec![
        ("q", req.query.clone()),
        ("source", "twitter".to_string()),
        ("count", req.max_items.to_string()),
        ("order", req.order.as_param().to_string()),
        ("minified", (!req.full_detail).to_string()),
        ("explore", req.explore.as_param().to_string()),
    ]
}

#[async_trait]
impl QuerySuggester for BackendClient {
    #[instrument(skip(self, req), target = "backend", fields(count = req.count, random = req.random))]
    async fn suggest(&self, req: &SuggestRequest) -> anyhow::Result<SuggestResult> {
        let env: SuggestEnvelope = self.get_json(SUGGEST_PATH, &suggest_params(req), None).await?;
        let res = SuggestResult::from(env);

        debug!(got = res.queries.len(), hits = res.hits, "suggestions received");
        Ok(res)
    }
}

#[async_trait]
impl RecentSearch for BackendClient {
    #[instrument(skip(self), target = "backend")]
    async fn search_recent(&self, limit: usize, timeout: Duration) -> anyhow::Result<Timeline> {
        let params = [
            ("q", String::new()),
            ("source", "cache".to_string()),
            ("count", limit.to_string()),
            ("order", Order::CreatedAt.as_param().to_string()),
        ];

        let env: SearchEnvelope = self.get_json(SEARCH_PATH, &params, Some(timeout)).await?;
        Ok(Timeline::new(Order::CreatedAt, env.statuses))
    }
}

#[async_trait]
impl Scraper for BackendClient {
    #[instrument(skip(self, req), target = "backend", fields(query = %req.query))]
    async fn fetch(&self, req: &FetchRequest) -> Option<Timeline> {
        match self
            .get_json::<SearchEnvelope>(SEARCH_PATH, &fetch_params(req), None)
            .await
        {
            Ok(env) => Some(Timeline::new(req.order, env.statuses)),
            Err(e) => {
                debug!(error = %e, "fetch failed on every peer");
                None
            }
        }
    }
}

#[async_trait]
impl Pusher for BackendClient {
    #[instrument(skip(self, timeline), target = "backend", fields(items = timeline.len()))]
    async fn push(&self, target: &str, timeline: &Timeline) -> anyhow::Result<PushReceipt> {
        let payload = PushPayload {
            search_metadata: PushMetadata {
                query: timeline.query.as_deref(),
                count: timeline.len(),
            },
            statuses: &timeline.messages,
        };
        let data = serde_json::to_string(&payload).map_err(BackendError::from)?;

        let url = format!("{target}{PUSH_PATH}");
        let resp: PushResponse = self
            .http
            .post(&url)
            .form(&[("data", data)])
            .send()
            .await
            .map_err(BackendError::from)?
            .error_for_status()
            .map_err(BackendError::from)?
            .json()
            .await
            .map_err(BackendError::from)?;

        if resp.status != "ok" {
            return Err(BackendError::Rejected {
                peer: target.to_string(),
                message: resp.message,
            }
            .into());
        }

        Ok(PushReceipt {
            records: resp.records,
            new: resp.new,
        })
    }
}
