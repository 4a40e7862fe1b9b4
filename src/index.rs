/*============================================================
  Synavera Project: Syn-Pyx
  Module: synpyx_core::index
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Retrieve and normalize the remote release index for a set
    of projects, producing one deterministic record sequence
    per sync cycle.

  Security / Safety Notes:
    Performs read-only HTTPS requests to the configured index.
    No credentials are transmitted.

  Dependencies:
    reqwest for HTTP, serde_json for document parsing.

  Operational Scope:
    Supplies the remote snapshot consumed by the differ and
    the pending-unit builder.

  Revision History:
    2025-11-12 COD  Implemented asynchronous index client.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Defensive retry logic with exponential backoff
    - Bounded request parallelism with ordered reassembly
    - Configurable failure policies, abort-first by default
============================================================*/

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use urlencoding::encode;

use crate::config::{FetchErrorPolicy, IndexConfig, MalformedPolicy};
use crate::error::{Result, SynpyxError};
use crate::logger::Logger;
use crate::record::{normalize, DistributionEntry, PackageRecord, ProjectDocument};

/// Capability to fetch the bytes behind a URL. Implemented over HTTP for
/// production and by canned fixtures in tests; also reused by the store to
/// pull artifacts.
#[async_trait]
pub trait RemoteFetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Capability to capture one cycle's remote record snapshot.
#[async_trait]
pub trait RemoteIndex: Send + Sync {
    async fn fetch_all(
        &self,
        projects: &[String],
        cancel: &CancellationToken,
        logger: &Logger,
    ) -> Result<RemoteSnapshot>;
}

/// Point-in-time remote inventory plus per-cycle hygiene counters.
#[derive(Debug, Default)]
pub struct RemoteSnapshot {
    /// Records grouped by supplied project order, upstream release order
    /// within a project.
    pub records: Vec<PackageRecord>,
    /// Projects skipped under the skip-on-fetch-error policy.
    pub skipped_projects: usize,
    /// Distribution records dropped for missing required fields.
    pub malformed_records: usize,
    /// Records emitted without a sha256 digest; these go unverified.
    pub unverified_records: usize,
}

/// HTTP transport with timeout, retry, and exponential backoff.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_retries: usize,
}

impl HttpFetcher {
    /// Construct a transport from index configuration.
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent("Syn-Pyx-Core/0.4 (linux)")
            .build()
            .map_err(|err| {
                SynpyxError::Runtime(format!("Failed to build HTTP client: {err}"))
            })?;
        Ok(Self {
            client,
            max_retries: config.max_retries.max(1),
        })
    }
}

#[async_trait]
impl RemoteFetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut attempt = 0;
        loop {
            let response = self.client.get(url).send().await.map_err(|err| {
                SynpyxError::Runtime(format!("Request to {url} failed: {err}"))
            })?;
            let status = response.status();

            if status == StatusCode::OK {
                let payload = response.bytes().await.map_err(|err| {
                    SynpyxError::Runtime(format!("Failed to read body of {url}: {err}"))
                })?;
                return Ok(payload.to_vec());
            }

            // Client errors are definitive; only server-side trouble and
            // throttling are worth retrying.
            let retryable = status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
            attempt += 1;
            if !retryable || attempt >= self.max_retries {
                return Err(SynpyxError::Runtime(format!(
                    "Request to {url} failed with status {status} after {attempt} attempt(s)"
                )));
            }
            let exponent = (attempt as u32).min(8);
            let backoff = Duration::from_millis(200_u64.saturating_mul(1_u64 << exponent));
            sleep(backoff).await;
        }
    }
}

/// Client that turns project names into normalized record sequences.
pub struct IndexClient {
    fetcher: Arc<dyn RemoteFetch>,
    base_url: String,
    max_parallel_requests: usize,
    on_fetch_error: FetchErrorPolicy,
    on_malformed: MalformedPolicy,
}

impl IndexClient {
    pub fn new(fetcher: Arc<dyn RemoteFetch>, config: &IndexConfig) -> Self {
        Self {
            fetcher,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_parallel_requests: config.max_parallel_requests.max(1),
            on_fetch_error: config.on_fetch_error,
            on_malformed: config.on_malformed,
        }
    }

    fn project_url(&self, project: &str) -> String {
        format!("{}/pypi/{}/json", self.base_url, encode(project))
    }

    /// Parse one project document, normalizing every (version, distribution)
    /// pair in upstream order. Returns a project-local snapshot so a failed
    /// parse contributes no records at all.
    fn parse_project(
        &self,
        project: &str,
        payload: &[u8],
        logger: &Logger,
    ) -> Result<RemoteSnapshot> {
        let mut snapshot = RemoteSnapshot::default();
        let document: ProjectDocument = serde_json::from_slice(payload).map_err(|err| {
            SynpyxError::Fetch {
                project: project.to_string(),
                reason: format!("malformed index document: {err}"),
            }
        })?;

        for (version, raw_entries) in &document.releases {
            let entries: Vec<DistributionEntry> = serde_json::from_value(raw_entries.clone())
                .map_err(|err| SynpyxError::Fetch {
                    project: project.to_string(),
                    reason: format!("malformed release list for version {version}: {err}"),
                })?;

            for entry in &entries {
                match normalize(&document.info, version, entry) {
                    Ok(record) => {
                        if record.sha256.is_none() {
                            snapshot.unverified_records += 1;
                            logger.warn(
                                "DIGEST",
                                format!(
                                    "{} carries no sha256 digest; integrity check will be skipped",
                                    record.filename
                                ),
                            );
                        }
                        snapshot.records.push(record);
                    }
                    Err(err) => match self.on_malformed {
                        MalformedPolicy::Skip => {
                            snapshot.malformed_records += 1;
                            logger.warn("RECORD", format!("Skipping record: {err}"));
                        }
                        MalformedPolicy::Abort => return Err(err),
                    },
                }
            }
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl RemoteIndex for IndexClient {
    /// Fetch every project's index document and flatten the results into one
    /// record sequence.
    ///
    /// Payload fetches run in parallel under a semaphore; results are
    /// reassembled strictly in the supplied project order so the produced
    /// sequence is deterministic across cycles. One failed project aborts
    /// the cycle under the default policy.
    async fn fetch_all(
        &self,
        projects: &[String],
        cancel: &CancellationToken,
        logger: &Logger,
    ) -> Result<RemoteSnapshot> {
        let mut snapshot = RemoteSnapshot::default();
        if projects.is_empty() {
            return Ok(snapshot);
        }

        let semaphore = Arc::new(Semaphore::new(self.max_parallel_requests));
        let mut tasks = Vec::with_capacity(projects.len());

        for project in projects {
            if cancel.is_cancelled() {
                return Err(SynpyxError::Runtime("Cancellation requested".into()));
            }
            let fetcher = self.fetcher.clone();
            let semaphore = semaphore.clone();
            let url = self.project_url(project);
            tasks.push((
                project.clone(),
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| SynpyxError::Runtime("Index semaphore closed".into()))?;
                    fetcher.fetch(&url).await
                }),
            ));
        }

        for (project, task) in tasks {
            if cancel.is_cancelled() {
                return Err(SynpyxError::Runtime("Cancellation requested".into()));
            }
            let fetched = task
                .await
                .map_err(|err| SynpyxError::Runtime(format!("Index task failed: {err}")))?;
            let parsed = match fetched {
                Ok(payload) => self.parse_project(&project, &payload, logger),
                Err(err) => Err(SynpyxError::Fetch {
                    project: project.clone(),
                    reason: err.to_string(),
                }),
            };
            match parsed {
                Ok(project_snapshot) => {
                    snapshot.records.extend(project_snapshot.records);
                    snapshot.malformed_records += project_snapshot.malformed_records;
                    snapshot.unverified_records += project_snapshot.unverified_records;
                }
                // Transport trouble and an unparseable document are the same
                // failure class: the project's index could not be captured.
                Err(failure @ SynpyxError::Fetch { .. }) => match self.on_fetch_error {
                    FetchErrorPolicy::Abort => return Err(failure),
                    FetchErrorPolicy::Skip => {
                        snapshot.skipped_projects += 1;
                        logger.warn("FETCH", format!("Skipping project: {failure}"));
                    }
                },
                // Malformed-record escalation follows its own policy and
                // always aborts once raised.
                Err(other) => return Err(other),
            }
        }

        logger.debug(
            "INDEX",
            format!(
                "Remote snapshot: records={} skipped_projects={} malformed={}",
                snapshot.records.len(),
                snapshot.skipped_projects,
                snapshot.malformed_records
            ),
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct CannedFetch {
        payloads: HashMap<String, Vec<u8>>,
    }

    impl CannedFetch {
        fn new(entries: &[(&str, serde_json::Value)]) -> Self {
            let payloads = entries
                .iter()
                .map(|(project, doc)| {
                    (
                        format!("https://pypi.org/pypi/{project}/json"),
                        serde_json::to_vec(doc).expect("document serializes"),
                    )
                })
                .collect();
            Self { payloads }
        }
    }

    #[async_trait]
    impl RemoteFetch for CannedFetch {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.payloads
                .get(url)
                .cloned()
                .ok_or_else(|| SynpyxError::Runtime(format!("no route to {url}")))
        }
    }

    fn project_doc(name: &str, files: &[(&str, &str, bool)]) -> serde_json::Value {
        let mut releases = serde_json::Map::new();
        for (version, filename, with_digest) in files {
            let digests = if *with_digest {
                serde_json::json!({"sha256": "cafe"})
            } else {
                serde_json::json!({})
            };
            releases.insert(
                version.to_string(),
                serde_json::json!([{
                    "filename": filename,
                    "packagetype": "sdist",
                    "url": format!("https://files.example/{filename}"),
                    "digests": digests,
                }]),
            );
        }
        serde_json::json!({"info": {"name": name}, "releases": releases})
    }

    fn client(fetcher: Arc<dyn RemoteFetch>, config: &IndexConfig) -> IndexClient {
        IndexClient::new(fetcher, config)
    }

    fn names(snapshot: &RemoteSnapshot) -> Vec<&str> {
        snapshot
            .records
            .iter()
            .map(|r| r.filename.as_str())
            .collect()
    }

    #[tokio::test]
    async fn records_follow_supplied_project_order() {
        let fetcher = Arc::new(CannedFetch::new(&[
            (
                "beta",
                project_doc("beta", &[("1.0", "beta-1.0.tar.gz", true)]),
            ),
            (
                "alpha",
                project_doc(
                    "alpha",
                    &[
                        ("2.0", "alpha-2.0.tar.gz", true),
                        ("1.0", "alpha-1.0.tar.gz", true),
                    ],
                ),
            ),
        ]));
        let index = client(fetcher, &IndexConfig::default());
        let snapshot = index
            .fetch_all(
                &["beta".into(), "alpha".into()],
                &CancellationToken::new(),
                &Logger::disabled(),
            )
            .await
            .unwrap();
        assert_eq!(
            names(&snapshot),
            vec!["beta-1.0.tar.gz", "alpha-2.0.tar.gz", "alpha-1.0.tar.gz"]
        );
    }

    #[tokio::test]
    async fn fetch_failure_aborts_and_names_the_project() {
        let fetcher = Arc::new(CannedFetch::new(&[(
            "alpha",
            project_doc("alpha", &[("1.0", "alpha-1.0.tar.gz", true)]),
        )]));
        let index = client(fetcher, &IndexConfig::default());
        let err = index
            .fetch_all(
                &["alpha".into(), "ghost".into()],
                &CancellationToken::new(),
                &Logger::disabled(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SynpyxError::Fetch { ref project, .. } if project == "ghost"
        ));
    }

    #[tokio::test]
    async fn skip_policy_drops_the_failing_project_and_continues() {
        let fetcher = Arc::new(CannedFetch::new(&[(
            "alpha",
            project_doc("alpha", &[("1.0", "alpha-1.0.tar.gz", true)]),
        )]));
        let config = IndexConfig {
            on_fetch_error: FetchErrorPolicy::Skip,
            ..IndexConfig::default()
        };
        let index = client(fetcher, &config);
        let snapshot = index
            .fetch_all(
                &["ghost".into(), "alpha".into()],
                &CancellationToken::new(),
                &Logger::disabled(),
            )
            .await
            .unwrap();
        assert_eq!(names(&snapshot), vec!["alpha-1.0.tar.gz"]);
        assert_eq!(snapshot.skipped_projects, 1);
    }

    #[tokio::test]
    async fn unparseable_document_aborts_like_a_fetch_failure() {
        let mut fetcher = CannedFetch::new(&[(
            "alpha",
            project_doc("alpha", &[("1.0", "alpha-1.0.tar.gz", true)]),
        )]);
        fetcher.payloads.insert(
            "https://pypi.org/pypi/mangled/json".to_string(),
            b"<html>not an index</html>".to_vec(),
        );
        let index = client(Arc::new(fetcher), &IndexConfig::default());
        let err = index
            .fetch_all(
                &["mangled".into(), "alpha".into()],
                &CancellationToken::new(),
                &Logger::disabled(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SynpyxError::Fetch { ref project, .. } if project == "mangled"
        ));
    }

    #[tokio::test]
    async fn skip_policy_also_covers_unparseable_documents() {
        let mut fetcher = CannedFetch::new(&[(
            "alpha",
            project_doc("alpha", &[("1.0", "alpha-1.0.tar.gz", true)]),
        )]);
        fetcher.payloads.insert(
            "https://pypi.org/pypi/mangled/json".to_string(),
            b"<html>not an index</html>".to_vec(),
        );
        let config = IndexConfig {
            on_fetch_error: FetchErrorPolicy::Skip,
            ..IndexConfig::default()
        };
        let index = client(Arc::new(fetcher), &config);
        let snapshot = index
            .fetch_all(
                &["mangled".into(), "alpha".into()],
                &CancellationToken::new(),
                &Logger::disabled(),
            )
            .await
            .unwrap();
        assert_eq!(names(&snapshot), vec!["alpha-1.0.tar.gz"]);
        assert_eq!(snapshot.skipped_projects, 1);
    }

    #[tokio::test]
    async fn malformed_records_are_skipped_and_counted() {
        let doc = serde_json::json!({
            "info": {"name": "alpha"},
            "releases": {
                "1.0": [
                    {"packagetype": "sdist", "url": "https://files.example/x", "digests": {}},
                    {
                        "filename": "alpha-1.0.tar.gz",
                        "packagetype": "sdist",
                        "url": "https://files.example/alpha-1.0.tar.gz",
                        "digests": {"sha256": "cafe"},
                    },
                ],
            },
        });
        let fetcher = Arc::new(CannedFetch::new(&[("alpha", doc)]));
        let index = client(fetcher, &IndexConfig::default());
        let snapshot = index
            .fetch_all(
                &["alpha".into()],
                &CancellationToken::new(),
                &Logger::disabled(),
            )
            .await
            .unwrap();
        assert_eq!(names(&snapshot), vec!["alpha-1.0.tar.gz"]);
        assert_eq!(snapshot.malformed_records, 1);
    }

    #[tokio::test]
    async fn malformed_abort_policy_escalates() {
        let doc = serde_json::json!({
            "info": {"name": "alpha"},
            "releases": {
                "1.0": [{"packagetype": "sdist", "url": "https://x", "digests": {}}],
            },
        });
        let fetcher = Arc::new(CannedFetch::new(&[("alpha", doc)]));
        let config = IndexConfig {
            on_malformed: MalformedPolicy::Abort,
            ..IndexConfig::default()
        };
        let index = client(fetcher, &config);
        let err = index
            .fetch_all(
                &["alpha".into()],
                &CancellationToken::new(),
                &Logger::disabled(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SynpyxError::MalformedRecord { .. }));
    }

    #[tokio::test]
    async fn records_without_digests_are_counted_as_unverified() {
        let fetcher = Arc::new(CannedFetch::new(&[(
            "alpha",
            project_doc("alpha", &[("1.0", "alpha-1.0.tar.gz", false)]),
        )]));
        let index = client(fetcher, &IndexConfig::default());
        let snapshot = index
            .fetch_all(
                &["alpha".into()],
                &CancellationToken::new(),
                &Logger::disabled(),
            )
            .await
            .unwrap();
        assert_eq!(snapshot.unverified_records, 1);
        assert_eq!(snapshot.records[0].sha256, None);
    }

    #[tokio::test]
    async fn cancellation_stops_before_fetching() {
        let fetcher = Arc::new(CannedFetch::new(&[]));
        let index = client(fetcher, &IndexConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = index
            .fetch_all(&["alpha".into()], &cancel, &Logger::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err, SynpyxError::Runtime(_)));
    }
}
