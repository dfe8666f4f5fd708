//! Synchronous client for the **DHIS2 Web API**.
//!
//! Covers the three resources the chart needs:
//! - `analytics`: tabular data for a `dx`/`pe` dimension query filtered by `ou`
//! - `dataElements`: the catalog offered by the pickers
//! - `dataStore/<namespace>/<key>`: persisted chart configs (see [`DataStore`])
//!
//! ### Notes
//! - Failures are returned to the caller as errors; nothing is retried here.
//! - Authentication is left to the deployment (e.g. a proxy in front of the instance).
//!
//! Typical usage:
//! ```no_run
//! # use prediction_viz::api::{AnalyticsQuery, AnalyticsSource, Client};
//! # use prediction_viz::models::OrgUnitSelector;
//! let client = Client::new("https://play.dhis2.org/dev", 30)?;
//! let table = client.analytics(&AnalyticsQuery {
//!     data_element_ids: vec!["fbfJHSPpUQD".into()],
//!     periods: vec!["202401".into(), "202402".into()],
//!     org_units: OrgUnitSelector::default(),
//! })?;
//! println!("{} rows", table.rows.len());
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::StoreError;
use crate::models::{DataElement, OrgUnitSelector, TabularResult};
use crate::store::{ConfigStore, DashboardItems};

/// One analytics request: data elements × periods, filtered by organisation units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsQuery {
    pub data_element_ids: Vec<String>,
    pub periods: Vec<String>,
    pub org_units: OrgUnitSelector,
}

impl AnalyticsQuery {
    /// Query-string pairs: `dimension=dx:a;b,pe:p1;p2` and `filter=ou:…`.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            (
                "dimension",
                format!(
                    "dx:{},pe:{}",
                    self.data_element_ids.join(";"),
                    self.periods.join(";")
                ),
            ),
            ("filter", self.org_units.to_dimension()),
        ]
    }
}

/// Anything that can answer an analytics query.
pub trait AnalyticsSource {
    fn analytics(&self, query: &AnalyticsQuery) -> Result<TabularResult>;
}

#[derive(Debug, Clone)]
pub struct Client {
    pub base_url: String,
    http: HttpClient,
}

// Allow -, _, . unescaped in dataStore namespaces and keys
const SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

fn enc(segment: &str) -> String {
    percent_encoding::utf8_percent_encode(segment.trim(), SAFE).to_string()
}

impl Client {
    /// Client for the instance rooted at `base_url` (without `/api`).
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs)) // total request timeout
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::limited(5))
            .user_agent(concat!("prediction-viz/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.api_url(path);
        debug!("GET {url} {query:?}");
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("GET {url} failed with HTTP {status}");
        }
        resp.json().with_context(|| format!("decode json from {url}"))
    }

    /// Fetch the data element catalog with each element's dataset period type.
    pub fn data_elements(&self) -> Result<Vec<DataElement>> {
        #[derive(Deserialize)]
        struct DataSetRef {
            #[serde(rename = "periodType")]
            period_type: Option<String>,
        }
        #[derive(Deserialize)]
        struct DataSetElement {
            #[serde(rename = "dataSet")]
            data_set: Option<DataSetRef>,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct RawElement {
            id: String,
            display_name: String,
            code: Option<String>,
            #[serde(default)]
            data_set_elements: Vec<DataSetElement>,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Page {
            #[serde(default)]
            data_elements: Vec<RawElement>,
        }

        let page: Page = self.get_json(
            "dataElements",
            &[
                (
                    "fields",
                    "id,displayName,code,dataSetElements[dataSet[id,periodType,name]]".into(),
                ),
                ("paging", "false".into()),
            ],
        )?;

        Ok(page
            .data_elements
            .into_iter()
            .map(|raw| DataElement {
                period_type: raw
                    .data_set_elements
                    .into_iter()
                    .next()
                    .and_then(|dse| dse.data_set)
                    .and_then(|ds| ds.period_type),
                id: raw.id,
                display_name: raw.display_name,
                code: raw.code,
            })
            .collect())
    }

    /// dataStore entry `namespace/key` as a [`ConfigStore`].
    pub fn data_store(&self, namespace: &str, key: &str) -> DataStore {
        DataStore {
            client: self.clone(),
            namespace: namespace.to_string(),
            key: key.to_string(),
        }
    }
}

impl AnalyticsSource for Client {
    fn analytics(&self, query: &AnalyticsQuery) -> Result<TabularResult> {
        if query.data_element_ids.is_empty() {
            bail!("at least one data element id required");
        }
        if query.periods.is_empty() {
            bail!("at least one period required");
        }
        self.get_json("analytics", &query.params())
    }
}

/// DHIS2 dataStore key holding the [`DashboardItems`] document.
#[derive(Debug, Clone)]
pub struct DataStore {
    client: Client,
    namespace: String,
    key: String,
}

impl DataStore {
    fn url(&self) -> String {
        self.client
            .api_url(&format!("dataStore/{}/{}", enc(&self.namespace), enc(&self.key)))
    }

    fn send_json(&self, method: reqwest::Method, items: &DashboardItems) -> Result<StatusCode> {
        let url = self.url();
        let resp = self
            .client
            .http
            .request(method.clone(), &url)
            .json(items)
            .send()
            .with_context(|| format!("{method} {url}"))?;
        Ok(resp.status())
    }
}

impl ConfigStore for DataStore {
    fn read(&self) -> Result<Option<DashboardItems>, StoreError> {
        let url = self.url();
        let resp = self
            .client
            .http
            .get(&url)
            .send()
            .with_context(|| format!("GET {url}"))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let items = resp
                    .json()
                    .with_context(|| format!("decode json from {url}"))?;
                Ok(Some(items))
            }
            s => Err(anyhow!("GET {url} failed with HTTP {s}").into()),
        }
    }

    fn create(&self, items: &DashboardItems) -> Result<(), StoreError> {
        match self.send_json(reqwest::Method::POST, items)? {
            StatusCode::CONFLICT => Err(StoreError::AlreadyExists),
            s if s.is_success() => Ok(()),
            s => Err(anyhow!("POST {} failed with HTTP {s}", self.url()).into()),
        }
    }

    fn update(&self, items: &DashboardItems) -> Result<(), StoreError> {
        match self.send_json(reqwest::Method::PUT, items)? {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound),
            s if s.is_success() => Ok(()),
            s => Err(anyhow!("PUT {} failed with HTTP {s}", self.url()).into()),
        }
    }
}
