//! Variomedia API Client
//!
//! Read-only wrapper around the three JSON:API resources the export needs:
//! customers, domains filtered by owner and DNS records filtered by domain.
//! A missing or empty `data` array is "no items", never an error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::error::{ExportError, Result};

pub const DEFAULT_API_URL: &str = "https://api.variomedia.de";

// ============================================================
// Domain Types
// ============================================================

/// A reseller customer as listed by `/customers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: String,
    /// The `organization` attribute.
    pub name: String,
}

/// A domain owned by a customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    pub name: String,
}

/// One DNS record, with every scalar already rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsRecord {
    pub record_type: String,
    pub fqdn: String,
    pub name: String,
    pub domain: String,
    pub data: String,
    pub ttl: String,
    pub tags: Vec<String>,
}

// ============================================================
// API Response Types
// ============================================================

#[derive(Debug, Deserialize)]
struct Document<A> {
    data: Option<Vec<Resource<A>>>,
}

#[derive(Debug, Deserialize)]
struct Resource<A> {
    #[serde(default, deserialize_with = "lenient_text")]
    id: String,
    attributes: Option<A>,
}

#[derive(Debug, Default, Deserialize)]
struct CustomerAttributes {
    #[serde(default, deserialize_with = "lenient_text")]
    organization: String,
}

#[derive(Debug, Default, Deserialize)]
struct DomainAttributes {
    #[serde(default, deserialize_with = "lenient_text")]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct DnsRecordAttributes {
    #[serde(default, deserialize_with = "lenient_text")]
    record_type: String,
    #[serde(default, deserialize_with = "lenient_text")]
    fqdn: String,
    #[serde(default, deserialize_with = "lenient_text")]
    name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    domain: String,
    #[serde(default, deserialize_with = "lenient_text")]
    data: String,
    #[serde(default, deserialize_with = "lenient_text")]
    ttl: String,
    #[serde(default, deserialize_with = "lenient_tags")]
    tags: Vec<String>,
}

impl From<Resource<CustomerAttributes>> for Customer {
    fn from(resource: Resource<CustomerAttributes>) -> Self {
        Self {
            id: resource.id,
            name: resource.attributes.unwrap_or_default().organization,
        }
    }
}

impl From<Resource<DomainAttributes>> for Domain {
    fn from(resource: Resource<DomainAttributes>) -> Self {
        Self {
            name: resource.attributes.unwrap_or_default().name,
        }
    }
}

impl From<Resource<DnsRecordAttributes>> for DnsRecord {
    fn from(resource: Resource<DnsRecordAttributes>) -> Self {
        let attrs = resource.attributes.unwrap_or_default();
        Self {
            record_type: attrs.record_type,
            fqdn: attrs.fqdn,
            name: attrs.name,
            domain: attrs.domain,
            data: attrs.data,
            ttl: attrs.ttl,
            tags: attrs.tags,
        }
    }
}

/// Renders a scalar the way it should appear in a CSV cell.
///
/// Null and container values render empty.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(value_to_text).unwrap_or_default())
}

fn lenient_tags<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Ok(items.iter().map(value_to_text).collect()),
        _ => Ok(Vec::new()),
    }
}

// ============================================================
// Client
// ============================================================

/// Upstream data source for an export run.
#[async_trait]
pub trait VariomediaApi: Send + Sync {
    /// List every customer visible to the API token.
    async fn list_customers(&self) -> Result<Vec<Customer>>;

    /// List the domains owned by `customer_id`.
    async fn list_domains(&self, customer_id: &str) -> Result<Vec<Domain>>;

    /// List the DNS records of `domain`.
    async fn list_dns_records(&self, domain: &str) -> Result<Vec<DnsRecord>>;
}

/// HTTP client for the Variomedia REST API.
pub struct VariomediaClient {
    client: Client,
    base_url: String,
    api_token: String,
}

impl VariomediaClient {
    /// Create a client with its own connection pool and request timeout.
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("variomedia-export/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self::from_reqwest(base_url, api_token, client))
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_reqwest(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            api_token: api_token.into(),
        }
    }

    async fn get_resources<A: DeserializeOwned>(&self, url: &str) -> Result<Vec<Resource<A>>> {
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("token {}", self.api_token))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::UpstreamStatus {
                status,
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let document: Document<A> =
            serde_json::from_slice(&body).map_err(|source| ExportError::Decode {
                url: url.to_string(),
                source,
            })?;

        Ok(document.data.unwrap_or_default())
    }
}

#[async_trait]
impl VariomediaApi for VariomediaClient {
    async fn list_customers(&self) -> Result<Vec<Customer>> {
        let url = format!("{}/customers", self.base_url);
        let resources = self.get_resources::<CustomerAttributes>(&url).await?;
        Ok(resources.into_iter().map(Customer::from).collect())
    }

    async fn list_domains(&self, customer_id: &str) -> Result<Vec<Domain>> {
        let url = format!(
            "{}/domains?filter[owner_id]={}",
            self.base_url,
            urlencoding::encode(customer_id)
        );
        let resources = self.get_resources::<DomainAttributes>(&url).await?;
        Ok(resources.into_iter().map(Domain::from).collect())
    }

    async fn list_dns_records(&self, domain: &str) -> Result<Vec<DnsRecord>> {
        let url = format!(
            "{}/dns-records?filter[domain]={}",
            self.base_url,
            urlencoding::encode(domain)
        );
        let resources = self.get_resources::<DnsRecordAttributes>(&url).await?;
        Ok(resources.into_iter().map(DnsRecord::from).collect())
    }
}
