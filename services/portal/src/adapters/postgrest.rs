//! services/portal/src/adapters/postgrest.rs
//!
//! A small query builder for the hosted table API (PostgREST dialect).
//!
//! Only the operations the portal needs are supported: select with `eq`/`in`
//! filters and ordering, insert, update and RPC calls, returning either all
//! rows, exactly one row or at most one row.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use stadion_core::ports::{PortError, PortResult};
use tracing::debug;

/// Shape of an error body returned by the table API.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

impl ErrorBody {
    fn into_port_error(self, status: StatusCode) -> PortError {
        let mut message = self
            .message
            .unwrap_or_else(|| format!("request failed with status {}", status));
        if let Some(details) = self.details.filter(|d| !d.is_empty()) {
            message = format!("{} ({})", message, details);
        }
        if let Some(hint) = self.hint.filter(|h| !h.is_empty()) {
            debug!(%hint, "table API hint");
        }
        if status == StatusCode::UNAUTHORIZED && self.code.is_none() {
            return PortError::Unauthorized;
        }
        PortError::Backend {
            code: self.code,
            message,
        }
    }
}

/// Entry point bound to one base URL and API key.
#[derive(Clone)]
pub struct Postgrest {
    http: reqwest::Client,
    rest_url: String,
    anon_key: String,
}

impl Postgrest {
    pub fn new(http: reqwest::Client, backend_url: &str, anon_key: &str) -> Self {
        Self {
            http,
            rest_url: format!("{}/rest/v1", backend_url),
            anon_key: anon_key.to_string(),
        }
    }

    /// Starts a query on `table`, authenticated as `bearer`.
    pub fn from(&self, table: &str, bearer: &str) -> Query {
        Query::new(self, format!("{}/{}", self.rest_url, table), bearer)
    }

    /// Calls a stored function with named JSON arguments.
    pub fn rpc<A: Serialize>(&self, function: &str, bearer: &str, args: &A) -> PortResult<Query> {
        let body = serde_json::to_value(args).map_err(|e| PortError::Unexpected(e.to_string()))?;
        let mut query = Query::new(self, format!("{}/rpc/{}", self.rest_url, function), bearer);
        query.method = Method::POST;
        query.body = Some(body);
        Ok(query)
    }
}

#[must_use]
pub struct Query {
    http: reqwest::Client,
    url: String,
    anon_key: String,
    bearer: String,
    method: Method,
    params: Vec<(String, String)>,
    body: Option<Value>,
    prefer: Option<&'static str>,
}

impl Query {
    fn new(client: &Postgrest, url: String, bearer: &str) -> Self {
        Self {
            http: client.http.clone(),
            url,
            anon_key: client.anon_key.clone(),
            bearer: bearer.to_string(),
            method: Method::GET,
            params: Vec::new(),
            body: None,
            prefer: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        let compact: String = columns.split_whitespace().collect::<Vec<_>>().join("");
        self.params.push(("select".to_string(), compact));
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.params
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    pub fn in_<V: ToString>(mut self, column: &str, values: &[V]) -> Self {
        let list = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.params.push((column.to_string(), format!("in.({})", list)));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params
            .push(("order".to_string(), format!("{}.{}", column, direction)));
        self
    }

    /// Turns the query into an insert returning the stored rows.
    pub fn insert<B: Serialize>(mut self, body: &B) -> PortResult<Self> {
        self.method = Method::POST;
        self.body = Some(serde_json::to_value(body).map_err(|e| PortError::Unexpected(e.to_string()))?);
        self.prefer = Some("return=representation");
        Ok(self)
    }

    /// Turns the query into an update of every row matching the filters.
    pub fn update<B: Serialize>(mut self, body: &B) -> PortResult<Self> {
        self.method = Method::PATCH;
        self.body = Some(serde_json::to_value(body).map_err(|e| PortError::Unexpected(e.to_string()))?);
        self.prefer = Some("return=representation");
        Ok(self)
    }

    fn request(&self) -> RequestBuilder {
        let mut request = self
            .http
            .request(self.method.clone(), &self.url)
            .query(&self.params)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.bearer);
        if let Some(prefer) = self.prefer {
            request = request.header("Prefer", prefer);
        }
        if let Some(body) = &self.body {
            request = request.json(body);
        }
        request
    }

    async fn send(self) -> PortResult<Value> {
        debug!(method = %self.method, url = %self.url, "table API request");
        let response = self
            .request()
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("table API unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<ErrorBody>().await.unwrap_or_default();
            return Err(body.into_port_error(status));
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let text = response
            .text()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| PortError::Unexpected(e.to_string()))
    }

    /// All matching rows.
    pub async fn execute<T: DeserializeOwned>(self) -> PortResult<Vec<T>> {
        match self.send().await? {
            Value::Null => Ok(Vec::new()),
            rows => serde_json::from_value(rows).map_err(|e| PortError::Unexpected(e.to_string())),
        }
    }

    /// Zero or one row; more than one is an error.
    pub async fn maybe_single<T: DeserializeOwned>(self) -> PortResult<Option<T>> {
        let mut rows: Vec<T> = self.execute().await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => Err(PortError::Unexpected(format!("expected at most one row, got {}", n))),
        }
    }

    /// Exactly one row.
    pub async fn single<T: DeserializeOwned>(self) -> PortResult<T> {
        let url = self.url.clone();
        self.maybe_single()
            .await?
            .ok_or_else(|| PortError::NotFound(format!("no row returned from {}", url)))
    }

    /// The raw JSON result of an RPC call.
    pub async fn call<T: DeserializeOwned>(self) -> PortResult<T> {
        let value = self.send().await?;
        serde_json::from_value(value).map_err(|e| PortError::Unexpected(e.to_string()))
    }
}
