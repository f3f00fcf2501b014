//! Elasticsearch client.
//!
//! A thin typed layer over the index backend's HTTP protocol. The client is
//! stateless apart from its base URL list and index name, and is only ever
//! driven from the consumer thread, so requests are synchronous. When more
//! than one base URL is configured, a transport failure rotates to the next
//! one; a connection error is reported only after every URL has failed.

use reqwest::Method;
use reqwest::blocking::Client;
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::store::{BulkBatch, BulkOp, DocKind, DocumentStore};

/// Typed operations against an Elasticsearch index over HTTP.
#[derive(Debug)]
pub struct ElasticClient {
    http: Client,
    urls: Vec<String>,
    index: String,
}

impl ElasticClient {
    /// Create a client for `index` hosted at one or more base URLs.
    pub fn new(urls: Vec<String>, index: impl Into<String>) -> Result<Self> {
        if urls.is_empty() {
            return Err(Error::Config("at least one base URL is required".into()));
        }
        let urls = urls
            .into_iter()
            .map(|u| u.trim_end_matches('/').to_owned())
            .collect();
        Ok(ElasticClient {
            http: Client::builder().build()?,
            urls,
            index: index.into(),
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    /// Issue `method path` against the first base URL that accepts the
    /// connection. Returns status and body without judging the status.
    fn request(&self, method: Method, path: &str, body: Option<&str>) -> Result<(u16, String)> {
        let mut last_err = None;
        for base in &self.urls {
            let url = format!("{base}/{path}");
            let mut req = self
                .http
                .request(method.clone(), &url)
                .header(reqwest::header::CONTENT_TYPE, "application/json");
            if let Some(body) = body {
                req = req.body(body.to_owned());
            }
            match req.send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let text = resp.text()?;
                    return Ok((status, text));
                }
                Err(e) => last_err = Some(e),
            }
        }
        match last_err {
            Some(e) => Err(Error::Connection(e)),
            None => Err(Error::Config("at least one base URL is required".into())),
        }
    }

    fn expect_2xx(response: (u16, String)) -> Result<String> {
        let (status, body) = response;
        if (200..300).contains(&status) {
            Ok(body)
        } else {
            Err(Error::ResponseCode { status, body })
        }
    }

    fn bulk_payload(&self, batch: &BulkBatch) -> String {
        let mut payload = String::new();
        for op in &batch.ops {
            match op {
                BulkOp::Index { id, body } => {
                    let mut meta = json!({
                        "_index": self.index,
                        "_type": batch.kind.as_str(),
                    });
                    if let Some(id) = id {
                        meta["_id"] = Value::String(id.clone());
                    }
                    payload.push_str(&json!({ "index": meta }).to_string());
                    payload.push('\n');
                    payload.push_str(body);
                    payload.push('\n');
                }
                BulkOp::Update { id, doc } => {
                    let meta = json!({
                        "_index": self.index,
                        "_type": batch.kind.as_str(),
                        "_id": id,
                    });
                    payload.push_str(&json!({ "update": meta }).to_string());
                    payload.push('\n');
                    payload.push_str(&format!("{{\"doc\":{doc}}}"));
                    payload.push('\n');
                }
            }
        }
        payload
    }
}

impl DocumentStore for ElasticClient {
    fn create_index(&self, mappings: &str) -> Result<()> {
        let resp = self.request(Method::PUT, &self.index, Some(mappings))?;
        Self::expect_2xx(resp)?;
        Ok(())
    }

    fn delete_index(&self) -> Result<()> {
        let (status, body) = self.request(Method::DELETE, &self.index, None)?;
        // 404 means the index is already gone
        if status == 404 || (200..300).contains(&status) {
            Ok(())
        } else {
            Err(Error::ResponseCode { status, body })
        }
    }

    fn index(&self, kind: DocKind, body: &str, id: Option<&str>) -> Result<()> {
        let path = match id {
            Some(id) => format!("{}/{}/{}", self.index, kind, id),
            None => format!("{}/{}", self.index, kind),
        };
        let resp = self.request(Method::POST, &path, Some(body))?;
        Self::expect_2xx(resp)?;
        Ok(())
    }

    fn count(&self, kind: DocKind, query: Option<&str>) -> Result<u64> {
        let path = format!("{}/{}/_count", self.index, kind);
        let resp = self.request(Method::GET, &path, query)?;
        let body = Self::expect_2xx(resp)?;
        let v: Value = serde_json::from_str(&body)?;
        v["count"]
            .as_u64()
            .ok_or_else(|| Error::ResponseCode {
                status: 200,
                body: format!("count response without a count field: {body}"),
            })
    }

    fn search(&self, kind: DocKind, query: &str) -> Result<Value> {
        let path = format!("{}/{}/_search", self.index, kind);
        let resp = self.request(Method::POST, &path, Some(query))?;
        let body = Self::expect_2xx(resp)?;
        Ok(serde_json::from_str(&body)?)
    }

    fn delete_by_query(&self, kind: DocKind, query: &str) -> Result<()> {
        let path = format!("{}/{}/_delete_by_query", self.index, kind);
        let resp = self.request(Method::POST, &path, Some(query))?;
        Self::expect_2xx(resp)?;
        Ok(())
    }

    fn bulk(&self, batch: &BulkBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let payload = self.bulk_payload(batch);
        let resp = self.request(Method::POST, "_bulk", Some(&payload))?;
        let body = Self::expect_2xx(resp)?;
        let v: Value = serde_json::from_str(&body)?;
        let errors = v["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter(|item| {
                        item.as_object()
                            .and_then(|ops| ops.values().next())
                            .is_some_and(|op| op.get("error").is_some())
                    })
                    .count()
            })
            .unwrap_or(0);
        if errors > 0 {
            return Err(Error::BulkFail(errors));
        }
        Ok(())
    }
}
