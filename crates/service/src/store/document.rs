//! Record store backed by an Appwrite database collection.
//!
//! Unlike snapshot stores, every operation is a single REST call (two for
//! delete, which fetches the document first so it can be returned).
//! Equality filters are pushed down as Appwrite queries and ids come from
//! the database's own generator, so they are opaque strings.

use async_trait::async_trait;
use configs::DocumentStoreConfig;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::errors::ServiceError;
use crate::record::{opt_id, opt_number, Record, RecordFields, RecordFilter, RecordId};
use crate::store::RecordStore;

const PAGE_SIZE: usize = 100;
/// Asks Appwrite to generate the document id.
const UNIQUE_ID: &str = "unique()";

pub struct DocumentStore {
    client: Client,
    endpoint: Url,
    project_id: String,
    api_key: String,
    database_id: String,
    collection_id: String,
    label: String,
}

/// Body of an Appwrite error response.
#[derive(Debug, Default, Deserialize)]
struct AppwriteError {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct DocumentList {
    #[serde(default)]
    total: u64,
    documents: Vec<Document>,
}

/// A stored document; Appwrite's `$`-prefixed metadata other than `$id` is ignored.
#[derive(Debug, Deserialize)]
struct Document {
    #[serde(rename = "$id", default, deserialize_with = "opt_id")]
    id: Option<RecordId>,
    #[serde(default)]
    product: Option<String>,
    #[serde(default, deserialize_with = "opt_number")]
    amount: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    price: Option<f64>,
    #[serde(default)]
    shop: Option<String>,
    #[serde(default)]
    todate: Option<String>,
}

fn attribute<T>(value: Option<T>, name: &str, id: &RecordId) -> Result<T, ServiceError> {
    value.ok_or_else(|| ServiceError::Backend(format!("document {id} has no `{name}` attribute")))
}

impl TryFrom<Document> for Record {
    type Error = ServiceError;

    fn try_from(d: Document) -> Result<Self, Self::Error> {
        let id = d
            .id
            .ok_or_else(|| ServiceError::Backend("document without `$id`".into()))?;
        Ok(Record {
            product: attribute(d.product, "product", &id)?,
            amount: attribute(d.amount, "amount", &id)?,
            price: attribute(d.price, "price", &id)?,
            shop: attribute(d.shop, "shop", &id)?,
            todate: attribute(d.todate, "todate", &id)?,
            id,
        })
    }
}

/// Appwrite JSON query string for `attribute == value`.
fn equal_query(attribute: &str, value: Value) -> String {
    let attribute = if attribute == "id" { "$id" } else { attribute };
    let value = match value {
        // document ids are always strings on the Appwrite side
        Value::Number(n) if attribute == "$id" => Value::String(n.to_string()),
        other => other,
    };
    json!({"method": "equal", "attribute": attribute, "values": [value]}).to_string()
}

fn page_queries(offset: usize) -> [String; 2] {
    [
        json!({"method": "limit", "values": [PAGE_SIZE]}).to_string(),
        json!({"method": "offset", "values": [offset]}).to_string(),
    ]
}

impl DocumentStore {
    pub fn new(cfg: &DocumentStoreConfig) -> Result<Self, ServiceError> {
        let endpoint = Url::parse(&cfg.endpoint)
            .map_err(|e| ServiceError::backend(format_args!("invalid document endpoint `{}`", cfg.endpoint), e))?;
        if endpoint.cannot_be_a_base() {
            return Err(ServiceError::Backend(format!("document endpoint `{endpoint}` cannot carry a path")));
        }
        let client = Client::builder()
            .user_agent(concat!("food-inventory/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::backend("build http client", e))?;
        let label = format!("appwrite:{}/{}", cfg.database_id, cfg.collection_id);
        Ok(Self {
            client,
            endpoint,
            project_id: cfg.project_id.clone(),
            api_key: cfg.api_key.clone(),
            database_id: cfg.database_id.clone(),
            collection_id: cfg.collection_id.clone(),
            label,
        })
    }

    fn documents_url(&self, id: Option<&RecordId>) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend([
                "databases",
                self.database_id.as_str(),
                "collections",
                self.collection_id.as_str(),
                "documents",
            ]);
            if let Some(id) = id {
                path.push(&id.to_string());
            }
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("X-Appwrite-Project", &self.project_id)
            .header("X-Appwrite-Key", &self.api_key)
    }

    /// Send and translate Appwrite's error statuses into `ServiceError`s.
    async fn send(&self, req: RequestBuilder, action: &str, id: Option<&RecordId>) -> Result<Response, ServiceError> {
        let resp = req
            .send()
            .await
            .map_err(|e| ServiceError::backend(format_args!("{action} on {}", self.label), e))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body: AppwriteError = resp.json().await.unwrap_or_default();
        debug!(backend = %self.label, %status, kind = %body.kind, message = %body.message, "appwrite request failed");
        Err(match (status, id) {
            (StatusCode::NOT_FOUND, Some(id)) => ServiceError::not_found(id),
            (StatusCode::CONFLICT, _) => ServiceError::Conflict(format!(
                "record already exists, possibly violating a uniqueness constraint: {}",
                body.message
            )),
            (StatusCode::BAD_REQUEST, _) => ServiceError::Validation(body.message),
            _ => ServiceError::Backend(format!("{action} on {} returned {status}: {}", self.label, body.message)),
        })
    }

    async fn parse_document(&self, resp: Response, action: &str) -> Result<Record, ServiceError> {
        let doc: Document = resp
            .json()
            .await
            .map_err(|e| ServiceError::backend(format_args!("decode {action} response"), e))?;
        Record::try_from(doc)
    }

    async fn fetch(&self, id: &RecordId) -> Result<Record, ServiceError> {
        let req = self.request(Method::GET, self.documents_url(Some(id)));
        let resp = self.send(req, "get document", Some(id)).await?;
        self.parse_document(resp, "get document").await
    }

    async fn patch(&self, id: &RecordId, fields: &RecordFields, action: &str) -> Result<Record, ServiceError> {
        let req = self
            .request(Method::PATCH, self.documents_url(Some(id)))
            .json(&json!({ "data": fields.data_map() }));
        let resp = self.send(req, action, Some(id)).await?;
        self.parse_document(resp, action).await
    }
}

#[async_trait]
impl RecordStore for DocumentStore {
    fn backend(&self) -> &str { &self.label }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<Record>, ServiceError> {
        if filter.matches_nothing() {
            return Ok(Vec::new());
        }
        let filters: Vec<String> = filter
            .equalities()
            .into_iter()
            .map(|(attribute, value)| equal_query(attribute, value))
            .collect();

        let mut records = Vec::new();
        loop {
            let mut query: Vec<(&str, String)> =
                filters.iter().map(|q| ("queries[]", q.clone())).collect();
            query.extend(page_queries(records.len()).map(|q| ("queries[]", q)));

            let req = self.request(Method::GET, self.documents_url(None)).query(&query);
            let resp = self.send(req, "list documents", None).await?;
            let page: DocumentList = resp
                .json()
                .await
                .map_err(|e| ServiceError::backend("decode document list", e))?;
            let fetched = page.documents.len();
            for doc in page.documents {
                records.push(Record::try_from(doc)?);
            }
            if fetched < PAGE_SIZE || records.len() as u64 >= page.total {
                break;
            }
        }
        Ok(records)
    }

    async fn create(&self, fields: RecordFields) -> Result<Record, ServiceError> {
        fields.require_complete()?;
        let req = self
            .request(Method::POST, self.documents_url(None))
            .json(&json!({ "documentId": UNIQUE_ID, "data": fields.data_map() }));
        let resp = self.send(req, "create document", None).await?;
        let record = self.parse_document(resp, "create document").await?;
        info!(backend = %self.label, id = %record.id, product = %record.product, "record_created");
        Ok(record)
    }

    async fn replace(&self, id: &RecordId, fields: RecordFields) -> Result<Record, ServiceError> {
        fields.require_complete()?;
        let record = self.patch(id, &fields, "replace document").await?;
        info!(backend = %self.label, id = %record.id, "record_replaced");
        Ok(record)
    }

    async fn update(&self, id: &RecordId, fields: RecordFields) -> Result<Record, ServiceError> {
        let record = self.patch(id, &fields, "update document").await?;
        info!(backend = %self.label, id = %record.id, "record_updated");
        Ok(record)
    }

    async fn delete(&self, id: &RecordId) -> Result<Record, ServiceError> {
        let record = self.fetch(id).await?;
        let req = self.request(Method::DELETE, self.documents_url(Some(id)));
        self.send(req, "delete document", Some(id)).await?;
        info!(backend = %self.label, id = %record.id, "record_deleted");
        Ok(record)
    }
}
