use async_trait::async_trait;
use configs::{CorruptionPolicy, ObjectStoreConfig};
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder, StatusCode, Url};
use tracing::{debug, info};

use crate::errors::ServiceError;
use crate::record::Record;
use crate::storage::{decode_records, encode_records, Snapshot, SnapshotBackend};

const GENERATION_HEADER: &str = "x-goog-generation";

/// JSON array kept as a single Google Cloud Storage object, spoken to over
/// the JSON API.
///
/// Uploads carry `ifGenerationMatch` with the generation seen at load time,
/// so a writer that raced another one gets a conflict instead of silently
/// overwriting it.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    client: Client,
    endpoint: Url,
    bucket: String,
    object: String,
    access_token: Option<String>,
    public_read: bool,
    on_corrupt: CorruptionPolicy,
}

impl ObjectStoreBackend {
    pub fn new(cfg: &ObjectStoreConfig, on_corrupt: CorruptionPolicy) -> Result<Self, ServiceError> {
        let endpoint = Url::parse(&cfg.endpoint)
            .map_err(|e| ServiceError::backend(format_args!("invalid object store endpoint `{}`", cfg.endpoint), e))?;
        if endpoint.cannot_be_a_base() {
            return Err(ServiceError::Backend(format!("object store endpoint `{endpoint}` cannot carry a path")));
        }
        let client = Client::builder()
            .user_agent(concat!("food-inventory/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::backend("build http client", e))?;
        Ok(Self {
            client,
            endpoint,
            bucket: cfg.bucket.clone(),
            object: cfg.object.clone(),
            access_token: cfg.access_token.clone(),
            public_read: cfg.public_read,
            on_corrupt,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn location(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.object)
    }
}

#[async_trait]
impl SnapshotBackend for ObjectStoreBackend {
    fn describe(&self) -> String { self.location() }

    async fn load(&self) -> Result<Snapshot, ServiceError> {
        let url = self.url(&["storage", "v1", "b", &self.bucket, "o", &self.object]);
        let resp = self
            .authorize(self.client.get(url).query(&[("alt", "media")]))
            .send()
            .await
            .map_err(|e| ServiceError::backend(format_args!("download {}", self.location()), e))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            debug!(location = %self.location(), "object missing; starting from an empty collection");
            return Ok(Snapshot { records: Vec::new(), generation: Some(0) });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Backend(format!(
                "download {} returned {status}: {body}",
                self.location()
            )));
        }
        let generation = resp
            .headers()
            .get(GENERATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok());
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ServiceError::backend(format_args!("download {}", self.location()), e))?;
        let records = decode_records(&bytes, self.on_corrupt, &self.location())?;
        Ok(Snapshot { records, generation })
    }

    async fn persist(&self, records: &[Record], generation: Option<i64>) -> Result<(), ServiceError> {
        let data = encode_records(records)?;
        let url = self.url(&["upload", "storage", "v1", "b", &self.bucket, "o"]);
        let mut query = vec![("uploadType", "media".to_string()), ("name", self.object.clone())];
        if let Some(g) = generation {
            query.push(("ifGenerationMatch", g.to_string()));
        }
        if self.public_read {
            query.push(("predefinedAcl", "publicRead".to_string()));
        }

        let resp = self
            .authorize(self.client.post(url).query(&query))
            .header(CONTENT_TYPE, "application/json")
            .body(data)
            .send()
            .await
            .map_err(|e| ServiceError::backend(format_args!("upload {}", self.location()), e))?;

        let status = resp.status();
        if status == StatusCode::PRECONDITION_FAILED {
            return Err(ServiceError::Conflict(format!(
                "{} was modified concurrently; reload and retry",
                self.location()
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Backend(format!(
                "upload {} returned {status}: {body}",
                self.location()
            )));
        }
        info!(location = %self.location(), count = records.len(), public = self.public_read, "collection uploaded");
        Ok(())
    }
}
