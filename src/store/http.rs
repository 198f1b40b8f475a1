//! HTTP client for the sync service's room API.
//!
//! Storage writes are compare-and-swap on the storage version: a write carries
//! the version it was derived from in `If-Match` (or `If-None-Match: *` when
//! creating the room), and a 412 means another writer got there first, so the
//! mutation is re-applied to a fresh read.

use super::{DocumentStore, Mutation, RoomDocument};
use crate::config::StoreConfig;
use crate::document::RoomStorage;
use crate::error::StoreError;
use crate::types::WorkspaceId;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, IF_MATCH, IF_NONE_MATCH};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct VersionedStorage {
    version: u64,
    #[serde(default)]
    storage: RoomStorage,
}

#[derive(Debug, Serialize)]
struct StorageWrite<'a> {
    storage: &'a RoomStorage,
}

pub struct HttpDocumentStore {
    client: Client,
    base_url: Url,
    secret: Option<String>,
    cas_attempts: usize,
}

impl HttpDocumentStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &StoreConfig) -> Result<Self, StoreError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| StoreError::Rejected {
            status: 0,
            message: format!("invalid store URL {:?}: {}", config.base_url, e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Rejected {
                status: 0,
                message: format!("store URL {:?} cannot carry a path", config.base_url),
            });
        }
        Ok(Self {
            client,
            base_url,
            secret: config.secret.clone(),
            cas_attempts: config.cas_attempts.max(1),
        })
    }

    fn room_url(&self, room: &WorkspaceId, resource: &str) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Rejected {
                status: 0,
                message: "store URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(["v1", "rooms", room.as_str(), resource]);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.secret {
            Some(secret) => request.header(AUTHORIZATION, format!("Bearer {}", secret)),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, room: &WorkspaceId) -> Result<Response, StoreError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(classify_failure(status, room, message))
    }

    /// Current storage and its version; `None` for a room that has never been written.
    async fn read_storage(&self, room: &WorkspaceId) -> Result<(Option<u64>, RoomStorage), StoreError> {
        let url = self.room_url(room, "storage")?;
        match self.send(self.client.get(url), room).await {
            Ok(response) => {
                let body: VersionedStorage = response
                    .json()
                    .await
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok((Some(body.version), body.storage))
            }
            Err(StoreError::NotFound(_)) => Ok((None, RoomStorage::default())),
            Err(e) => Err(e),
        }
    }

    async fn write_storage(
        &self,
        room: &WorkspaceId,
        version: Option<u64>,
        storage: &RoomStorage,
    ) -> Result<(), StoreError> {
        let url = self.room_url(room, "storage")?;
        let request = self.client.put(url).json(&StorageWrite { storage });
        let request = match version {
            Some(version) => request.header(IF_MATCH, version.to_string()),
            None => request.header(IF_NONE_MATCH, "*"),
        };
        self.send(request, room).await.map(|_| ())
    }
}

fn classify_failure(status: StatusCode, room: &WorkspaceId, message: String) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoreError::Unauthorized(format!("room {}: HTTP {}", room, status))
        }
        StatusCode::NOT_FOUND => StoreError::NotFound(room.to_string()),
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
            StoreError::Conflict(room.to_string())
        }
        s if s.is_server_error() => StoreError::Unavailable(format!("room {}: HTTP {}", room, s)),
        s => StoreError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn mutate(
        &self,
        room: &WorkspaceId,
        mutation: Mutation<'_>,
    ) -> Result<RoomStorage, StoreError> {
        for attempt in 1..=self.cas_attempts {
            let (version, previous) = self.read_storage(room).await?;
            let mut next = previous.clone();
            mutation(&mut next);
            match self.write_storage(room, version, &next).await {
                Ok(()) => {
                    debug!(room = %room, version = ?version, attempt, "Committed storage");
                    return Ok(previous);
                }
                Err(StoreError::Conflict(_)) => {
                    debug!(room = %room, attempt, "Storage changed underneath; re-applying");
                }
                Err(e) => return Err(e),
            }
        }
        warn!(room = %room, attempts = self.cas_attempts, "Gave up on contended storage");
        Err(StoreError::Conflict(room.to_string()))
    }

    async fn send_binary_update(&self, room: &WorkspaceId, update: &[u8]) -> Result<(), StoreError> {
        let url = self.room_url(room, "ydoc")?;
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(update.to_vec());
        self.send(request, room).await?;
        debug!(room = %room, bytes = update.len(), "Sent binary update");
        Ok(())
    }

    async fn get_document(&self, room: &WorkspaceId) -> Result<RoomDocument, StoreError> {
        let (version, storage) = self.read_storage(room).await?;

        let url = self.room_url(room, "ydoc")?;
        let updates = match self.send(self.client.get(url), room).await {
            Ok(response) => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                vec![bytes.to_vec()]
            }
            Err(StoreError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        if version.is_none() && updates.is_empty() {
            return Err(StoreError::NotFound(room.to_string()));
        }
        Ok(RoomDocument { storage, updates })
    }
}
