use reqwest::header::COOKIE;
use reqwest::{Client, Method};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::EntityError;
use crate::models::EntityKind;
use crate::services::image_store::ApiErrorResponse;
use crate::services::tracker::ReferenceTracker;

/// Merges the tracker's image into an entity payload under the field the
/// entity API expects (`image_path` for articles, `image_url` otherwise).
pub fn build_payload(
    kind: EntityKind,
    mut fields: Map<String, Value>,
    tracker: &ReferenceTracker,
) -> Map<String, Value> {
    let image = tracker
        .payload_value()
        .map(Value::String)
        .unwrap_or(Value::Null);
    fields.insert(kind.image_field().to_string(), image);
    fields
}

fn collection_path(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Article => "articles",
        EntityKind::Product => "product",
        EntityKind::About => "about",
    }
}

/// Saves articles, products and the about profile, committing the featured
/// image once the entity API accepts it.
pub struct EntityClient {
    client: Client,
    endpoint: String,
    session_cookie: Option<String>,
}

impl EntityClient {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            session_cookie: None,
        }
    }

    pub fn with_session_cookie(mut self, cookie: Option<String>) -> Self {
        self.session_cookie = cookie;
        self
    }

    /// `POST /articles`, `/product` or `/about`
    pub async fn create(
        &self,
        kind: EntityKind,
        fields: Map<String, Value>,
        tracker: &mut ReferenceTracker,
    ) -> Result<Value, EntityError> {
        let url = format!("{}/{}", self.endpoint, collection_path(kind));
        self.save(Method::POST, url, kind, fields, tracker).await
    }

    /// `PATCH /{kind}/{id}`; articles are addressed by slug
    pub async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        fields: Map<String, Value>,
        tracker: &mut ReferenceTracker,
    ) -> Result<Value, EntityError> {
        let url = format!("{}/{}/{}", self.endpoint, kind.as_str(), id);
        self.save(Method::PATCH, url, kind, fields, tracker).await
    }

    async fn save(
        &self,
        method: Method,
        url: String,
        kind: EntityKind,
        fields: Map<String, Value>,
        tracker: &mut ReferenceTracker,
    ) -> Result<Value, EntityError> {
        let payload = build_payload(kind, fields, tracker);

        let mut request = self.client.request(method, &url).json(&payload);
        if let Some(cookie) = &self.session_cookie {
            request = request.header(COOKIE, cookie);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EntityError::Rejected {
                status: status.as_u16(),
                message: ApiErrorResponse::describe(&body),
            });
        }

        // The entity references the new image from here on
        tracker.commit().await;
        info!("Saved {} via {}", kind, url);

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Could not read the {} save response: {}", kind, e);
                return Ok(Value::Null);
            }
        };
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}
