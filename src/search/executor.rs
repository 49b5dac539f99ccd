//! The HTTP capability the search cube calls into.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::BoxError;

/// Path of the scroll continuation endpoint.
pub const SCROLL_PATH: &str = "_search/scroll";

/// Sends JSON requests to a search cluster and returns the decoded response.
#[async_trait]
pub trait SearchExecutor: Send + Sync {
    async fn execute(&self, method: &str, path: &str, body: Value) -> Result<Value, BoxError>;

    /// Run a search and follow scroll cursors until a page comes back empty.
    ///
    /// Returns every hit across all pages, in order.
    async fn search_all(
        &self,
        path: &str,
        body: Value,
        keep_alive: &str,
    ) -> Result<Vec<Value>, BoxError> {
        let first = self
            .execute("POST", &format!("{}?scroll={}", path, keep_alive), body)
            .await?;
        let mut hits = hits_of(&first);
        let mut last_page = hits.len();
        let mut cursor = scroll_id_of(&first);

        while let Some(scroll_id) = cursor.take() {
            if last_page == 0 {
                break;
            }
            let page = self
                .execute(
                    "POST",
                    SCROLL_PATH,
                    json!({"scroll": keep_alive, "scroll_id": scroll_id}),
                )
                .await?;
            let page_hits = hits_of(&page);
            last_page = page_hits.len();
            debug!(path, page = last_page, "scroll page fetched");
            hits.extend(page_hits);
            cursor = scroll_id_of(&page);
        }
        Ok(hits)
    }
}

/// `hits.hits` of a search response.
pub fn hits_of(response: &Value) -> Vec<Value> {
    response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn scroll_id_of(response: &Value) -> Option<String> {
    response
        .get("_scroll_id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
}
