use crate::client::ApiClient;
use crate::error::ApiError;
use lle_types::{AnalyticsRecord, Paginated};
use reqwest::Method;
use uuid::Uuid;

impl ApiClient {
    /// Analytics for a child's past sessions, newest first.
    pub async fn analytics(&self, child_id: Uuid) -> Result<Paginated<AnalyticsRecord>, ApiError> {
        let child_id = child_id.to_string();
        let call = self.call(Method::GET, "analytics", &[("child_id", child_id.as_str())])?;
        self.send_list(&call).await
    }
}
