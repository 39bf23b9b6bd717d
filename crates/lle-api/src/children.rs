//! Child profile CRUD.

use crate::client::ApiClient;
use crate::error::ApiError;
use lle_types::{Child, ChildProfile, ChildUpdate, Paginated};
use reqwest::Method;
use uuid::Uuid;

impl ApiClient {
    pub async fn list_children(&self) -> Result<Paginated<Child>, ApiError> {
        let call = self.call(Method::GET, "children/", &[])?;
        self.send_list(&call).await
    }

    /// Fetches one child by id, whichever page of the list it sits on.
    pub async fn get_child(&self, id: Uuid) -> Result<Child, ApiError> {
        let call = self.call(Method::GET, &format!("children/{id}/"), &[])?;
        self.send_json(&call).await
    }

    /// # Errors
    ///
    /// `ApiError::Validation` before any request if the profile is out of
    /// bounds.
    pub async fn create_child(&self, profile: &ChildProfile) -> Result<Child, ApiError> {
        profile.validate()?;
        let call = self.call_with_body(Method::POST, "children/", profile)?;
        let child: Child = self.send_json(&call).await?;
        tracing::info!(child_id = %child.id, "created child profile");
        Ok(child)
    }

    pub async fn update_child(&self, id: Uuid, update: &ChildUpdate) -> Result<Child, ApiError> {
        update.validate()?;
        let call = self.call_with_body(Method::PATCH, &format!("children/{id}/"), update)?;
        self.send_json(&call).await
    }

    pub async fn delete_child(&self, id: Uuid) -> Result<(), ApiError> {
        let call = self.call(Method::DELETE, &format!("children/{id}/"), &[])?;
        self.send_empty(&call).await?;
        tracing::info!(child_id = %id, "deleted child profile");
        Ok(())
    }
}
