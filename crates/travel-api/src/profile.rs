//! Profile service: profiles, search and the follow graph

use api_client::{AuthenticatedClient, Error, RequestBody, RequestOptions, Result};
use reqwest::Method;
use serde_json::json;

use crate::models::{FollowResponse, Profile, ProfileUpdate};
use crate::validate;

#[derive(Clone)]
pub struct ProfileService {
    client: AuthenticatedClient,
}

impl ProfileService {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    /// Create the logged-in user's profile.
    pub async fn create_profile(&self, profile: &ProfileUpdate) -> Result<Profile> {
        if let Some(username) = &profile.username {
            validate::non_empty("username", username)?;
        }
        self.client.post("/api/profiles", profile).await
    }

    /// Update the logged-in user's profile.
    pub async fn update_profile(&self, profile: &ProfileUpdate) -> Result<Profile> {
        self.client.post("/api/profiles/update", profile).await
    }

    /// Update another profile by id (admin tooling).
    pub async fn update_profile_by_id(
        &self,
        id: &str,
        profile: &ProfileUpdate,
    ) -> Result<Profile> {
        let id = validate::id("profile id", id)?;
        let mut body = serde_json::to_value(profile)
            .map_err(|e| Error::Validation(format!("profile is not valid JSON: {e}")))?;
        if let Some(fields) = body.as_object_mut() {
            fields.insert("id".into(), json!(id));
        }
        self.client
            .post("/api/profiles/updateProfileByID", &body)
            .await
    }

    pub async fn delete_profile(&self) -> Result<()> {
        self.client
            .request_unit(
                Method::POST,
                "/api/profiles/delete",
                Some(RequestBody::Json(json!({}))),
                RequestOptions::new(),
            )
            .await
    }

    pub async fn get_profile_by_id(&self, user_id: &str) -> Result<Profile> {
        let user_id = validate::id("user id", user_id)?;
        self.client
            .get(&format!("/api/profiles/user/{user_id}"))
            .await
    }

    pub async fn get_profile_by_username(&self, username: &str) -> Result<Profile> {
        let username = validate::id("username", username)?;
        self.client
            .get(&format!("/api/profiles/username/{username}"))
            .await
    }

    /// Substring search over usernames.
    pub async fn search_profiles(&self, query: &str) -> Result<Vec<Profile>> {
        let query = validate::non_empty("search query", query)?;
        let found: Option<Vec<Profile>> = self
            .client
            .post("/api/profiles/search", &json!({ "query": query }))
            .await?;
        Ok(found.unwrap_or_default())
    }

    pub async fn follow_user(&self, followed_id: &str) -> Result<()> {
        let followed_id = validate::id("user id", followed_id)?;
        self.client
            .request_unit(
                Method::POST,
                &format!("/api/follow/{followed_id}"),
                Some(RequestBody::Json(json!({}))),
                RequestOptions::new(),
            )
            .await
    }

    pub async fn unfollow_user(&self, followed_id: &str) -> Result<()> {
        let followed_id = validate::id("user id", followed_id)?;
        self.client
            .request_unit(
                Method::POST,
                &format!("/api/unfollow/{followed_id}"),
                Some(RequestBody::Json(json!({}))),
                RequestOptions::new(),
            )
            .await
    }

    pub async fn get_followers(&self, profile_id: &str) -> Result<FollowResponse> {
        let profile_id = validate::id("profile id", profile_id)?;
        self.client
            .get(&format!("/api/{profile_id}/followers"))
            .await
    }

    pub async fn get_following(&self, profile_id: &str) -> Result<FollowResponse> {
        let profile_id = validate::id("profile id", profile_id)?;
        self.client
            .get(&format!("/api/{profile_id}/following"))
            .await
    }
}
