//! Trip likes and media favourites

use api_client::{AuthenticatedClient, RequestBody, RequestOptions, Result};
use reqwest::Method;
use serde_json::json;

use crate::models::{FavoriteStatus, LikeSummary};
use crate::validate;

#[derive(Clone)]
pub struct LikesService {
    client: AuthenticatedClient,
}

impl LikesService {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    pub async fn get_likes(&self, trip_id: &str) -> Result<LikeSummary> {
        let trip_id = validate::id("trip id", trip_id)?;
        self.client
            .get(&format!("/api/likes/trip/{trip_id}"))
            .await
    }

    pub async fn like_trip(&self, trip_id: &str) -> Result<()> {
        let trip_id = validate::id("trip id", trip_id)?;
        self.client
            .request_unit(
                Method::POST,
                &format!("/api/likes/trip/{trip_id}"),
                Some(RequestBody::Json(json!({}))),
                RequestOptions::new(),
            )
            .await
    }

    pub async fn unlike_trip(&self, trip_id: &str) -> Result<()> {
        let trip_id = validate::id("trip id", trip_id)?;
        self.client
            .request_unit(
                Method::DELETE,
                &format!("/api/likes/trip/{trip_id}"),
                None,
                RequestOptions::new(),
            )
            .await
    }

    pub async fn get_media_favorite_status(&self, media_id: &str) -> Result<FavoriteStatus> {
        let media_id = validate::id("media id", media_id)?;
        self.client
            .get(&format!("/api/favourites/media/{media_id}"))
            .await
    }

    pub async fn favorite_media(&self, media_id: &str) -> Result<()> {
        let media_id = validate::id("media id", media_id)?;
        self.client
            .request_unit(
                Method::POST,
                &format!("/api/favourites/media/{media_id}"),
                Some(RequestBody::Json(json!({}))),
                RequestOptions::new(),
            )
            .await
    }

    pub async fn unfavorite_media(&self, media_id: &str) -> Result<()> {
        let media_id = validate::id("media id", media_id)?;
        self.client
            .request_unit(
                Method::DELETE,
                &format!("/api/favourites/media/{media_id}"),
                None,
                RequestOptions::new(),
            )
            .await
    }
}
