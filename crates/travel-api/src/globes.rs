//! Globes (albums of trips)

use api_client::{AuthenticatedClient, RequestOptions, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;

use crate::models::{Globe, GlobeWithTrips, NewGlobe};
use crate::validate;

#[derive(Clone)]
pub struct GlobesService {
    client: AuthenticatedClient,
}

impl GlobesService {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    pub async fn create_globe(&self, globe: &NewGlobe) -> Result<Globe> {
        validate::non_empty("globe name", &globe.name)?;
        self.client.post("/api/albums", globe).await
    }

    pub async fn delete_globe(&self, globe_id: &str) -> Result<()> {
        let globe_id = validate::id("globe id", globe_id)?;
        self.client
            .request_unit(
                Method::DELETE,
                &format!("/api/albums/{globe_id}"),
                None,
                RequestOptions::new(),
            )
            .await
    }

    pub async fn get_globe(&self, globe_id: &str) -> Result<Globe> {
        let globe_id = validate::id("globe id", globe_id)?;
        self.client.get(&format!("/api/albums/{globe_id}")).await
    }

    pub async fn get_globe_with_trips(&self, globe_id: &str) -> Result<GlobeWithTrips> {
        let globe_id = validate::id("globe id", globe_id)?;
        self.client
            .get(&format!("/api/albums/trips/{globe_id}"))
            .await
    }

    pub async fn get_my_globes(&self) -> Result<Vec<Globe>> {
        self.list("/api/albums").await
    }

    pub async fn get_my_globes_with_trips(&self) -> Result<Vec<GlobeWithTrips>> {
        self.list("/api/albums/trips").await
    }

    pub async fn get_public_globes(&self) -> Result<Vec<Globe>> {
        self.list("/api/albums/public").await
    }

    pub async fn get_public_globes_with_trips(&self) -> Result<Vec<GlobeWithTrips>> {
        self.list("/api/albums/trips/public").await
    }

    pub async fn get_globes_by_user_id(&self, user_id: &str) -> Result<Vec<Globe>> {
        let user_id = validate::id("user id", user_id)?;
        self.list(&format!("/api/albums/user/{user_id}")).await
    }

    pub async fn get_globes_by_user_id_with_trips(
        &self,
        user_id: &str,
    ) -> Result<Vec<GlobeWithTrips>> {
        let user_id = validate::id("user id", user_id)?;
        self.list(&format!("/api/albums/trips/user/{user_id}"))
            .await
    }

    async fn list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let items: Option<Vec<T>> = self.client.get(path).await?;
        Ok(items.unwrap_or_default())
    }
}
