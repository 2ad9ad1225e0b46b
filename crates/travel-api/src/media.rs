//! Media service: uploads, media metadata and trips

use std::path::Path;

use api_client::{AuthenticatedClient, Error, FilePart, RequestBody, RequestOptions, Result};
use reqwest::Method;
use serde_json::json;

use crate::models::{
    MediaItem, MediaMetadata, NewTrip, Trip, TripWithMedia, Visibility, VisibilityResponse,
};
use crate::validate;

/// Multipart field the media service reads the file from.
pub const UPLOAD_FIELD: &str = "media";

/// A file to attach to a trip.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl MediaUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, naming the upload after the file and guessing
    /// its content type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::Validation(format!("reading {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Validation(format!("{} has no file name", path.display())))?;
        Ok(Self::new(file_name, content_type_for(path), bytes))
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}

#[derive(Clone)]
pub struct MediaService {
    client: AuthenticatedClient,
}

impl MediaService {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    pub async fn upload_media_to_trip(
        &self,
        trip_id: &str,
        upload: MediaUpload,
    ) -> Result<MediaItem> {
        let trip_id = validate::id("trip id", trip_id)?;
        validate::non_empty("file name", &upload.file_name)?;
        if upload.bytes.is_empty() {
            return Err(Error::Validation(format!("{} is empty", upload.file_name)));
        }
        let body = RequestBody::Multipart(vec![FilePart::new(
            UPLOAD_FIELD,
            upload.file_name,
            upload.content_type,
            upload.bytes,
        )]);
        self.client
            .request_json(
                Method::POST,
                &format!("/api/media/trip/{trip_id}"),
                Some(body),
                RequestOptions::new(),
            )
            .await
    }

    pub async fn delete_media(&self, media_id: &str) -> Result<()> {
        let media_id = validate::id("media id", media_id)?;
        self.client
            .request_unit(
                Method::DELETE,
                &format!("/api/media/{media_id}"),
                None,
                RequestOptions::new(),
            )
            .await
    }

    pub async fn add_metadata_to_media(
        &self,
        media_id: &str,
        metadata: &MediaMetadata,
    ) -> Result<MediaItem> {
        let media_id = validate::id("media id", media_id)?;
        validate::coordinates(metadata.latitude, metadata.longitude)?;
        self.client
            .post(&format!("/api/media/{media_id}/metadata"), metadata)
            .await
    }

    pub async fn change_media_visibility(
        &self,
        media_id: &str,
        visibility: Visibility,
    ) -> Result<()> {
        let media_id = validate::id("media id", media_id)?;
        self.client
            .request_unit(
                Method::PUT,
                &format!("/api/media/{media_id}/visibility"),
                Some(RequestBody::Json(json!({ "visibility": visibility }))),
                RequestOptions::new(),
            )
            .await
    }

    pub async fn get_media_visibility(&self, media_id: &str) -> Result<Visibility> {
        let media_id = validate::id("media id", media_id)?;
        let response: VisibilityResponse = self
            .client
            .get(&format!("/api/media/{media_id}/visibility"))
            .await?;
        Ok(response.visibility)
    }

    pub async fn get_trip_media(&self, trip_id: &str) -> Result<Vec<TripWithMedia>> {
        let trip_id = validate::id("trip id", trip_id)?;
        self.list(&format!("/api/media/trip/{trip_id}")).await
    }

    pub async fn get_trip_locations(&self, trip_id: &str) -> Result<TripWithMedia> {
        let trip_id = validate::id("trip id", trip_id)?;
        self.client
            .get(&format!("/api/trips/{trip_id}/locations"))
            .await
    }

    pub async fn create_trip(&self, trip: &NewTrip) -> Result<Trip> {
        validate::non_empty("trip name", &trip.name)?;
        validate::date_range(&trip.start_date, &trip.end_date)?;
        if let Some(album_id) = &trip.album_id {
            validate::id("globe id", album_id)?;
        }
        self.client.post("/api/trips", trip).await
    }

    pub async fn get_my_trips(&self) -> Result<Vec<TripWithMedia>> {
        self.list("/api/trips/myTrips").await
    }

    pub async fn get_liked_trips(&self) -> Result<Vec<TripWithMedia>> {
        self.list("/api/trips/myLikedTrips").await
    }

    pub async fn get_public_trips(&self) -> Result<Vec<TripWithMedia>> {
        self.list("/api/trips/public").await
    }

    pub async fn get_following_trips(&self) -> Result<Vec<TripWithMedia>> {
        self.list("/api/trips/following").await
    }

    pub async fn get_trips_by_user_id(&self, user_id: &str) -> Result<Vec<TripWithMedia>> {
        let user_id = validate::id("user id", user_id)?;
        self.list(&format!("/api/trips/user/{user_id}")).await
    }

    pub async fn search_trips(&self, query: &str) -> Result<Vec<TripWithMedia>> {
        let query = validate::non_empty("search query", query)?;
        let found: Option<Vec<TripWithMedia>> = self
            .client
            .post("/api/trips/search", &json!({ "query": query }))
            .await?;
        Ok(found.unwrap_or_default())
    }

    /// List endpoints answer `null` instead of `[]` when nothing matches.
    async fn list(&self, path: &str) -> Result<Vec<TripWithMedia>> {
        let trips: Option<Vec<TripWithMedia>> = self.client.get(path).await?;
        Ok(trips.unwrap_or_default())
    }
}
