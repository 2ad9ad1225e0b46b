//! Typed request and response bodies for the travel backends
//!
//! Field names follow the wire format of each service: the profile and
//! album services emit Go-style `PascalCase` keys (`ProfileID`, `AlbumID`),
//! the media and auth services mix `snake_case` and `camelCase`. Identifiers
//! arrive as numbers from some endpoints and as strings from others, so id
//! fields accept both.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Who can see a trip, media item or globe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Visibility {
    #[serde(alias = "public")]
    Public,
    #[default]
    #[serde(alias = "private")]
    Private,
    #[serde(alias = "friends")]
    Friends,
    #[serde(alias = "followers")]
    Followers,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "PUBLIC",
            Visibility::Private => "PRIVATE",
            Visibility::Friends => "FRIENDS",
            Visibility::Followers => "FOLLOWERS",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Email/password pair for `/login` and `/register`.
#[derive(Clone, Serialize)]
pub struct UserCredentials {
    pub email: String,
    pub password: String,
}

impl UserCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCredentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Account summary embedded in auth responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    #[serde(alias = "user_id", alias = "userId", deserialize_with = "flexible_string")]
    pub id: String,
    #[serde(default)]
    pub email: String,
}

/// Body of a successful `/login` or `/register`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(
        rename = "refreshToken",
        alias = "refresh_token",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthUser>,
    #[serde(
        alias = "userId",
        default,
        deserialize_with = "optional_flexible_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,
}

impl AuthResponse {
    /// The account id, from `user_id` or the embedded `user` object.
    pub fn account_id(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .or_else(|| self.user.as_ref().map(|u| u.id.as_str()))
    }
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("user", &self.user)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Body of `GET /profile` on the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user: AuthUser,
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// A user profile.
///
/// The embedded `User` account row is not decoded; it carries the password
/// hash and lockout counters, none of which belong on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Profile {
    #[serde(rename = "ProfileID", alias = "id", deserialize_with = "flexible_u64")]
    pub profile_id: u64,
    #[serde(rename = "UserID", default, deserialize_with = "flexible_u64")]
    pub user_id: u64,
    pub username: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub birthdate: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub privacy_settings: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Partial profile for create/update calls. Unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// One entry of a followers/following list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowerFollowing {
    #[serde(deserialize_with = "flexible_u64")]
    pub profile_id: u64,
    pub username: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowList {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub profiles: Vec<FollowerFollowing>,
}

/// Body of the followers/following endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowResponse {
    #[serde(rename = "Follow")]
    pub follow: FollowList,
}

// ---------------------------------------------------------------------------
// Media & trips
// ---------------------------------------------------------------------------

/// Descriptive metadata attached to a media item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// An uploaded photo or video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(alias = "mediaId", deserialize_with = "flexible_string")]
    pub media_id: String,
    #[serde(alias = "tripId", default, deserialize_with = "flexible_string")]
    pub trip_id: String,
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: Option<MediaMetadata>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A media item as listed under a trip, with its GPS position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripMedia {
    #[serde(deserialize_with = "flexible_u64")]
    pub media_id: u64,
    pub url: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    #[serde(rename = "TripID", alias = "trip_id", deserialize_with = "flexible_u64")]
    pub trip_id: u64,
    #[serde(default, deserialize_with = "flexible_u64")]
    pub user_id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub visibility: Visibility,
}

/// A trip together with its media and location label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripWithMedia {
    pub trip: Trip,
    #[serde(default)]
    pub media: Vec<TripMedia>,
    #[serde(default)]
    pub location: String,
}

/// Body of `POST /api/trips`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTrip {
    pub name: String,
    pub description: String,
    pub visibility: Visibility,
    pub start_date: String,
    pub end_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityResponse {
    pub visibility: Visibility,
}

// ---------------------------------------------------------------------------
// Globes
// ---------------------------------------------------------------------------

/// An album of trips, rendered as a globe in the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Globe {
    #[serde(rename = "AlbumID", alias = "album_id", deserialize_with = "flexible_u64")]
    pub album_id: u64,
    #[serde(default, deserialize_with = "flexible_u64")]
    pub user_id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub creation_date: String,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobeWithTrips {
    pub globe: Globe,
    #[serde(default)]
    pub trips: Vec<TripWithMedia>,
}

/// Body of `POST /api/albums`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewGlobe {
    pub name: String,
    pub description: String,
    pub visibility: Visibility,
}

// ---------------------------------------------------------------------------
// Likes
// ---------------------------------------------------------------------------

/// Aggregate like count for a trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeSummary {
    #[serde(alias = "likes", alias = "likeCount", alias = "like_count", default)]
    pub count: u64,
    #[serde(alias = "isLiked", alias = "is_liked", default)]
    pub liked: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteStatus {
    #[serde(
        alias = "isFavorite",
        alias = "is_favorite",
        alias = "favourite",
        alias = "favorited",
        default
    )]
    pub favorite: bool,
}

// ---------------------------------------------------------------------------
// Identifier decoding
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Unsigned(u64),
    Signed(i64),
    Text(String),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::Unsigned(n) => n.to_string(),
            StringOrNumber::Signed(n) => n.to_string(),
            StringOrNumber::Text(s) => s,
        }
    }
}

fn flexible_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    use serde::de::Error;
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Unsigned(n) => Ok(n),
        StringOrNumber::Signed(n) => {
            u64::try_from(n).map_err(|_| D::Error::custom(format!("negative id {n}")))
        }
        StringOrNumber::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("id {s:?} is not a number"))),
    }
}

fn flexible_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    StringOrNumber::deserialize(deserializer).map(StringOrNumber::into_string)
}

fn optional_flexible_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<StringOrNumber>::deserialize(deserializer).map(|v| v.map(StringOrNumber::into_string))
}
