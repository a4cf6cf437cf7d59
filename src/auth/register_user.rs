//! Registration of new users, with an optional profile image upload.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde_json::json;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

use crate::{
    AppState, Error,
    auth::{NewUser, PasswordHash, create_user, set_auth_cookie},
    endpoints,
};

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The bcrypt cost used to hash new passwords.
    pub password_hash_cost: u32,
    /// The directory uploaded profile images are written to.
    pub upload_dir: PathBuf,
    /// The database connection for storing users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            password_hash_cost: state.password_hash_cost,
            upload_dir: state.upload_dir.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<RegistrationState> for Key {
    fn from_ref(state: &RegistrationState) -> Self {
        state.cookie_key.clone()
    }
}

/// An image file from the registration form.
#[derive(Debug, Default)]
struct ProfileImage {
    file_name: String,
    bytes: Vec<u8>,
}

/// The fields of the multipart registration form.
#[derive(Debug, Default)]
struct RegistrationForm {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    profile_image: Option<ProfileImage>,
}

async fn read_registration_form(mut multipart: Multipart) -> Result<RegistrationForm, Error> {
    let mut form = RegistrationForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| Error::MultipartError(error.body_text()))?
    {
        let Some(name) = field.name().map(ToOwned::to_owned) else {
            continue;
        };

        match name.as_str() {
            "profileImage" => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|error| Error::MultipartError(error.body_text()))?;

                // Browsers send an empty part when no file was chosen.
                if !bytes.is_empty() {
                    form.profile_image = Some(ProfileImage {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            "username" | "email" | "password" => {
                let text = field
                    .text()
                    .await
                    .map_err(|error| Error::MultipartError(error.body_text()))?;

                match name.as_str() {
                    "username" => form.username = Some(text),
                    "email" => form.email = Some(text),
                    _ => form.password = Some(text),
                }
            }
            other => tracing::debug!("Ignoring unexpected registration field \"{other}\""),
        }
    }

    Ok(form)
}

/// Pick a file name for an uploaded image that will not clash with other uploads.
///
/// The name is the upload time in milliseconds and a prefix of the content hash, keeping
/// the original extension if it looks sane.
fn profile_image_file_name(image: &ProfileImage, now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let digest = format!("{:x}", Sha256::digest(&image.bytes));
    let extension = Path::new(&image.file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .filter(|extension| {
            !extension.is_empty()
                && extension.len() <= 8
                && extension.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|extension| format!(".{}", extension.to_ascii_lowercase()))
        .unwrap_or_default();

    format!("{millis}-{}{extension}", &digest[..16])
}

async fn save_profile_image(image: &ProfileImage, upload_dir: &Path) -> Result<PathBuf, Error> {
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|error| Error::UploadError(error.to_string()))?;

    let path = upload_dir.join(profile_image_file_name(image, OffsetDateTime::now_utc()));
    tokio::fs::write(&path, &image.bytes)
        .await
        .map_err(|error| Error::UploadError(error.to_string()))?;

    Ok(path)
}

/// A route handler for registering a new user.
///
/// Expects a multipart form with the text fields `username`, `email` and `password` and an
/// optional file field `profileImage`. On success the auth cookie is set so the new user is
/// logged in straight away.
pub async fn register_user(
    State(state): State<RegistrationState>,
    jar: PrivateCookieJar,
    multipart: Multipart,
) -> Result<Response, Error> {
    let form = read_registration_form(multipart).await?;

    let non_empty = |value: Option<String>| value.filter(|value| !value.trim().is_empty());
    let (Some(username), Some(email), Some(password)) = (
        non_empty(form.username),
        non_empty(form.email),
        non_empty(form.password),
    ) else {
        return Err(Error::MissingFields("All fields are required"));
    };

    let password_hash = PasswordHash::from_raw_password(&password, state.password_hash_cost)?;

    let saved_image = match &form.profile_image {
        Some(image) => Some(save_profile_image(image, &state.upload_dir).await?),
        None => None,
    };
    let profile_image = saved_image.as_ref().and_then(|path| {
        path.file_name()
            .and_then(|file_name| file_name.to_str())
            .map(|file_name| format!("{}/{file_name}", endpoints::UPLOADS))
    });

    let result = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        create_user(
            NewUser {
                username,
                email,
                password_hash,
                profile_image,
            },
            &connection,
        )
    };

    let user = match result {
        Ok(user) => user,
        Err(error) => {
            if let Some(path) = saved_image {
                if let Err(remove_error) = tokio::fs::remove_file(&path).await {
                    tracing::warn!("Could not remove orphaned upload {path:?}: {remove_error}");
                }
            }

            return Err(error);
        }
    };

    tracing::info!("Registered user {}", user.id);

    let jar = set_auth_cookie(jar, user.id, state.cookie_duration)?;

    Ok((
        StatusCode::CREATED,
        jar,
        Json(json!({
            "message": "User registered successfully",
            "user": user,
        })),
    )
        .into_response())
}
