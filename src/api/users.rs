//! Auth and profile operations.

use std::time::Duration;

use crate::error::ApiError;
use crate::mutation::Mutation;
use crate::query::{Query, QueryKey, QueryPolicy};
use crate::transport::{FormField, Method};

use super::endpoints;
use super::models::{
    ChangePasswordBody, Credentials, ImageUpload, MessageResponse, ProfileResponse,
    SignInResponse, SignUpBody,
};
use super::ApiClient;

const PROFILE_POLL: Duration = Duration::from_secs(3);

/// The signed-in user's profile, polled while mounted so edits made
/// elsewhere (photo upload, password change) show up without a manual
/// refresh. Structural sharing keeps unchanged polls from producing new
/// snapshots with new references.
pub fn profile(client: &ApiClient) -> Query<ProfileResponse> {
    client.queries().watch(
        QueryKey::from("profile"),
        QueryPolicy::default().refetch_interval(PROFILE_POLL),
        client.get_fetcher(endpoints::PROFILE.to_string()),
    )
}

/// Signs in and stores the returned token for subsequent requests.
pub async fn sign_in(
    client: &ApiClient,
    credentials: Credentials,
) -> Result<SignInResponse, ApiError> {
    let mutation: Mutation<Credentials, SignInResponse> =
        Mutation::json(Method::POST, endpoints::SIGN_IN);
    let response = mutation.run(client, credentials).await?;
    client.tokens().set(&response.token);
    Ok(response)
}

pub async fn sign_up(client: &ApiClient, body: SignUpBody) -> Result<MessageResponse, ApiError> {
    let mutation: Mutation<SignUpBody, MessageResponse> =
        Mutation::json(Method::POST, endpoints::SIGN_UP);
    mutation.run(client, body).await
}

/// Uploads a new profile photo. Runs in the background (no busy signal) and
/// invalidates the profile so the mounted query refetches it.
pub async fn upload_photo(
    client: &ApiClient,
    image: ImageUpload,
) -> Result<MessageResponse, ApiError> {
    let mutation: Mutation<ImageUpload, MessageResponse> =
        Mutation::multipart(Method::PUT, endpoints::UPLOAD_PHOTO, |image: &ImageUpload| {
            vec![FormField::bytes(
                "photo",
                image.file_name.clone(),
                image.data.clone(),
            )]
        })
        .suppressed()
        .invalidates("profile");
    mutation.run(client, image).await
}

/// Changes the password. Deliberately not suppressed: the caller is waiting
/// on this, so the busy signal shows.
pub async fn change_password(
    client: &ApiClient,
    body: ChangePasswordBody,
) -> Result<MessageResponse, ApiError> {
    let mutation: Mutation<ChangePasswordBody, MessageResponse> =
        Mutation::json(Method::PATCH, endpoints::CHANGE_PASSWORD)
            .on_success_notify("Password changed successfully!");
    mutation.run(client, body).await
}
