//! Feed queries and post mutations.

use std::time::Duration;

use crate::error::ApiError;
use crate::mutation::Mutation;
use crate::query::{Query, QueryKey, QueryPolicy};
use crate::transport::{FormField, Method};

use super::endpoints;
use super::models::{MessageResponse, PostInput, PostResponse, PostsResponse};
use super::ApiClient;

const FEED_POLL: Duration = Duration::from_secs(3);
const FEED_RETENTION: Duration = Duration::from_secs(300);

/// Feed queries poll every few seconds while mounted and never refetch on
/// mount or focus: cached data is shown immediately and the next poll picks
/// up changes. Entries linger five minutes after the last subscriber leaves.
fn feed_policy() -> QueryPolicy {
    QueryPolicy::default()
        .stale_time(Duration::ZERO)
        .retention(FEED_RETENTION)
        .refetch_interval(FEED_POLL)
        .refetch_on_mount(false)
        .refetch_on_focus(false)
}

pub fn all_posts(client: &ApiClient) -> Query<PostsResponse> {
    client.queries().watch(
        QueryKey::from("posts"),
        feed_policy(),
        client.get_fetcher(endpoints::POSTS.to_string()),
    )
}

pub fn user_posts(client: &ApiClient, user_id: &str) -> Query<PostsResponse> {
    client.queries().watch(
        QueryKey::new(["userPosts", user_id]),
        feed_policy().enabled(!user_id.is_empty()),
        client.get_fetcher(endpoints::user_posts(user_id)),
    )
}

pub fn post(client: &ApiClient, post_id: &str) -> Query<PostResponse> {
    client.queries().watch(
        QueryKey::new(["post", post_id]),
        feed_policy().enabled(!post_id.is_empty()),
        client.get_fetcher(endpoints::post_by_id(post_id)),
    )
}

fn post_fields(input: &PostInput) -> Vec<FormField> {
    let mut fields = vec![FormField::text("body", input.body.clone())];
    if let Some(image) = &input.image {
        fields.push(FormField::bytes(
            "image",
            image.file_name.clone(),
            image.data.clone(),
        ));
    }
    fields
}

pub async fn create_post(client: &ApiClient, input: PostInput) -> Result<MessageResponse, ApiError> {
    let mutation: Mutation<PostInput, MessageResponse> =
        Mutation::multipart(Method::POST, endpoints::POSTS, post_fields)
            .suppressed()
            .invalidates("posts")
            .on_success_notify("Post created successfully!");
    mutation.run(client, input).await
}

/// Edit of an existing post.
#[derive(Debug, Clone)]
pub struct PostUpdate {
    pub id: String,
    pub input: PostInput,
}

pub async fn update_post(client: &ApiClient, update: PostUpdate) -> Result<MessageResponse, ApiError> {
    let mutation: Mutation<PostUpdate, MessageResponse> =
        Mutation::multipart(Method::PUT, endpoints::POSTS, |update: &PostUpdate| {
            post_fields(&update.input)
        })
        .target_fn(|update: &PostUpdate| endpoints::post_by_id(&update.id))
        .suppressed()
        .invalidates("posts")
        .invalidates("userPosts");
    mutation.run(client, update).await
}

pub async fn delete_post(client: &ApiClient, post_id: String) -> Result<MessageResponse, ApiError> {
    let mutation: Mutation<String, MessageResponse> = Mutation::no_body(Method::DELETE, endpoints::POSTS)
        .target_fn(|id: &String| endpoints::post_by_id(id))
        .suppressed()
        .invalidates("posts")
        .invalidates("userPosts")
        .on_success_notify("Post deleted successfully!");
    mutation.run(client, post_id).await
}

/// Toggles the signed-in user's like on a post.
pub async fn like_post(client: &ApiClient, post_id: String) -> Result<MessageResponse, ApiError> {
    let mutation: Mutation<String, MessageResponse> =
        Mutation::no_body(Method::PATCH, endpoints::POSTS)
            .target_fn(|id: &String| endpoints::post_by_id(id))
            .suppressed()
            .invalidates("posts")
            .invalidates("userPosts");
    mutation.run(client, post_id).await
}
