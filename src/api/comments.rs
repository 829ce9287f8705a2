//! Comment queries and mutations.
//!
//! Comment writes invalidate the post feeds rather than a comments key:
//! comments are embedded in the post payloads, so the feeds are what must
//! refetch.

use serde::Serialize;

use crate::error::ApiError;
use crate::mutation::Mutation;
use crate::query::{Query, QueryKey, QueryPolicy};
use crate::transport::Method;

use super::endpoints;
use super::models::{CommentsResponse, MessageResponse, NewComment};
use super::ApiClient;

/// Comments of one post, fetched standalone (the feeds embed them too).
pub fn post_comments(client: &ApiClient, post_id: &str) -> Query<CommentsResponse> {
    client.queries().watch(
        QueryKey::new(["comments", post_id]),
        QueryPolicy::default().enabled(!post_id.is_empty()),
        client.get_fetcher(endpoints::post_comments(post_id)),
    )
}

pub async fn create_comment(
    client: &ApiClient,
    comment: NewComment,
) -> Result<MessageResponse, ApiError> {
    let mutation: Mutation<NewComment, MessageResponse> =
        Mutation::json(Method::POST, endpoints::COMMENTS)
            .suppressed()
            .invalidates("posts")
            .invalidates("userPosts")
            .on_success_notify("Comment added successfully!");
    mutation.run(client, comment).await
}

/// Edit of an existing comment. Only the content is sent; the id picks the
/// target path.
#[derive(Debug, Clone, Serialize)]
pub struct CommentUpdate {
    #[serde(skip)]
    pub id: String,
    pub content: String,
}

pub async fn update_comment(
    client: &ApiClient,
    update: CommentUpdate,
) -> Result<MessageResponse, ApiError> {
    let mutation: Mutation<CommentUpdate, MessageResponse> =
        Mutation::json(Method::PUT, endpoints::COMMENTS)
            .target_fn(|update: &CommentUpdate| endpoints::comment_by_id(&update.id))
            .invalidates("posts")
            .invalidates("userPosts")
            .on_success_notify("Comment updated successfully!");
    mutation.run(client, update).await
}

pub async fn delete_comment(
    client: &ApiClient,
    comment_id: String,
) -> Result<MessageResponse, ApiError> {
    let mutation: Mutation<String, MessageResponse> =
        Mutation::no_body(Method::DELETE, endpoints::COMMENTS)
            .target_fn(|id: &String| endpoints::comment_by_id(id))
            .suppressed()
            .invalidates("posts")
            .invalidates("userPosts")
            .on_success_notify("Comment deleted successfully!");
    mutation.run(client, comment_id).await
}
