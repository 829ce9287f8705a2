//! Wire types for the feed API.
//!
//! Response types derive `PartialEq` so the cache's structural sharing can
//! compare refetched data against what it already holds; a deep-equal
//! response keeps the existing reference and consumers see no change.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_verified: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub image: Option<String>,
    pub user: User,
    #[serde(default)]
    pub likes: Vec<Like>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub comments_count: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// One like on a post; `user` is the liker's id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Like {
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    pub content: String,
    pub comment_creator: User,
    #[serde(default)]
    pub post: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    #[serde(default)]
    pub current_page: Option<u64>,
    #[serde(default)]
    pub number_of_pages: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
}

// ---- Response envelopes ----

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignInResponse {
    pub message: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsResponse {
    pub message: String,
    #[serde(default)]
    pub pagination_info: Option<PaginationInfo>,
    pub posts: Vec<Post>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostResponse {
    pub message: String,
    pub post: Post,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommentsResponse {
    pub message: String,
    pub comments: Vec<Comment>,
}

// ---- Request bodies ----

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpBody {
    pub name: String,
    pub email: String,
    pub password: String,
    pub re_password: String,
    pub date_of_birth: String,
    pub gender: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordBody {
    pub password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewComment {
    pub content: String,
    pub post: String,
}

/// Input for creating or updating a post: a text body plus an optional
/// image, sent as multipart form data.
#[derive(Debug, Clone)]
pub struct PostInput {
    pub body: String,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub data: Vec<u8>,
}
