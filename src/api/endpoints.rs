//! API route table. Paths are relative to the configured base URL.

pub const SIGN_IN: &str = "users/signin";
pub const SIGN_UP: &str = "users/signup";

pub const PROFILE: &str = "users/profile-data";
pub const UPLOAD_PHOTO: &str = "users/upload-photo";
pub const CHANGE_PASSWORD: &str = "users/change-password";

pub const POSTS: &str = "posts";
pub const COMMENTS: &str = "comments";

pub fn post_by_id(id: &str) -> String {
    format!("{POSTS}/{id}")
}

pub fn user_posts(user_id: &str) -> String {
    format!("users/{user_id}/posts")
}

pub fn post_comments(post_id: &str) -> String {
    format!("{POSTS}/{post_id}/comments")
}

pub fn comment_by_id(id: &str) -> String {
    format!("{COMMENTS}/{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_paths() {
        assert_eq!(post_by_id("42"), "posts/42");
        assert_eq!(user_posts("7"), "users/7/posts");
        assert_eq!(post_comments("42"), "posts/42/comments");
        assert_eq!(comment_by_id("9"), "comments/9");
    }
}
