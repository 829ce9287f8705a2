//! Write operations: declarative mutations with cache invalidation.
//!
//! A [`Mutation`] describes a write once (method, target path, body
//! encoding, which cache prefixes it invalidates, and the notice to emit on
//! success) and is then run with per-call input. Running it returns
//! `Result`; the transport has already normalized and notified any failure,
//! so callers only decide what to do next. [`Mutation::dispatch`] is a thin
//! callback adapter over [`Mutation::run`] for fire-and-forget call sites.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::query::QueryKey;
use crate::transport::{FormField, Method, Payload, Request};

/// Where a mutation is sent: a fixed path or one derived from the input
/// (e.g. `posts/{id}` for a delete).
pub enum Target<I> {
    Path(String),
    Derive(Arc<dyn Fn(&I) -> String + Send + Sync>),
}

impl<I> Target<I> {
    fn resolve(&self, input: &I) -> String {
        match self {
            Self::Path(path) => path.clone(),
            Self::Derive(derive) => derive(input),
        }
    }
}

impl<I> Clone for Target<I> {
    fn clone(&self) -> Self {
        match self {
            Self::Path(path) => Self::Path(path.clone()),
            Self::Derive(derive) => Self::Derive(Arc::clone(derive)),
        }
    }
}

impl<I> fmt::Debug for Target<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Derive(_) => f.write_str("Derive(..)"),
        }
    }
}

/// Turns the input into a request payload.
pub type Encoder<I> = Arc<dyn Fn(&I) -> Result<Payload, ApiError> + Send + Sync>;

/// A reusable write operation against the API.
///
/// `I` is the per-call input, `O` the deserialized response. On success the
/// listed cache prefixes are invalidated in order, then the success notice
/// (if any) is emitted.
pub struct Mutation<I, O> {
    method: Method,
    target: Target<I>,
    encode: Encoder<I>,
    invalidates: Vec<QueryKey>,
    success_message: Option<String>,
    suppress_loading: bool,
    _output: PhantomData<fn() -> O>,
}

impl<I, O> Clone for Mutation<I, O> {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            target: self.target.clone(),
            encode: Arc::clone(&self.encode),
            invalidates: self.invalidates.clone(),
            success_message: self.success_message.clone(),
            suppress_loading: self.suppress_loading,
            _output: PhantomData,
        }
    }
}

impl<I, O> fmt::Debug for Mutation<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("invalidates", &self.invalidates)
            .field("success_message", &self.success_message)
            .field("suppress_loading", &self.suppress_loading)
            .finish_non_exhaustive()
    }
}

impl<I, O> Mutation<I, O> {
    fn with_encoder(method: Method, target: Target<I>, encode: Encoder<I>) -> Self {
        Self {
            method,
            target,
            encode,
            invalidates: Vec::new(),
            success_message: None,
            suppress_loading: false,
            _output: PhantomData,
        }
    }

    /// A mutation whose input is serialized as the JSON body.
    pub fn json(method: Method, path: impl Into<String>) -> Self
    where
        I: Serialize,
    {
        Self::with_encoder(
            method,
            Target::Path(path.into()),
            Arc::new(|input: &I| {
                let value = serde_json::to_value(input).map_err(|err| {
                    tracing::warn!(error = %err, "mutation body serialization failed");
                    ApiError::network(crate::error::GENERIC_MESSAGE)
                })?;
                Ok(Payload::Json(value))
            }),
        )
    }

    /// A bodyless mutation (e.g. a delete keyed only by its path).
    pub fn no_body(method: Method, path: impl Into<String>) -> Self {
        Self::with_encoder(
            method,
            Target::Path(path.into()),
            Arc::new(|_: &I| Ok(Payload::Empty)),
        )
    }

    /// A multipart mutation; `fields` maps the input to its form fields.
    pub fn multipart(
        method: Method,
        path: impl Into<String>,
        fields: impl Fn(&I) -> Vec<FormField> + Send + Sync + 'static,
    ) -> Self {
        Self::with_encoder(
            method,
            Target::Path(path.into()),
            Arc::new(move |input: &I| Ok(Payload::Multipart(fields(input)))),
        )
    }

    /// Derives the target path from the input instead of a fixed path.
    #[must_use]
    pub fn target_fn(mut self, derive: impl Fn(&I) -> String + Send + Sync + 'static) -> Self {
        self.target = Target::Derive(Arc::new(derive));
        self
    }

    /// Adds a cache prefix to invalidate after a successful run. Order is
    /// preserved across multiple calls.
    #[must_use]
    pub fn invalidates(mut self, prefix: impl Into<QueryKey>) -> Self {
        self.invalidates.push(prefix.into());
        self
    }

    /// Emits a success notice with this text after a successful run.
    #[must_use]
    pub fn on_success_notify(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }

    /// Excludes this mutation from the global busy signal.
    #[must_use]
    pub fn suppressed(mut self) -> Self {
        self.suppress_loading = true;
        self
    }
}

impl<I, O> Mutation<I, O>
where
    O: DeserializeOwned,
{
    /// Runs the mutation.
    ///
    /// Failures come back already normalized and notified by the transport.
    /// On success the invalidations fire before this returns, so a caller
    /// that awaits `run` observes the refetches already scheduled.
    pub async fn run(&self, client: &ApiClient, input: I) -> Result<O, ApiError> {
        let path = self.target.resolve(&input);
        let payload = (self.encode)(&input)?;
        let request = Request::new(self.method.clone(), path)
            .payload(payload)
            .suppress_loading(self.suppress_loading);

        let output: O = client.transport().send(request).await?;

        for prefix in &self.invalidates {
            client.queries().invalidate(prefix.clone());
        }
        if let Some(message) = &self.success_message {
            client.notifier().success(message.clone());
        }
        Ok(output)
    }

    /// Callback-style adapter over [`Mutation::run`] for call sites that
    /// route success and failure to different handlers.
    pub async fn dispatch(
        &self,
        client: &ApiClient,
        input: I,
        on_success: impl FnOnce(O),
        on_error: impl FnOnce(ApiError),
    ) {
        match self.run(client, input).await {
            Ok(output) => on_success(output),
            Err(err) => on_error(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct CommentBody {
        content: String,
        post: String,
    }

    #[test]
    fn test_fixed_target_and_json_encoding() {
        let mutation: Mutation<CommentBody, serde_json::Value> =
            Mutation::json(Method::POST, "comments")
                .invalidates("posts")
                .on_success_notify("Comment added successfully!");

        let input = CommentBody {
            content: "hi".into(),
            post: "42".into(),
        };
        assert_eq!(mutation.target.resolve(&input), "comments");
        assert_eq!(mutation.invalidates, vec![QueryKey::from("posts")]);
        assert_eq!(
            mutation.success_message.as_deref(),
            Some("Comment added successfully!")
        );

        match (mutation.encode)(&input).expect("encodes") {
            Payload::Json(value) => {
                assert_eq!(value["content"], "hi");
                assert_eq!(value["post"], "42");
            }
            other => panic!("expected json payload, got {other:?}"),
        }
    }

    #[test]
    fn test_derived_target() {
        let delete: Mutation<String, serde_json::Value> =
            Mutation::no_body(Method::DELETE, "posts")
                .target_fn(|id: &String| format!("posts/{id}"))
                .invalidates("posts")
                .invalidates("userPosts");

        let input = "abc123".to_string();
        assert_eq!(delete.target.resolve(&input), "posts/abc123");
        assert!(matches!((delete.encode)(&input).expect("encodes"), Payload::Empty));
        assert_eq!(
            delete.invalidates,
            vec![QueryKey::from("posts"), QueryKey::from("userPosts")]
        );
    }

    #[test]
    fn test_multipart_encoding() {
        struct NewPost {
            body: String,
            image: Option<Vec<u8>>,
        }

        let create: Mutation<NewPost, serde_json::Value> =
            Mutation::multipart(Method::POST, "posts", |input: &NewPost| {
                let mut fields = vec![FormField::text("body", input.body.clone())];
                if let Some(image) = &input.image {
                    fields.push(FormField::bytes("image", "upload", image.clone()));
                }
                fields
            });

        let input = NewPost {
            body: "hello".into(),
            image: Some(vec![1, 2]),
        };
        match (create.encode)(&input).expect("encodes") {
            Payload::Multipart(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].name, "body");
                assert_eq!(fields[1].name, "image");
            }
            other => panic!("expected multipart payload, got {other:?}"),
        }
    }

    #[test]
    fn test_suppression_flag() {
        let mutation: Mutation<(), serde_json::Value> =
            Mutation::no_body(Method::PUT, "users/change-password").suppressed();
        assert!(mutation.suppress_loading);
    }
}
