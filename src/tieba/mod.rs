//! Client for the remote HibiAPI tieba daemon.
//!
//! Three paged endpoints are consumed: `post_detail` (thread pages),
//! `subpost_detail` (reply pages of one post) and `user_profile`.

pub mod cdn;
pub mod content;
pub mod models;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info};

use crate::constants::DAEMON_PREFLIGHT_STATUS;
use crate::transport::{Transport, TransportError};
use models::{PostDetailResponse, SubPostDetailResponse, UserProfileResponse};

pub use content::{BlockKind, ContentBlock};
pub use models::{Page, Post, SubPost, Thread, User};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("malformed {endpoint} response")]
    Malformed {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("thread {thread_id} is inaccessible (no title in response)")]
    Inaccessible { thread_id: String },
}

#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("remote daemon not found at {remote}")]
    NotFound { remote: String },
    #[error("invalid remote daemon at {remote} (status {status})")]
    InvalidRemote { remote: String, status: StatusCode },
    #[error("remote daemon at {remote} is unreachable")]
    Unreachable {
        remote: String,
        #[source]
        source: reqwest::Error,
    },
}

/// One `post_detail` page with the thread metadata it carries.
#[derive(Debug, Clone, Default)]
pub struct PostPage {
    pub title: Option<String>,
    pub forum: Option<String>,
    pub page: Page,
}

/// Typed access to the daemon's endpoints.
#[derive(Debug, Clone)]
pub struct TiebaClient {
    transport: Transport,
    remote: String,
}

impl TiebaClient {
    #[must_use]
    pub fn new(transport: Transport, remote: &str) -> Self {
        Self {
            transport,
            remote: remote.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Check that the base URL is a live daemon.
    ///
    /// The daemon answers its bare base URL with `422 Unprocessable Entity`.
    ///
    /// # Errors
    ///
    /// Returns an error for `404`, any other status, or no response at all.
    pub async fn preflight(&self) -> Result<(), PreflightError> {
        let status = self
            .transport
            .probe(&self.remote)
            .await
            .map_err(|source| PreflightError::Unreachable {
                remote: self.remote.clone(),
                source,
            })?;

        if status.as_u16() == DAEMON_PREFLIGHT_STATUS {
            info!(remote = %self.remote, "Connected to remote daemon");
            Ok(())
        } else if status == StatusCode::NOT_FOUND {
            Err(PreflightError::NotFound {
                remote: self.remote.clone(),
            })
        } else {
            Err(PreflightError::InvalidRemote {
                remote: self.remote.clone(),
                status,
            })
        }
    }

    /// Fetch one page of a thread's post stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a
    /// `post_detail` record.
    pub async fn post_page(&self, thread_id: &str, page: u32) -> Result<PostPage, FetchError> {
        let body = self
            .transport
            .fetch(
                &self.endpoint("post_detail"),
                &[("tid", thread_id.to_string()), ("page", page.to_string())],
            )
            .await?;

        let response: PostDetailResponse =
            serde_json::from_slice(&body).map_err(|source| FetchError::Malformed {
                endpoint: "post_detail",
                source,
            })?;

        debug!(
            thread_id,
            page,
            posts = response.post_list.len(),
            "Fetched post page"
        );

        Ok(PostPage {
            title: response.title(),
            forum: response.forum_name(),
            page: response.into_page(),
        })
    }

    /// Fetch one page of the replies to a post.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a
    /// `subpost_detail` record.
    pub async fn subpost_page(
        &self,
        thread_id: &str,
        post_id: &str,
        page: u32,
    ) -> Result<Vec<SubPost>, FetchError> {
        let body = self
            .transport
            .fetch(
                &self.endpoint("subpost_detail"),
                &[
                    ("tid", thread_id.to_string()),
                    ("pid", post_id.to_string()),
                    ("page", page.to_string()),
                ],
            )
            .await?;

        let response: SubPostDetailResponse =
            serde_json::from_slice(&body).map_err(|source| FetchError::Malformed {
                endpoint: "subpost_detail",
                source,
            })?;

        Ok(response.subpost_list)
    }

    /// Look up a user profile. Any failure yields `None`.
    pub async fn user_profile(&self, user_id: &str) -> Option<User> {
        let body = match self
            .transport
            .fetch(&self.endpoint("user_profile"), &[("uid", user_id.to_string())])
            .await
        {
            Ok(body) => body,
            Err(e) => {
                debug!(user_id, "Profile lookup failed: {e}");
                return None;
            }
        };

        match serde_json::from_slice::<UserProfileResponse>(&body) {
            Ok(response) => response.user,
            Err(e) => {
                debug!(user_id, "Malformed profile response: {e}");
                None
            }
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}", self.remote)
    }
}
