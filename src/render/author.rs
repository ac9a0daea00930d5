//! Resolution of user ids to display names.

use tracing::debug;

use crate::constants::PROFILE_URL_BASE;
use crate::tieba::{TiebaClient, User};

/// A user as shown in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub portrait: Option<String>,
}

impl Author {
    /// Build from a user record; `None` if it carries no usable name.
    #[must_use]
    pub fn from_user(user: &User) -> Option<Self> {
        let name = user.display_name()?;
        Some(Self {
            name: name.to_string(),
            portrait: user.portrait.clone().filter(|p| !p.is_empty()),
        })
    }

    #[must_use]
    pub fn profile_url(&self) -> Option<String> {
        self.portrait
            .as_deref()
            .map(|portrait| format!("{PROFILE_URL_BASE}{portrait}"))
    }
}

/// Looks users up in a page's user table, then remotely.
#[derive(Debug, Clone, Copy)]
pub struct AuthorResolver<'a> {
    client: &'a TiebaClient,
}

impl<'a> AuthorResolver<'a> {
    #[must_use]
    pub fn new(client: &'a TiebaClient) -> Self {
        Self { client }
    }

    pub async fn resolve(&self, users: &[User], user_id: &str) -> Option<Author> {
        if user_id.is_empty() {
            return None;
        }

        let local = users
            .iter()
            .filter(|u| u.id.as_deref() == Some(user_id))
            .find_map(Author::from_user);
        if local.is_some() {
            return local;
        }

        debug!(user_id, "User not in page table, asking remote");
        self.client
            .user_profile(user_id)
            .await
            .as_ref()
            .and_then(Author::from_user)
    }
}
