//! Wire and domain types for the remote tieba API.
//!
//! The daemon is inconsistent about numbers: ids, floors and timestamps may
//! arrive as JSON numbers or as strings. The `flexible_*` helpers accept both.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::content::ContentBlock;
use crate::constants::{FORUM_URL_BASE, THREAD_URL_BASE};

/// A discussion thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub id: String,
    pub title: String,
    pub forum: Option<String>,
}

impl Thread {
    #[must_use]
    pub fn permalink(&self) -> String {
        format!("{THREAD_URL_BASE}{}", self.id)
    }

    #[must_use]
    pub fn forum_link(&self) -> Option<String> {
        self.forum
            .as_deref()
            .map(|name| format!("{FORUM_URL_BASE}{}", urlencoding::encode(name)))
    }
}

/// A user record from a page's `user_list` or a profile lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct User {
    #[serde(default, deserialize_with = "flexible_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    pub name_show: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    pub portrait: Option<String>,
}

impl User {
    /// `name_show`, falling back to `name`.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.name_show
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.name.as_deref().filter(|s| !s.is_empty()))
    }
}

/// A top-level post.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Post {
    #[serde(default, deserialize_with = "flexible_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "required_u64")]
    pub floor: u64,
    #[serde(default, deserialize_with = "flexible_string")]
    pub author_id: Option<String>,
    #[serde(default, deserialize_with = "flexible_i64")]
    pub time: Option<i64>,
    #[serde(default, deserialize_with = "block_list")]
    pub content: Vec<ContentBlock>,
}

/// A reply attached to a post.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubPost {
    #[serde(default, deserialize_with = "flexible_i64")]
    pub time: Option<i64>,
    #[serde(default, deserialize_with = "lenient_user")]
    pub author: Option<User>,
    #[serde(default, deserialize_with = "block_list")]
    pub content: Vec<ContentBlock>,
}

/// One page of the primary post stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub posts: Vec<Post>,
    pub users: Vec<User>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ThreadInfo {
    #[serde(default, deserialize_with = "flexible_string")]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ThreadSection {
    #[serde(default)]
    pub thread_info: Option<ThreadInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ForumSection {
    #[serde(default, deserialize_with = "flexible_string")]
    pub name: Option<String>,
}

/// `post_detail` response body.
#[derive(Debug, Deserialize)]
pub(crate) struct PostDetailResponse {
    #[serde(default)]
    pub thread: Option<ThreadSection>,
    #[serde(default)]
    pub forum: Option<ForumSection>,
    pub post_list: Vec<Post>,
    #[serde(default, deserialize_with = "lenient_users")]
    pub user_list: Vec<User>,
}

impl PostDetailResponse {
    pub fn title(&self) -> Option<String> {
        self.thread
            .as_ref()
            .and_then(|t| t.thread_info.as_ref())
            .and_then(|info| info.title.clone())
            .filter(|t| !t.is_empty())
    }

    pub fn forum_name(&self) -> Option<String> {
        self.forum
            .as_ref()
            .and_then(|f| f.name.clone())
            .filter(|n| !n.is_empty())
    }

    pub fn into_page(self) -> Page {
        Page {
            posts: self.post_list,
            users: self.user_list,
        }
    }
}

/// `subpost_detail` response body.
#[derive(Debug, Deserialize)]
pub(crate) struct SubPostDetailResponse {
    pub subpost_list: Vec<SubPost>,
}

/// `user_profile` response body.
#[derive(Debug, Deserialize)]
pub(crate) struct UserProfileResponse {
    #[serde(default, deserialize_with = "lenient_user")]
    pub user: Option<User>,
}

pub(crate) fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Accept a string or a number; anything else is treated as absent.
pub(crate) fn flexible_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn block_list<'de, D>(deserializer: D) -> Result<Vec<ContentBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ContentBlock>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A user record, or `None` if the value is not one.
fn lenient_user<'de, D>(deserializer: D) -> Result<Option<User>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(|v| User::deserialize(v).ok()))
}

/// Every entry that parses as a user; anything else is skipped.
fn lenient_users<'de, D>(deserializer: D) -> Result<Vec<User>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(entries
        .into_iter()
        .filter_map(|v| User::deserialize(v).ok())
        .collect())
}

fn flexible_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn required_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom(format!("invalid floor {n}"))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid floor '{s}'"))),
        other => Err(serde::de::Error::custom(format!("invalid floor {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_display_name_prefers_name_show() {
        let user = User {
            name: Some("raw".to_string()),
            name_show: Some("shown".to_string()),
            ..User::default()
        };
        assert_eq!(user.display_name(), Some("shown"));

        let user = User {
            name: Some("raw".to_string()),
            name_show: Some(String::new()),
            ..User::default()
        };
        assert_eq!(user.display_name(), Some("raw"));
        assert_eq!(User::default().display_name(), None);
    }

    #[test]
    fn test_post_accepts_string_and_number_fields() {
        let post: Post = serde_json::from_value(json!({
            "id": 123456789,
            "floor": "3",
            "author_id": "42",
            "time": "1600000000",
            "content": [{"type": "0", "text": "hi"}]
        }))
        .unwrap();
        assert_eq!(post.id.as_deref(), Some("123456789"));
        assert_eq!(post.floor, 3);
        assert_eq!(post.time, Some(1_600_000_000));
        assert_eq!(post.content.len(), 1);
    }

    #[test]
    fn test_post_without_floor_is_rejected() {
        let result: Result<Post, _> = serde_json::from_value(json!({"id": "1"}));
        assert!(result.is_err());
        let result: Result<Post, _> = serde_json::from_value(json!({"floor": "abc"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_post_detail_response() {
        let body: PostDetailResponse = serde_json::from_value(json!({
            "thread": {"thread_info": {"title": "A thread"}},
            "forum": {"name": "rust"},
            "post_list": [],
            "user_list": [{"id": 42, "name": "n", "portrait": "p"}]
        }))
        .unwrap();
        assert_eq!(body.title().as_deref(), Some("A thread"));
        assert_eq!(body.forum_name().as_deref(), Some("rust"));
        let page = body.into_page();
        assert!(page.posts.is_empty());
        assert_eq!(page.users[0].id.as_deref(), Some("42"));
        assert_eq!(page.users[0].portrait.as_deref(), Some("p"));
    }

    #[test]
    fn test_post_detail_requires_post_list() {
        let result: Result<PostDetailResponse, _> =
            serde_json::from_value(json!({"thread": {"thread_info": {"title": "x"}}}));
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_user_entries_are_skipped() {
        let body: PostDetailResponse = serde_json::from_value(json!({
            "post_list": [],
            "user_list": ["junk", 7, null, {"id": 42, "name": "kept"}]
        }))
        .unwrap();
        let page = body.into_page();
        assert_eq!(page.users.len(), 1);
        assert_eq!(page.users[0].name.as_deref(), Some("kept"));

        let body: PostDetailResponse =
            serde_json::from_value(json!({"post_list": [], "user_list": null})).unwrap();
        assert!(body.user_list.is_empty());
    }

    #[test]
    fn test_reply_with_bad_author_is_kept() {
        let body: SubPostDetailResponse = serde_json::from_value(json!({
            "subpost_list": [
                {"time": 1, "author": "someone", "content": [{"type": "0", "text": "a"}]},
                {"time": 2, "author": {"name": "b"}, "content": []}
            ]
        }))
        .unwrap();
        assert_eq!(body.subpost_list.len(), 2);
        assert_eq!(body.subpost_list[0].author, None);
        assert_eq!(body.subpost_list[0].content.len(), 1);
        assert_eq!(
            body.subpost_list[1].author.as_ref().and_then(|u| u.name.as_deref()),
            Some("b")
        );
    }

    #[test]
    fn test_profile_with_bad_user_is_none() {
        let body: UserProfileResponse = serde_json::from_value(json!({"user": "gone"})).unwrap();
        assert_eq!(body.user, None);
    }

    #[test]
    fn test_thread_links() {
        let thread = Thread {
            id: "7000000000".to_string(),
            title: "t".to_string(),
            forum: Some("原神".to_string()),
        };
        assert_eq!(thread.permalink(), "https://tieba.baidu.com/p/7000000000");
        assert_eq!(
            thread.forum_link().as_deref(),
            Some("https://tieba.baidu.com/f?kw=%E5%8E%9F%E7%A5%9E")
        );
    }
}
