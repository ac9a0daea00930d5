//! Final HTML document for one thread.

use chrono::{DateTime, Local};
use maud::{html, Markup, PreEscaped, DOCTYPE};

use super::author::Author;
use crate::tieba::Thread;

/// Shows or hides a post's reply container.
const TOGGLE_SCRIPT: &str = r"function toggleLzl(postId) {
  var x = document.getElementById('lzl' + postId);
  x.style.display = x.style.display === 'none' ? 'block' : 'none';
}";

const STYLE: &str = r".lzl { border-style: solid; border-width: thin; border-color: #000000; }
.usr { text-decoration: none; color: #000000; }
.unknown-block { border: thin dashed #999999; }";

/// Label of the reply toggle button.
const TOGGLE_LABEL: &str = "收起回复";

/// Shown when a post's author cannot be resolved.
const UNKNOWN_AUTHOR: &str = "(unknown)";

/// A rendered top-level post.
#[derive(Debug, Clone)]
pub struct RenderedPost {
    pub id: Option<String>,
    pub floor: u64,
    pub time: Option<i64>,
    pub author: Option<Author>,
    pub body: Markup,
    pub replies: Vec<RenderedReply>,
}

#[derive(Debug, Clone)]
pub struct RenderedReply {
    pub time: Option<i64>,
    pub author: Option<Author>,
    pub body: Markup,
}

/// Format an epoch timestamp in local time. Missing times render as the epoch.
#[must_use]
pub fn format_time(epoch: Option<i64>) -> String {
    DateTime::from_timestamp(epoch.unwrap_or(0), 0)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

fn author_link(author: Option<&Author>) -> Markup {
    match author {
        Some(author) => html! {
            b { a class="usr" href=[author.profile_url()] { (author.name) } }
        },
        None => html! { b { (UNKNOWN_AUTHOR) } },
    }
}

fn render_post(post: &RenderedPost) -> Markup {
    html! {
        div class="post" {
            div {
                div {
                    (format_time(post.time)) " #" (post.floor) ": "
                    (author_link(post.author.as_ref()))
                }
                div { (post.body) }
            }
            @if let (Some(id), false) = (post.id.as_deref(), post.replies.is_empty()) {
                button onclick=(format!("toggleLzl('{id}')")) { (TOGGLE_LABEL) }
                div id=(format!("lzl{id}")) class="lzl" {
                    @for reply in &post.replies {
                        div {
                            (format_time(reply.time)) " "
                            (author_link(reply.author.as_ref()))
                            ": " (reply.body)
                        }
                    }
                }
            }
            hr;
        }
    }
}

/// Assemble the complete document.
#[must_use]
pub fn render_document(thread: &Thread, posts: &[RenderedPost]) -> Markup {
    let permalink = thread.permalink();
    html! {
        (DOCTYPE)
        html lang="zh" {
            head {
                title { (thread.title) }
                meta charset="UTF-8";
                script { (PreEscaped(TOGGLE_SCRIPT)) }
                style { (PreEscaped(STYLE)) }
            }
            body {
                h1 { (thread.title) }
                div { a href=(permalink) { (permalink) } }
                @if let (Some(forum), Some(link)) = (thread.forum.as_deref(), thread.forum_link()) {
                    div { a href=(link) { (forum) "吧" } }
                }
                hr;
                @for post in posts {
                    (render_post(post))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread() -> Thread {
        Thread {
            id: "123".to_string(),
            title: "A <title>".to_string(),
            forum: Some("rust".to_string()),
        }
    }

    fn post(floor: u64, replies: Vec<RenderedReply>) -> RenderedPost {
        RenderedPost {
            id: Some(format!("p{floor}")),
            floor,
            time: Some(0),
            author: Some(Author {
                name: "alice".to_string(),
                portrait: Some("tb.1.a".to_string()),
            }),
            body: html! { "body " (floor) },
            replies,
        }
    }

    #[test]
    fn test_document_header() {
        let html = render_document(&thread(), &[]).into_string();
        assert!(html.starts_with("<!DOCTYPE html><html lang=\"zh\">"));
        assert!(html.contains("<title>A &lt;title&gt;</title>"));
        assert!(html.contains("<a href=\"https://tieba.baidu.com/p/123\">"));
        assert!(html.contains("<a href=\"https://tieba.baidu.com/f?kw=rust\">rust吧</a>"));
        assert!(html.contains("function toggleLzl"));
    }

    #[test]
    fn test_posts_in_order_with_author_links() {
        let html = render_document(&thread(), &[post(1, vec![]), post(2, vec![])]).into_string();
        let first = html.find("#1: ").unwrap();
        let second = html.find("#2: ").unwrap();
        assert!(first < second);
        assert!(html.contains(
            "<b><a class=\"usr\" href=\"https://tieba.baidu.com/home/main?id=tb.1.a\">alice</a></b>"
        ));
        assert!(!html.contains("class=\"lzl\""));
    }

    #[test]
    fn test_replies_container() {
        let reply = RenderedReply {
            time: None,
            author: None,
            body: html! { "thanks" },
        };
        let html = render_document(&thread(), &[post(3, vec![reply])]).into_string();
        assert!(html.contains("<button onclick=\"toggleLzl('p3')\">"));
        assert!(html.contains("<div id=\"lzlp3\" class=\"lzl\">"));
        assert!(html.contains("<b>(unknown)</b>: thanks"));
    }

    #[test]
    fn test_format_time_shape() {
        let formatted = format_time(Some(1_600_000_000));
        assert_eq!(formatted.len(), "2020-09-13 12:26".len());
        assert_eq!(&formatted[4..5], "-");
        assert_eq!(&formatted[10..11], " ");
    }
}
