//! Pagination engine: walks a thread's pages and reply streams in order.
//!
//! Primary pages are fetched until a page is empty or stops advancing the
//! floor counter (the daemon answers past-the-end pages with the last page
//! again). Each post's replies are fetched page by page until an empty page.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::media::{MediaResolver, ProgressSink};
use crate::output::sanitize_title;
use crate::render::{
    render_document, Author, AuthorResolver, BlockRenderer, RenderedPost, RenderedReply,
};
use crate::tieba::{FetchError, Post, TiebaClient, Thread, User};

/// Counters for one archived thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub pages: u32,
    pub posts: usize,
    pub replies: usize,
}

/// A fully rendered thread, ready to be written.
#[derive(Debug, Clone)]
pub struct ArchivedThread {
    pub thread: Thread,
    /// Sanitized title used for the document and its media directory.
    pub file_stem: String,
    pub document: String,
    pub stats: ArchiveStats,
}

/// Split off the posts of a page that advance past `max_floor`.
///
/// Returns the new posts in order and whether pagination is finished: the
/// page was empty, or a post at or below the previous maximum was reached.
#[must_use]
pub fn take_new_posts(posts: Vec<Post>, max_floor: &mut u64) -> (Vec<Post>, bool) {
    if posts.is_empty() {
        return (posts, true);
    }

    let mut fresh = Vec::with_capacity(posts.len());
    for post in posts {
        if post.floor <= *max_floor {
            return (fresh, true);
        }
        *max_floor = post.floor;
        fresh.push(post);
    }
    (fresh, false)
}

pub struct ThreadArchiver {
    client: TiebaClient,
    config: Config,
    progress: Arc<dyn ProgressSink>,
}

impl ThreadArchiver {
    #[must_use]
    pub fn new(client: TiebaClient, config: &Config, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            client,
            config: config.clone(),
            progress,
        }
    }

    /// Fetch and render one thread.
    ///
    /// # Errors
    ///
    /// Returns an error if a primary page cannot be fetched or parsed, or if
    /// the first page carries no title.
    pub async fn archive(&self, thread_id: &str) -> Result<ArchivedThread, FetchError> {
        let first = self.client.post_page(thread_id, 1).await?;
        let title = first.title.ok_or_else(|| FetchError::Inaccessible {
            thread_id: thread_id.to_string(),
        })?;
        let thread = Thread {
            id: thread_id.to_string(),
            title,
            forum: first.forum,
        };
        info!(thread_id, title = %thread.title, "Archiving thread");

        let mut file_stem = sanitize_title(&thread.title);
        if file_stem.is_empty() {
            file_stem = thread_id.to_string();
        }
        let media = MediaResolver::new(
            self.client.transport().clone(),
            self.config.media,
            &self.config.output_dir,
            &file_stem,
            self.config.overwrite_media,
            Arc::clone(&self.progress),
        );

        let mut stats = ArchiveStats::default();
        let mut rendered = Vec::new();
        let mut max_floor = 0;
        let mut page_number = 1;
        let mut page = first.page;

        loop {
            stats.pages = page_number;
            let (posts, finished) = take_new_posts(std::mem::take(&mut page.posts), &mut max_floor);

            for post in &posts {
                info!(thread_id, floor = post.floor, page = page_number, "Reached floor");
                let post = self.render_post(thread_id, post, &page.users, &media).await;
                stats.replies += post.replies.len();
                rendered.push(post);
            }
            stats.posts += posts.len();

            if finished {
                break;
            }
            page_number += 1;
            page = self.client.post_page(thread_id, page_number).await?.page;
        }

        info!(
            thread_id,
            pages = stats.pages,
            posts = stats.posts,
            replies = stats.replies,
            "Thread fetched"
        );

        Ok(ArchivedThread {
            document: render_document(&thread, &rendered).into_string(),
            thread,
            file_stem,
            stats,
        })
    }

    async fn render_post(
        &self,
        thread_id: &str,
        post: &Post,
        users: &[User],
        media: &MediaResolver,
    ) -> RenderedPost {
        let renderer = BlockRenderer::new(media, &self.client, users);
        let body = renderer.render(&post.content, false).await;

        let author = match post.author_id.as_deref() {
            Some(author_id) => AuthorResolver::new(&self.client).resolve(users, author_id).await,
            None => None,
        };
        if author.is_none() {
            debug!(thread_id, floor = post.floor, "Post author unresolved");
        }

        let replies = match (self.config.fetch_subposts, post.id.as_deref()) {
            (true, Some(post_id)) => self.render_replies(thread_id, post_id, &renderer).await,
            _ => Vec::new(),
        };

        RenderedPost {
            id: post.id.clone(),
            floor: post.floor,
            time: post.time,
            author,
            body,
            replies,
        }
    }

    /// Walk a post's reply pages until one comes back empty.
    ///
    /// A page that cannot be fetched ends the walk like an empty page.
    async fn render_replies(
        &self,
        thread_id: &str,
        post_id: &str,
        renderer: &BlockRenderer<'_>,
    ) -> Vec<RenderedReply> {
        let mut replies = Vec::new();
        let mut page_number = 1;

        loop {
            let subposts = match self.client.subpost_page(thread_id, post_id, page_number).await {
                Ok(subposts) => subposts,
                Err(e) => {
                    warn!(thread_id, post_id, page = page_number, "Reply page unavailable: {e}");
                    Vec::new()
                }
            };
            if subposts.is_empty() {
                break;
            }

            for subpost in &subposts {
                replies.push(RenderedReply {
                    time: subpost.time,
                    author: subpost.author.as_ref().and_then(Author::from_user),
                    body: renderer.render(&subpost.content, true).await,
                });
            }
            debug!(
                thread_id,
                post_id,
                page = page_number,
                total = replies.len(),
                "Fetched reply page"
            );
            page_number += 1;
        }

        replies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posts(floors: &[u64]) -> Vec<Post> {
        floors
            .iter()
            .map(|&floor| Post {
                id: Some(format!("p{floor}")),
                floor,
                author_id: None,
                time: None,
                content: Vec::new(),
            })
            .collect()
    }

    fn floors(posts: &[Post]) -> Vec<u64> {
        posts.iter().map(|p| p.floor).collect()
    }

    #[test]
    fn test_take_new_posts_advances() {
        let mut max_floor = 0;
        let (fresh, finished) = take_new_posts(posts(&[1, 2, 3]), &mut max_floor);
        assert_eq!(floors(&fresh), vec![1, 2, 3]);
        assert!(!finished);
        assert_eq!(max_floor, 3);
    }

    #[test]
    fn test_take_new_posts_stops_on_repeated_page() {
        let mut max_floor = 3;
        let (fresh, finished) = take_new_posts(posts(&[1, 2, 3]), &mut max_floor);
        assert!(fresh.is_empty());
        assert!(finished);
        assert_eq!(max_floor, 3);
    }

    #[test]
    fn test_take_new_posts_stops_mid_page() {
        let mut max_floor = 3;
        let (fresh, finished) = take_new_posts(posts(&[4, 5, 2, 6]), &mut max_floor);
        assert_eq!(floors(&fresh), vec![4, 5]);
        assert!(finished);
        assert_eq!(max_floor, 5);
    }

    #[test]
    fn test_take_new_posts_empty_page_finishes() {
        let mut max_floor = 7;
        let (fresh, finished) = take_new_posts(Vec::new(), &mut max_floor);
        assert!(fresh.is_empty());
        assert!(finished);
    }

    #[test]
    fn test_pages_ingest_posts_in_floor_order() {
        let pages = [posts(&[1, 2]), posts(&[3, 4]), posts(&[5]), posts(&[5])];
        let mut max_floor = 0;
        let mut ingested = Vec::new();
        for page in pages {
            let (fresh, finished) = take_new_posts(page, &mut max_floor);
            ingested.extend(floors(&fresh));
            if finished {
                break;
            }
        }
        assert_eq!(ingested, vec![1, 2, 3, 4, 5]);
    }
}
