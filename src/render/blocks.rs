//! Rendering of content block sequences into markup.

use maud::{html, Markup};
use tracing::{debug, warn};

use super::author::AuthorResolver;
use super::emoticon::emoticon_url;
use crate::media::{MediaCategory, MediaReference, MediaRequest, MediaResolver};
use crate::tieba::content::{ImageBlock, StickerBlock, VideoBlock};
use crate::tieba::{BlockKind, ContentBlock, TiebaClient, User};

/// Caption under embedded videos.
const VIDEO_CAPTION: &str = "贴吧视频";

/// Whether a line break goes before `current`.
///
/// Replies are rendered inline and never get implicit breaks.
#[must_use]
pub fn needs_break(previous: Option<BlockKind>, current: BlockKind, reply: bool) -> bool {
    if reply {
        return false;
    }
    let Some(previous) = previous else {
        return false;
    };
    (previous == BlockKind::PlainText && current == BlockKind::PlainText)
        || previous.is_standalone_media()
        || current.is_standalone_media()
}

/// Renders the blocks of one post or reply.
#[derive(Debug, Clone, Copy)]
pub struct BlockRenderer<'a> {
    media: &'a MediaResolver,
    authors: AuthorResolver<'a>,
    /// User table of the page the content came from.
    users: &'a [User],
}

impl<'a> BlockRenderer<'a> {
    #[must_use]
    pub fn new(media: &'a MediaResolver, client: &'a TiebaClient, users: &'a [User]) -> Self {
        Self {
            media,
            authors: AuthorResolver::new(client),
            users,
        }
    }

    /// Render a block sequence in order.
    pub async fn render(&self, blocks: &[ContentBlock], reply: bool) -> Markup {
        let mut fragments = Vec::with_capacity(blocks.len());
        let mut previous = None;

        for block in blocks {
            let kind = block.kind();
            if needs_break(previous, kind, reply) {
                fragments.push(html! { br; });
            }
            fragments.push(self.render_block(block).await);
            previous = Some(kind);
        }

        html! {
            @for fragment in &fragments {
                (fragment)
            }
        }
    }

    async fn render_block(&self, block: &ContentBlock) -> Markup {
        match block {
            ContentBlock::PlainText { text } => render_text(text),
            ContentBlock::Link { text, link } | ContentBlock::Topic { text, link } => html! {
                a href=(link) { (text) }
            },
            ContentBlock::Number { text } => html! { (text) },
            ContentBlock::LineBreak => html! { br; },
            ContentBlock::UsernameRef { text, uid } => self.render_username(text, uid.as_deref()).await,
            ContentBlock::Emoticon { code, alt } => self.render_emoticon(code, alt.as_deref()).await,
            ContentBlock::Image(image) | ContentBlock::Graffiti(image) => {
                self.render_image(image).await
            }
            ContentBlock::Video(video) => self.render_video(video).await,
            ContentBlock::BigEmoticon(sticker) | ContentBlock::EmoticonGraph(sticker) => {
                self.render_sticker(sticker).await
            }
            ContentBlock::Unknown { code, raw } => {
                warn!(code = ?code, "Unknown content block: {raw}");
                html! {
                    div class="unknown-block" {
                        code { (raw.to_string()) }
                    }
                }
            }
        }
    }

    async fn render_username(&self, text: &str, uid: Option<&str>) -> Markup {
        let author = match uid {
            Some(uid) => self.authors.resolve(self.users, uid).await,
            None => None,
        };
        match author {
            Some(author) => html! {
                a class="usr" href=[author.profile_url()] { (author.name) }
            },
            None => html! { (text) },
        }
    }

    async fn render_emoticon(&self, code: &str, alt: Option<&str>) -> Markup {
        let Some(src) = emoticon_url(code) else {
            debug!(code, "No emoticon rule matched");
            return html! {};
        };
        let src = self
            .resolve(MediaRequest::new(&src, MediaCategory::Emoticon, "image/png"))
            .await;
        html! {
            img class="BDE_Smiley" pic_type="1" width="30" height="30" src=(src.as_str()) alt=[alt];
        }
    }

    async fn render_image(&self, image: &ImageBlock) -> Markup {
        let Some(src) = image.source() else {
            debug!("Image block without a source");
            return html! {};
        };
        let (width, height) = image.dimensions().unzip();
        let src = self
            .resolve(
                MediaRequest::new(&src, MediaCategory::Image, "image/jpeg")
                    .with_size_hint(image.size),
            )
            .await;
        html! {
            img class="BDE_Image" pic_type="0" width=[width] height=[height] src=(src.as_str());
        }
    }

    async fn render_video(&self, video: &VideoBlock) -> Markup {
        let Some(link) = video.link.as_deref() else {
            return html! {
                a href=(video.text) { (video.text) }
            };
        };

        let poster = match video.poster.as_deref() {
            Some(poster) => Some(
                self.resolve(MediaRequest::new(poster, MediaCategory::Poster, "image/jpeg"))
                    .await,
            ),
            None => None,
        };
        let src = self
            .resolve(MediaRequest::new(link, MediaCategory::Video, "video/mp4"))
            .await;

        html! {
            video width=[video.width.as_deref()] height=[video.height.as_deref()]
                poster=[poster.as_ref().map(MediaReference::as_str)] src=(src.as_str()) controls {}
            br;
            a href=(video.text) { (VIDEO_CAPTION) }
        }
    }

    async fn render_sticker(&self, sticker: &StickerBlock) -> Markup {
        let Some((src, animated)) = sticker.source() else {
            debug!("Sticker block without a source");
            return html! {};
        };
        let fallback = if animated { "image/gif" } else { "image/png" };
        let src = self
            .resolve(MediaRequest::new(&src, MediaCategory::BigEmoticon, fallback))
            .await;
        html! {
            img class="BDE_Smiley" pic_type="0" width=[sticker.width.as_deref()]
                height=[sticker.height.as_deref()] src=(src.as_str());
        }
    }

    async fn resolve(&self, request: MediaRequest<'_>) -> MediaReference {
        self.media.resolve(request).await
    }
}

/// Text with embedded newlines turned into `<br>`.
fn render_text(text: &str) -> Markup {
    html! {
        @for (i, line) in text.split('\n').enumerate() {
            @if i > 0 {
                br;
            }
            (line)
        }
    }
}
