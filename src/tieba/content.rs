//! Content blocks of posts and replies.
//!
//! The wire format tags each block with a numeric `type` code and a loose
//! bag of optional fields. Parsing never fails: anything that cannot be
//! understood becomes [`ContentBlock::Unknown`] carrying the raw value.

use serde::Deserialize;
use serde_json::Value;

use super::cdn::first_unwrapped;
use super::models::{flexible_string, non_empty};

/// Adjacency class of a block, used for line-break decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    PlainText,
    Link,
    Emoticon,
    Image,
    UsernameRef,
    Video,
    LineBreak,
    Number,
    BigEmoticon,
    Graffiti,
    Topic,
    EmoticonGraph,
    Unknown,
}

impl BlockKind {
    /// Kinds that always sit on a line of their own.
    #[must_use]
    pub fn is_standalone_media(self) -> bool {
        matches!(self, Self::Image | Self::Video | Self::BigEmoticon)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    PlainText {
        text: String,
    },
    Link {
        text: String,
        link: String,
    },
    Emoticon {
        code: String,
        alt: Option<String>,
    },
    Image(ImageBlock),
    UsernameRef {
        text: String,
        uid: Option<String>,
    },
    Video(VideoBlock),
    LineBreak,
    Number {
        text: String,
    },
    BigEmoticon(StickerBlock),
    Graffiti(ImageBlock),
    Topic {
        text: String,
        link: String,
    },
    EmoticonGraph(StickerBlock),
    Unknown {
        code: Option<String>,
        raw: Value,
    },
}

/// Picture-like block: a posted image or a graffiti drawing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageBlock {
    pub graffiti_url: Option<String>,
    pub origin_src: Option<String>,
    pub cdn_src: Option<String>,
    pub cdn_src_active: Option<String>,
    pub cdn_src_archive: Option<String>,
    pub big_cdn_src: Option<String>,
    /// `"<width>,<height>"`
    pub bsize: Option<String>,
    /// File size in bytes, as reported upstream.
    pub size: Option<u64>,
}

impl ImageBlock {
    /// Best source URI, in priority order.
    #[must_use]
    pub fn source(&self) -> Option<String> {
        self.graffiti_url
            .clone()
            .or_else(|| self.origin_src.clone())
            .or_else(|| {
                first_unwrapped([
                    self.cdn_src.as_deref(),
                    self.cdn_src_active.as_deref(),
                    self.cdn_src_archive.as_deref(),
                    self.big_cdn_src.as_deref(),
                ])
            })
    }

    /// Width and height from `bsize`, if present.
    #[must_use]
    pub fn dimensions(&self) -> Option<(String, String)> {
        let bsize = self.bsize.as_deref()?;
        let (width, height) = bsize.split_once(',')?;
        Some((width.trim().to_string(), height.trim().to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoBlock {
    pub text: String,
    /// Playable video URL.
    pub link: Option<String>,
    /// Poster image URL.
    pub poster: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
}

/// Large emoticon: an animated and/or a static rendition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StickerBlock {
    pub dynamic: Option<String>,
    pub static_src: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
}

impl StickerBlock {
    /// Source URI and whether it is the animated one.
    #[must_use]
    pub fn source(&self) -> Option<(String, bool)> {
        self.dynamic
            .clone()
            .map(|src| (src, true))
            .or_else(|| self.static_src.clone().map(|src| (src, false)))
    }
}

impl ContentBlock {
    #[must_use]
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::PlainText { .. } => BlockKind::PlainText,
            Self::Link { .. } => BlockKind::Link,
            Self::Emoticon { .. } => BlockKind::Emoticon,
            Self::Image(_) => BlockKind::Image,
            Self::UsernameRef { .. } => BlockKind::UsernameRef,
            Self::Video(_) => BlockKind::Video,
            Self::LineBreak => BlockKind::LineBreak,
            Self::Number { .. } => BlockKind::Number,
            Self::BigEmoticon(_) => BlockKind::BigEmoticon,
            Self::Graffiti(_) => BlockKind::Graffiti,
            Self::Topic { .. } => BlockKind::Topic,
            Self::EmoticonGraph(_) => BlockKind::EmoticonGraph,
            Self::Unknown { .. } => BlockKind::Unknown,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GraffitiInfo {
    #[serde(default, deserialize_with = "flexible_string")]
    url: Option<String>,
}

/// Every field any block kind may carry.
#[derive(Debug, Default, Deserialize)]
struct RawBlock {
    #[serde(default, rename = "type", deserialize_with = "flexible_string")]
    code: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    text: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    link: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    c: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    uid: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    src: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    origin_src: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    cdn_src: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    cdn_src_active: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    cdn_src_archive: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    big_cdn_src: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    bsize: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    size: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    width: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    height: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    dynamic: Option<String>,
    #[serde(default, rename = "static", deserialize_with = "flexible_string")]
    static_src: Option<String>,
    #[serde(default)]
    graffiti_info: Option<GraffitiInfo>,
}

impl RawBlock {
    fn text(&self) -> String {
        self.text.clone().unwrap_or_default()
    }

    fn image(self) -> ImageBlock {
        ImageBlock {
            graffiti_url: self
                .graffiti_info
                .and_then(|g| g.url)
                .and_then(|u| non_empty(&u)),
            origin_src: self.origin_src.and_then(|u| non_empty(&u)),
            cdn_src: self.cdn_src,
            cdn_src_active: self.cdn_src_active,
            cdn_src_archive: self.cdn_src_archive,
            big_cdn_src: self.big_cdn_src,
            bsize: self.bsize,
            size: self.size.and_then(|s| s.trim().parse().ok()),
        }
    }

    fn sticker(self) -> StickerBlock {
        StickerBlock {
            dynamic: self.dynamic.and_then(|u| non_empty(&u)),
            static_src: self
                .static_src
                .or(self.src)
                .and_then(|u| non_empty(&u)),
            width: self.width,
            height: self.height,
        }
    }
}

impl From<Value> for ContentBlock {
    fn from(raw: Value) -> Self {
        let Ok(block) = RawBlock::deserialize(&raw) else {
            return Self::Unknown { code: None, raw };
        };

        let code = block.code.clone();
        match code.as_deref() {
            Some("0") => Self::PlainText { text: block.text() },
            Some("1") => Self::Link {
                text: block.text(),
                link: block.link.unwrap_or_default(),
            },
            Some("2") => Self::Emoticon {
                code: block.text(),
                alt: block.c,
            },
            Some("3") => Self::Image(block.image()),
            Some("4") => Self::UsernameRef {
                text: block.text(),
                uid: block.uid.and_then(|u| non_empty(&u)),
            },
            Some("5") => Self::Video(VideoBlock {
                text: block.text(),
                link: block.link.and_then(|u| non_empty(&u)),
                poster: block.src.and_then(|u| non_empty(&u)),
                width: block.width,
                height: block.height,
            }),
            Some("7") => Self::LineBreak,
            Some("9") => Self::Number { text: block.text() },
            Some("11") => Self::BigEmoticon(block.sticker()),
            Some("16") => Self::Graffiti(block.image()),
            Some("18") => Self::Topic {
                text: block.text(),
                link: block.link.unwrap_or_default(),
            },
            Some("20") => Self::EmoticonGraph(block.sticker()),
            other => Self::Unknown {
                code: other.map(ToString::to_string),
                raw,
            },
        }
    }
}

impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from)
    }
}
