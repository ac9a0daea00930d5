//! Resolution of embedded media references.
//!
//! A media URI found in a post is either left as is, inlined as a base64
//! `data:` URI, or downloaded next to the document under
//! `<stem>.html_files/<category>/<basename>`. Resolution never fails: any
//! transport problem degrades to the original URI.

pub mod progress;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::constants::FRAMING_MARKER;
use crate::transport::{normalize_scheme, ByteStream, Transport, TransportError};
pub use progress::{LogProgress, NoProgress, ProgressSink};

/// How media references are represented in the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStrategy {
    /// Keep the remote URI.
    Skip,
    /// Inline as a base64 `data:` URI.
    Embed,
    /// Download into the document's sibling directory.
    LocalDownload,
}

/// Subdirectory of the media directory a resource is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    Emoticon,
    Image,
    Poster,
    Video,
    BigEmoticon,
}

impl MediaCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Emoticon => "emoticon",
            Self::Image => "image",
            Self::Poster => "poster",
            Self::Video => "video",
            Self::BigEmoticon => "big_emoticon",
        }
    }
}

/// The resolved form of one media URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaReference {
    Remote(String),
    Embedded(String),
    /// Percent-encoded path relative to the output directory.
    Local(String),
}

impl MediaReference {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Remote(s) | Self::Embedded(s) | Self::Local(s) => s,
        }
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single media lookup.
#[derive(Debug, Clone, Copy)]
pub struct MediaRequest<'a> {
    pub uri: &'a str,
    pub category: MediaCategory,
    /// MIME type used when none can be guessed from the URI.
    pub fallback_mime: &'a str,
    /// Expected body size, used for progress when the server sends none.
    pub size_hint: Option<u64>,
}

impl<'a> MediaRequest<'a> {
    #[must_use]
    pub fn new(uri: &'a str, category: MediaCategory, fallback_mime: &'a str) -> Self {
        Self {
            uri,
            category,
            fallback_mime,
            size_hint: None,
        }
    }

    #[must_use]
    pub fn with_size_hint(mut self, size_hint: Option<u64>) -> Self {
        self.size_hint = size_hint;
        self
    }
}

#[derive(Debug, Error)]
enum DownloadError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("connection dropped mid-body")]
    Body(#[source] reqwest::Error),
    #[error("failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolves media for one thread document.
pub struct MediaResolver {
    transport: Transport,
    strategy: MediaStrategy,
    output_dir: PathBuf,
    /// Sanitized document name; media lives under `<stem>.html_files/`.
    file_stem: String,
    overwrite: bool,
    progress: Arc<dyn ProgressSink>,
}

impl fmt::Debug for MediaResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaResolver")
            .field("strategy", &self.strategy)
            .field("output_dir", &self.output_dir)
            .field("file_stem", &self.file_stem)
            .field("overwrite", &self.overwrite)
            .finish_non_exhaustive()
    }
}

impl MediaResolver {
    #[must_use]
    pub fn new(
        transport: Transport,
        strategy: MediaStrategy,
        output_dir: &Path,
        file_stem: &str,
        overwrite: bool,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            transport,
            strategy,
            output_dir: output_dir.to_path_buf(),
            file_stem: file_stem.to_string(),
            overwrite,
            progress,
        }
    }

    #[must_use]
    pub fn strategy(&self) -> MediaStrategy {
        self.strategy
    }

    /// Resolve one URI according to the configured strategy.
    ///
    /// Callers are expected to skip empty URIs; an empty URI is returned
    /// unchanged without any network activity.
    pub async fn resolve(&self, request: MediaRequest<'_>) -> MediaReference {
        let original = request.uri;
        if original.is_empty() || self.strategy == MediaStrategy::Skip {
            return MediaReference::Remote(original.to_string());
        }

        let uri = normalize_scheme(original);
        match self.strategy {
            MediaStrategy::Skip => MediaReference::Remote(original.to_string()),
            MediaStrategy::Embed => match self.embed(&uri, &request).await {
                Ok(data_uri) => MediaReference::Embedded(data_uri),
                Err(e) => {
                    warn!(uri = %uri, "Falling back to remote reference: {e}");
                    MediaReference::Remote(original.to_string())
                }
            },
            MediaStrategy::LocalDownload => self.download(original, &uri, &request).await,
        }
    }

    async fn embed(&self, uri: &str, request: &MediaRequest<'_>) -> Result<String, DownloadError> {
        let mut stream = self.transport.fetch_stream(uri).await?;
        let total = stream.size_hint().or(request.size_hint);
        self.progress.start(uri, total);

        let mut body = Vec::with_capacity(usize::try_from(total.unwrap_or(0)).unwrap_or(0));
        let received = self
            .consume(uri, &mut stream, total, &mut Sink::Memory(&mut body))
            .await?;
        self.progress.finish(uri, received);

        let mime = guess_mime(uri).unwrap_or_else(|| request.fallback_mime.to_string());
        debug!(uri = %uri, mime = %mime, bytes = body.len(), "Embedded media");
        Ok(format!("data:{mime};base64,{}", BASE64_STANDARD.encode(&body)))
    }

    async fn download(
        &self,
        original: &str,
        uri: &str,
        request: &MediaRequest<'_>,
    ) -> MediaReference {
        let basename = basename(uri);
        let relative = self.relative_path(request.category, &basename);
        let destination = self
            .output_dir
            .join(format!("{}.html_files", self.file_stem))
            .join(request.category.as_str())
            .join(&basename);

        if !self.overwrite && file_exists(&destination).await {
            debug!(path = %destination.display(), "Reusing existing media file");
            return MediaReference::Local(relative);
        }

        match self.write_to_file(uri, &destination, request).await {
            Ok(()) => MediaReference::Local(relative),
            Err(e) if file_exists(&destination).await => {
                warn!(uri = %uri, path = %destination.display(), "Keeping existing local file: {e}");
                MediaReference::Local(relative)
            }
            Err(e) => {
                warn!(uri = %uri, "Falling back to remote reference: {e}");
                MediaReference::Remote(original.to_string())
            }
        }
    }

    /// Download into `<destination>.part`, then move it into place.
    ///
    /// `destination` is only replaced by a complete body; a failed download
    /// leaves it as it was and removes the partial file.
    async fn write_to_file(
        &self,
        uri: &str,
        destination: &Path,
        request: &MediaRequest<'_>,
    ) -> Result<(), DownloadError> {
        let mut stream = self.transport.fetch_stream(uri).await?;
        let total = stream.size_hint().or(request.size_hint);

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| DownloadError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let partial = partial_path(destination);
        let received = match self.write_partial(uri, &mut stream, total, &partial).await {
            Ok(received) => received,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    debug!(path = %partial.display(), "Could not remove partial file: {cleanup}");
                }
                return Err(e);
            }
        };

        tokio::fs::rename(&partial, destination)
            .await
            .map_err(|source| DownloadError::Io {
                path: destination.to_path_buf(),
                source,
            })?;

        debug!(uri = %uri, path = %destination.display(), bytes = received, "Downloaded media");
        Ok(())
    }

    async fn write_partial(
        &self,
        uri: &str,
        stream: &mut ByteStream,
        total: Option<u64>,
        partial: &Path,
    ) -> Result<u64, DownloadError> {
        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(|source| DownloadError::Io {
                path: partial.to_path_buf(),
                source,
            })?;

        self.progress.start(uri, total);
        let received = self
            .consume(uri, stream, total, &mut Sink::File(&mut file, partial))
            .await?;
        file.flush().await.map_err(|source| DownloadError::Io {
            path: partial.to_path_buf(),
            source,
        })?;
        self.progress.finish(uri, received);
        Ok(received)
    }

    /// Feed every chunk, minus any leading framing marker, to `sink`.
    async fn consume(
        &self,
        uri: &str,
        stream: &mut ByteStream,
        total: Option<u64>,
        sink: &mut Sink<'_>,
    ) -> Result<u64, DownloadError> {
        let mut received = 0u64;
        while let Some(chunk) = stream.next_chunk().await.map_err(DownloadError::Body)? {
            let payload = strip_framing(&chunk);
            sink.write(payload).await?;
            received += payload.len() as u64;
            self.progress.advance(uri, received, total);
        }
        Ok(received)
    }

    fn relative_path(&self, category: MediaCategory, basename: &str) -> String {
        [
            format!("{}.html_files", self.file_stem),
            category.as_str().to_string(),
            basename.to_string(),
        ]
        .iter()
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
    }
}

/// Destination of a streamed body.
enum Sink<'a> {
    Memory(&'a mut Vec<u8>),
    File(&'a mut tokio::fs::File, &'a Path),
}

impl Sink<'_> {
    async fn write(&mut self, data: &[u8]) -> Result<(), DownloadError> {
        match self {
            Self::Memory(buffer) => {
                buffer.extend_from_slice(data);
                Ok(())
            }
            Self::File(file, path) => {
                file.write_all(data)
                    .await
                    .map_err(|source| DownloadError::Io {
                        path: path.to_path_buf(),
                        source,
                    })
            }
        }
    }
}

/// Sibling path a download is streamed into before it is complete.
fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    destination.with_file_name(name)
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Drop the framing marker if the chunk starts with it.
#[must_use]
pub fn strip_framing(chunk: &[u8]) -> &[u8] {
    chunk.strip_prefix(FRAMING_MARKER.as_slice()).unwrap_or(chunk)
}

fn strip_query(uri: &str) -> &str {
    let end = uri.find(['?', '#']).unwrap_or(uri.len());
    &uri[..end]
}

/// Last path segment of a URI, ignoring query and fragment.
fn basename(uri: &str) -> String {
    let path = strip_query(uri);
    let name = path.rsplit('/').next().unwrap_or(path);
    match name {
        "" | "." | ".." => "media".to_string(),
        name => name.to_string(),
    }
}

fn guess_mime(uri: &str) -> Option<String> {
    mime_guess::from_path(strip_query(uri))
        .first()
        .map(|m| m.essence_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_framing() {
        let mut chunk = FRAMING_MARKER.to_vec();
        chunk.extend_from_slice(b"payload");
        assert_eq!(strip_framing(&chunk), b"payload");
        assert_eq!(strip_framing(b"payload"), b"payload");
        assert_eq!(strip_framing(b"HTTP/1.1 100"), b"HTTP/1.1 100");
        assert_eq!(FRAMING_MARKER.len(), 23);
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("http://h/forum/pic/item/abc.jpg?tbpicau=1"), "abc.jpg");
        assert_eq!(basename("http://h/a/b.png#frag"), "b.png");
        assert_eq!(basename("http://h/dir/"), "media");
        assert_eq!(basename("http://h/dir/.."), "media");
    }

    #[test]
    fn test_partial_path_is_sibling() {
        assert_eq!(
            partial_path(Path::new("out/t.html_files/image/a.jpg")),
            Path::new("out/t.html_files/image/a.jpg.part")
        );
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime("http://h/a.png?x=1.mp4").as_deref(), Some("image/png"));
        assert_eq!(guess_mime("http://h/a.gif").as_deref(), Some("image/gif"));
        assert_eq!(guess_mime("http://h/video/12345"), None);
    }

    #[test]
    fn test_relative_path_is_percent_encoded() {
        let transport = Transport::with_client(reqwest::Client::new(), 1, std::time::Duration::ZERO);
        let resolver = MediaResolver::new(
            transport,
            MediaStrategy::LocalDownload,
            Path::new("out"),
            "标题 1",
            false,
            Arc::new(NoProgress),
        );
        assert_eq!(
            resolver.relative_path(MediaCategory::BigEmoticon, "a b.gif"),
            "%E6%A0%87%E9%A2%98%201.html_files/big_emoticon/a%20b.gif"
        );
    }

    #[tokio::test]
    async fn test_skip_and_empty_uri_do_nothing() {
        let transport = Transport::with_client(reqwest::Client::new(), 1, std::time::Duration::ZERO);
        let resolver = MediaResolver::new(
            transport.clone(),
            MediaStrategy::Skip,
            Path::new("out"),
            "t",
            false,
            Arc::new(NoProgress),
        );
        let request = MediaRequest::new("//h/a.png", MediaCategory::Image, "image/png");
        assert_eq!(
            resolver.resolve(request).await,
            MediaReference::Remote("//h/a.png".to_string())
        );

        let resolver = MediaResolver::new(
            transport,
            MediaStrategy::Embed,
            Path::new("out"),
            "t",
            false,
            Arc::new(NoProgress),
        );
        let request = MediaRequest::new("", MediaCategory::Image, "image/png");
        assert_eq!(resolver.resolve(request).await, MediaReference::Remote(String::new()));
    }
}
