//! Media references: which files the viewer accepts and how they are
//! addressed once accepted.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg", "mov", "m4v"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Kind for an allow-listed extension (without the dot, any case).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// How the viewer page classifies a `src` it was handed: video for a
    /// video extension, a `blob:` URL or a `mime=video` hint, image otherwise.
    pub fn sniff(src: &str) -> Self {
        let lower = src.to_ascii_lowercase();
        let has_video_ext = VIDEO_EXTENSIONS
            .iter()
            .any(|ext| lower.ends_with(&format!(".{ext}")));
        if has_video_ext || lower.starts_with("blob:") || lower.contains("mime=video") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

/// A validated, loadable pointer to an image or video file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    pub path: PathBuf,
    pub kind: MediaKind,
    /// `file://` URL handed to the UI
    pub uri: String,
}

impl MediaReference {
    /// Accepts `path` only if it exists and carries an allow-listed extension.
    pub fn from_candidate(path: &Path) -> Option<Self> {
        let kind = MediaKind::from_path(path)?;
        if !path.exists() {
            return None;
        }
        let uri = file_url(path)?;
        Some(Self {
            path: path.to_path_buf(),
            kind,
            uri,
        })
    }

    /// Paths handed over by the OS "open with" event skip the allow-list; the
    /// OS already matched them against the registered file associations.
    pub fn from_opened_path(path: &Path) -> Option<Self> {
        let kind = MediaKind::from_path(path).unwrap_or(MediaKind::Image);
        let uri = file_url(path)?;
        Some(Self {
            path: path.to_path_buf(),
            kind,
            uri,
        })
    }
}

/// Returns the first argument that names an existing, allow-listed file.
pub fn resolve_candidates<I, S>(args: I) -> Option<MediaReference>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    resolve_candidates_in(args, None)
}

/// Like [`resolve_candidates`], resolving relative arguments against `cwd`
/// (the working directory of the launch that produced them).
pub fn resolve_candidates_in<I, S>(args: I, cwd: Option<&Path>) -> Option<MediaReference>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter().find_map(|arg| {
        let raw = strip_quotes(arg.as_ref());
        if raw.is_empty() {
            return None;
        }
        let path = match cwd {
            Some(dir) if Path::new(raw).is_relative() => dir.join(raw),
            _ => PathBuf::from(raw),
        };
        let found = MediaReference::from_candidate(&path);
        if found.is_none() {
            debug!("Skipping launch argument {:?}", raw);
        }
        found
    })
}

/// Strips one pair of surrounding double quotes, as shells on Windows may
/// pass them through.
pub fn strip_quotes(arg: &str) -> &str {
    let arg = arg.strip_prefix('"').unwrap_or(arg);
    arg.strip_suffix('"').unwrap_or(arg)
}

/// `file://` URL for `path`; relative paths are made absolute first.
pub fn file_url(path: &Path) -> Option<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    Url::from_file_path(&absolute).ok().map(String::from)
}

/// Address of a local file on the webview's asset protocol, in the form the
/// JS `convertFileSrc` helper produces.
pub fn asset_url(path: &Path) -> String {
    let encoded = urlencoding::encode(&path.to_string_lossy()).into_owned();
    if cfg!(any(windows, target_os = "android")) {
        format!("http://asset.localhost/{encoded}")
    } else {
        format!("asset://localhost/{encoded}")
    }
}

/// Address of the viewer page showing `uri`.
pub fn viewer_url(viewer_page: &str, uri: &str) -> String {
    format!("{}?src={}", viewer_page, urlencoding::encode(uri))
}

/// One filter row of an open-file dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

/// "Media" (both allow-lists) followed by "All Files".
pub fn media_dialog_filters() -> Vec<DialogFilter> {
    vec![
        DialogFilter {
            name: "Media".to_string(),
            extensions: IMAGE_EXTENSIONS
                .iter()
                .chain(VIDEO_EXTENSIONS)
                .map(|ext| ext.to_string())
                .collect(),
        },
        DialogFilter {
            name: "All Files".to_string(),
            extensions: vec!["*".to_string()],
        },
    ]
}
