//! Mapping archived URLs onto safe local file paths.
//!
//! Each capture gets a natural, browsable path:
//!
//! ```text
//! <timestamp>/<host>/<path segments>[?query]
//! ```
//!
//! When that path cannot be represented on the target filesystem, the
//! capture goes to a flat, content-addressed fallback instead:
//!
//! ```text
//! _hashed/<sha256(timestamp, url)><ext>
//! ```
//!
//! Both mappings are pure functions of `(original_url, timestamp)` and the
//! target [`Platform`], so reruns land on the same files.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::constants::{
    DEFAULT_FALLBACK_EXTENSION, FALLBACK_DIR, MAX_COMPONENT_BYTES, MAX_RELATIVE_PATH_BYTES_UNIX,
    MAX_RELATIVE_PATH_BYTES_WINDOWS,
};

/// Name appended to directory-like URLs.
const INDEX_FILE: &str = "index.html";

/// Longest URL extension carried over to a fallback filename.
const MAX_EXTENSION_CHARS: usize = 8;

/// Characters Windows refuses in file names.
const WINDOWS_ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '\\', '|', '*', '?'];

/// Device names Windows reserves regardless of extension.
const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Filesystem rules the local paths must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Linux, macOS and other Unix-likes.
    Unix,
    /// Windows (NTFS naming rules, `MAX_PATH` budget).
    Windows,
}

impl Platform {
    /// The platform this binary was built for.
    #[must_use]
    pub fn current() -> Self {
        if cfg!(windows) { Self::Windows } else { Self::Unix }
    }

    fn max_relative_path_bytes(self) -> usize {
        match self {
            Self::Unix => MAX_RELATIVE_PATH_BYTES_UNIX,
            Self::Windows => MAX_RELATIVE_PATH_BYTES_WINDOWS,
        }
    }

    fn query_separator(self) -> char {
        match self {
            Self::Unix => '?',
            Self::Windows => '@',
        }
    }
}

/// Why a natural path was not usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathRejection {
    /// The archived URL does not parse.
    #[error("URL does not parse: {url}")]
    UnparseableUrl {
        /// The rejected URL.
        url: String,
    },

    /// The archived URL has no host to name a directory after.
    #[error("URL has no host: {url}")]
    MissingHost {
        /// The rejected URL.
        url: String,
    },

    /// A component would be `.` or `..`.
    #[error("path component '{component}' is a relative reference")]
    DotComponent {
        /// The offending component.
        component: String,
    },

    /// The query holds a `/`, which cannot stay inside one file name.
    #[error("query string contains '/'")]
    SlashInQuery,

    /// Two consecutive slashes left an empty component.
    #[error("empty path component")]
    EmptyComponent,

    /// A component exceeds the per-name limit.
    #[error("path component of {len} bytes exceeds {MAX_COMPONENT_BYTES}")]
    ComponentTooLong {
        /// Component length in bytes.
        len: usize,
    },

    /// The whole relative path exceeds the platform budget.
    #[error("relative path of {len} bytes exceeds {limit}")]
    PathTooLong {
        /// Path length in bytes.
        len: usize,
        /// The platform's budget.
        limit: usize,
    },

    /// A component contains a character the platform refuses.
    #[error("illegal character {character:?} in '{component}'")]
    IllegalCharacter {
        /// The offending component.
        component: String,
        /// The refused character.
        character: char,
    },

    /// A component is a reserved device name.
    #[error("reserved device name '{component}'")]
    ReservedName {
        /// The offending component.
        component: String,
    },

    /// A component ends in a dot or space, which Windows strips silently.
    #[error("trailing dot or space in '{component}'")]
    TrailingDotOrSpace {
        /// The offending component.
        component: String,
    },
}

/// A destination relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPath {
    relative: PathBuf,
    hashed: bool,
}

impl LocalPath {
    /// Path relative to the output root.
    #[must_use]
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// Whether this is the hashed fallback rather than the natural path.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.hashed
    }

    /// Absolute (or root-relative) location under `root`.
    #[must_use]
    pub fn under(&self, root: &Path) -> PathBuf {
        root.join(&self.relative)
    }
}

/// Maps `(original_url, timestamp)` to a [`LocalPath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathResolver {
    platform: Platform,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(Platform::current())
    }
}

impl PathResolver {
    /// Creates a resolver validating against `platform`'s rules.
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    /// The rules this resolver validates against.
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// The natural path when valid, else the hashed fallback.
    #[must_use]
    pub fn resolve(&self, original_url: &str, timestamp: &str) -> LocalPath {
        match self.natural_path(original_url, timestamp) {
            Ok(path) => path,
            Err(rejection) => {
                debug!(url = original_url, %rejection, "using hashed fallback path");
                self.fallback_path(original_url, timestamp)
            }
        }
    }

    /// Builds and validates `<timestamp>/<host>/<path>[?query]`.
    ///
    /// # Errors
    ///
    /// Returns the first [`PathRejection`] found.
    pub fn natural_path(
        &self,
        original_url: &str,
        timestamp: &str,
    ) -> Result<LocalPath, PathRejection> {
        let url = Url::parse(original_url).map_err(|_| PathRejection::UnparseableUrl {
            url: original_url.to_string(),
        })?;
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| PathRejection::MissingHost {
                url: original_url.to_string(),
            })?;

        let mut components = vec![timestamp.to_string(), self.host_component(host, url.port())];

        let path = url.path().strip_prefix('/').unwrap_or(url.path());
        if !path.is_empty() {
            components.extend(path.split('/').map(str::to_string));
        }
        if path.is_empty() || path.ends_with('/') {
            match components.last_mut() {
                Some(last) if last.is_empty() => INDEX_FILE.clone_into(last),
                _ => components.push(INDEX_FILE.to_string()),
            }
        }

        if let Some(query) = url.query().filter(|q| !q.is_empty()) {
            if query.contains('/') {
                return Err(PathRejection::SlashInQuery);
            }
            if let Some(last) = components.last_mut() {
                last.push(self.platform.query_separator());
                last.push_str(query);
            }
        }

        for component in &components {
            validate_component(component, self.platform)?;
        }
        let len = components.iter().map(String::len).sum::<usize>() + components.len() - 1;
        let limit = self.platform.max_relative_path_bytes();
        if len > limit {
            return Err(PathRejection::PathTooLong { len, limit });
        }

        Ok(LocalPath {
            relative: components.iter().collect(),
            hashed: false,
        })
    }

    /// Builds `_hashed/<sha256-hex(timestamp, url)><ext>`.
    ///
    /// Always valid on every platform, distinct for distinct inputs.
    #[must_use]
    pub fn fallback_path(&self, original_url: &str, timestamp: &str) -> LocalPath {
        let digest = Sha256::digest(format!("{timestamp}\n{original_url}").as_bytes());
        let name = format!("{}{}", hex_encode(&digest), fallback_extension(original_url));
        LocalPath {
            relative: Path::new(FALLBACK_DIR).join(name),
            hashed: true,
        }
    }

    fn host_component(&self, host: &str, port: Option<u16>) -> String {
        match (port, self.platform) {
            (None, _) => host.to_string(),
            (Some(port), Platform::Unix) => format!("{host}:{port}"),
            (Some(port), Platform::Windows) => format!("{host}+{port}"),
        }
    }
}

fn validate_component(component: &str, platform: Platform) -> Result<(), PathRejection> {
    if component.is_empty() {
        return Err(PathRejection::EmptyComponent);
    }
    if component == "." || component == ".." {
        return Err(PathRejection::DotComponent {
            component: component.to_string(),
        });
    }
    if component.len() > MAX_COMPONENT_BYTES {
        return Err(PathRejection::ComponentTooLong {
            len: component.len(),
        });
    }
    let illegal = |c: char| match platform {
        Platform::Unix => c == '\0' || c == '/',
        Platform::Windows => c.is_control() || c == '/' || WINDOWS_ILLEGAL_CHARS.contains(&c),
    };
    if let Some(character) = component.chars().find(|c| illegal(*c)) {
        return Err(PathRejection::IllegalCharacter {
            component: component.to_string(),
            character,
        });
    }
    if platform == Platform::Windows {
        if component.ends_with('.') || component.ends_with(' ') {
            return Err(PathRejection::TrailingDotOrSpace {
                component: component.to_string(),
            });
        }
        let stem = component.split('.').next().unwrap_or(component);
        if WINDOWS_RESERVED_NAMES
            .iter()
            .any(|reserved| stem.eq_ignore_ascii_case(reserved))
        {
            return Err(PathRejection::ReservedName {
                component: component.to_string(),
            });
        }
    }
    Ok(())
}

/// The URL's short alphanumeric extension (lowercased, with the dot), or
/// `.html` when it has none.
fn fallback_extension(original_url: &str) -> String {
    let path = match Url::parse(original_url) {
        Ok(url) => url.path().to_string(),
        Err(_) => original_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let last_segment = path.rsplit('/').next().unwrap_or_default();
    last_segment
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| {
            (1..=MAX_EXTENSION_CHARS).contains(&ext.len())
                && ext.bytes().all(|b| b.is_ascii_alphanumeric())
        })
        .map_or_else(
            || DEFAULT_FALLBACK_EXTENSION.to_string(),
            |ext| format!(".{}", ext.to_ascii_lowercase()),
        )
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}
