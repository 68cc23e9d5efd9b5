//! Constants for the download module (local layout, temp files).

/// Directory under the output root that holds hashed fallback files.
pub const FALLBACK_DIR: &str = "_hashed";

/// Name of the temporary sibling a body is written to before the rename.
pub const TEMP_FILE_NAME: &str = ".waybackdl.part";

/// Longest file or directory name most filesystems accept, in bytes.
pub const MAX_COMPONENT_BYTES: usize = 255;

/// Relative path budget on Unix-like targets, leaving room for the output root.
pub const MAX_RELATIVE_PATH_BYTES_UNIX: usize = 3072;

/// Relative path budget on Windows, leaving room under `MAX_PATH` for the output root.
pub const MAX_RELATIVE_PATH_BYTES_WINDOWS: usize = 200;

/// Extension used for fallback files when the URL has no usable one.
pub const DEFAULT_FALLBACK_EXTENSION: &str = ".html";
