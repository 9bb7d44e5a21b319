//! VFS configuration constants.

/// MIME type used when nothing better is known.
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Name of the built-in mount for plain HTTP(S) URLs.
pub const HTTP_MOUNT: &str = "http";

/// Transport serving the built-in HTTP mount.
pub const WEB_TRANSPORT: &str = "web";

/// Transport backed by the socket connection.
pub const REMOTE_TRANSPORT: &str = "remote";

/// Ephemeral in-memory transport.
pub const MEMORY_TRANSPORT: &str = "memory";

/// Pattern matched by the built-in HTTP mount.
pub const HTTP_PATTERN: &str = "^https?://";

/// Capacity of the file-watch broadcast channel.
pub const WATCH_CHANNEL_CAPACITY: usize = 256;

/// Built-in extension to MIME mapping. Configuration may extend or override it.
pub const DEFAULT_MIME_MAPPING: &[(&str, &str)] = &[
    (".txt", "text/plain"),
    (".log", "text/plain"),
    (".md", "text/markdown"),
    (".html", "text/html"),
    (".htm", "text/html"),
    (".css", "text/css"),
    (".csv", "text/csv"),
    (".xml", "application/xml"),
    (".js", "application/javascript"),
    (".json", "application/json"),
    (".pdf", "application/pdf"),
    (".zip", "application/zip"),
    (".gz", "application/gzip"),
    (".tar", "application/x-tar"),
    (".png", "image/png"),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".gif", "image/gif"),
    (".svg", "image/svg+xml"),
    (".webp", "image/webp"),
    (".ico", "image/x-icon"),
    (".mp3", "audio/mpeg"),
    (".ogg", "audio/ogg"),
    (".wav", "audio/wav"),
    (".mp4", "video/mp4"),
    (".webm", "video/webm"),
    (".lnk", "application/x-lnk"),
];
