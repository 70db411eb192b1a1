/// Locale codes accepted by the store, in upload order
pub const ALL_LOCALES: &[&str] = &[
    "da", "de-DE", "el", "en-AU", "en-CA", "en-GB", "en-US", "es-ES", "es-MX", "fi", "fr-CA",
    "fr-FR", "id", "it", "ja", "ko", "ms", "nl-NL", "no", "pt-BR", "pt-PT", "ru", "sv", "th",
    "tr", "vi", "zh-Hans", "zh-Hant",
];

/// Video container extensions paired with sidecar metadata
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov"];

/// Sidecar metadata extension
pub const CONFIG_EXTENSION: &str = "json";

/// Generated poster extension
pub const POSTER_EXTENSION: &str = "jpg";

pub fn is_video_extension(ext: &str) -> bool {
    VIDEO_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext))
}
