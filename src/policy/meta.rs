//! Response metadata enrichment: mime type, file extension, text encoding

use std::path::Path;
use url::Url;

/// Derived metadata for a fetched document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMeta {
    /// Mime type, from the Content-Type header or the URL extension
    pub mime: Option<String>,

    /// Canonical file extension for the mime type (or from the URL)
    pub ext: Option<String>,

    /// Text encoding, from the charset parameter or sniffed from the body
    pub encoding: Option<String>,
}

/// How many body bytes the encoding sniffer looks at
const ENCODING_SNIFF_BYTES: usize = 1024;

/// Extracts the bare mime type from a Content-Type header value
///
/// # Examples
///
/// ```
/// use trawl::policy::mime_from_content_type;
///
/// assert_eq!(
///     mime_from_content_type("text/html; charset=utf-8"),
///     Some("text/html".to_string())
/// );
/// assert_eq!(mime_from_content_type("  "), None);
/// ```
pub fn mime_from_content_type(value: &str) -> Option<String> {
    let mime = value.split(';').next()?.trim().to_lowercase();
    if mime.is_empty() {
        None
    } else {
        Some(mime)
    }
}

/// Extracts and normalizes the charset parameter of a Content-Type value
fn charset_from_content_type(value: &str) -> Option<String> {
    for param in value.split(';').skip(1) {
        let (name, label) = match param.split_once('=') {
            Some(pair) => pair,
            None => continue,
        };
        if !name.trim().eq_ignore_ascii_case("charset") {
            continue;
        }
        let label = label.trim().trim_matches(|c| c == '"' || c == '\'');
        if let Some(charset) = charset::Charset::for_label(label.as_bytes()) {
            return Some(charset.name().to_lowercase());
        }
    }
    None
}

/// True for mime types whose bodies are text and worth sniffing
fn is_text_mime(mime: &str) -> bool {
    mime.starts_with("text/")
        || mime == "application/json"
        || mime == "application/xml"
        || mime == "application/javascript"
        || mime.ends_with("+json")
        || mime.ends_with("+xml")
}

/// Guesses the encoding of a text body from its first bytes
///
/// BOM first, then a UTF-8 validity check; anything else is assumed to be
/// windows-1252, the web's historical default.
fn sniff_encoding(prefix: &[u8]) -> &'static str {
    if let Some((encoding, _)) = encoding_rs::Encoding::for_bom(prefix) {
        return encoding.name();
    }
    if std::str::from_utf8(prefix).is_ok() {
        return "utf-8";
    }
    "windows-1252"
}

/// The extension of the URL's path component, if any
fn extension_from_url(url: &Url) -> Option<String> {
    Path::new(url.path())
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Builds the metadata record for one fetched document
///
/// # Arguments
///
/// * `url` - The requested URL (used for extension fallbacks)
/// * `content_type` - Raw Content-Type header value, if present
/// * `body` - The decoded response body
/// * `guess_extension` / `guess_encoding` - Enrichment toggles
pub fn document_meta(
    url: &Url,
    content_type: Option<&str>,
    body: &[u8],
    guess_extension: bool,
    guess_encoding: bool,
) -> DocumentMeta {
    let mime = content_type
        .and_then(mime_from_content_type)
        .or_else(|| {
            mime_guess::from_path(url.path())
                .first()
                .map(|m| m.essence_str().to_string())
        });

    let ext = if guess_extension {
        mime.as_deref()
            .and_then(|m| mime_guess::get_mime_extensions_str(m))
            .and_then(|exts| exts.first())
            .map(|ext| (*ext).to_string())
            .or_else(|| extension_from_url(url))
    } else {
        None
    };

    let encoding = if guess_encoding {
        content_type.and_then(charset_from_content_type).or_else(|| {
            match mime.as_deref() {
                Some(mime) if is_text_mime(mime) && !body.is_empty() => {
                    let prefix = &body[..body.len().min(ENCODING_SNIFF_BYTES)];
                    Some(sniff_encoding(prefix).to_lowercase())
                }
                _ => None,
            }
        })
    } else {
        None
    };

    DocumentMeta {
        mime,
        ext,
        encoding,
    }
}
