//! Transform contracts consumed by the asset pipeline.
//!
//! These are narrow, pure capabilities: data-URI encoding of small binary
//! payloads, header-only raster dimension probing, and a pluggable script
//! minifier. None of them touch global state.

use crate::error::{BuildError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::io::Cursor;
use std::sync::Arc;

/// A script minifier: source in, minified source out.
///
/// The pipeline treats minification as an optional stage; deployments inject
/// whatever implementation they use through this contract.
pub type Minifier = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Encodes `bytes` as a `data:` URI for the given file extension.
pub fn data_uri(extension: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_for_extension(extension),
        STANDARD.encode(bytes)
    )
}

/// Maps a file extension to a media type for data-URI inlining.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "css" => "text/css",
        "js" => "text/javascript",
        _ => "application/octet-stream",
    }
}

/// Probes `(width, height)` of a raster image, decoding only as much as the
/// format header requires.
pub fn probe_dimensions(entry: &str, bytes: &[u8]) -> Result<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| BuildError::Dimensions {
            entry: entry.to_string(),
            reason: e.to_string(),
        })?
        .into_dimensions()
        .map_err(|e| BuildError::Dimensions {
            entry: entry.to_string(),
            reason: e.to_string(),
        })
}

/// A conservative built-in minifier: strips comments and collapses
/// inter-token whitespace. String and template literals are preserved.
///
/// Real deployments are expected to inject a proper minifier through
/// [`Minifier`]; this one exists so the minification stage and the `.min.js`
/// publishing path stay exercised end to end.
pub fn whitespace_minifier() -> Minifier {
    Arc::new(|source: &str| strip_js(source))
}

fn strip_js(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut pending_space = false;

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' | '`' => {
                if pending_space && needs_space(out.chars().last(), Some(c)) {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
                let quote = c;
                while let Some(inner) = chars.next() {
                    out.push(inner);
                    if inner == '\\' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else if inner == quote {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        break;
                    }
                }
                pending_space = true;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
                pending_space = true;
            }
            c if c.is_whitespace() => {
                pending_space = true;
            }
            c => {
                if pending_space && needs_space(out.chars().last(), Some(c)) {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
            }
        }
    }
    out
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn needs_space(prev: Option<char>, next: Option<char>) -> bool {
    matches!((prev, next), (Some(p), Some(n)) if is_word(p) && is_word(n))
}
