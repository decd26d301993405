//! String-level repairs applied before tree construction.
//!
//! Every repair is a pattern over the document *string*. A repair whose
//! precondition does not hold on a span leaves that span untouched, and no
//! repair can fail. Running the whole sequence twice yields the same output
//! as running it once: each repair only ever produces already-valid markup.
//!
//! Mojibake is never touched here. Encoding correction is scoped to extracted
//! text so that `raw` stays the undisturbed ground truth.

use std::borrow::Cow;

use memchr::memchr_iter;
use tracing::instrument;

use crate::consts;

/// Sanitized document text plus the repairs that were applied, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub html: String,
    pub warnings: Vec<String>,
}

/// Applies every repair in order.
#[instrument(skip(html), fields(size = html.len(), fixes))]
pub fn sanitize(html: &str) -> Sanitized {
    let mut warnings = Vec::new();
    let mut html = apply(Cow::Borrowed(html), FIXES, &mut warnings);
    // Dropping control characters can join the halves of a pattern an earlier
    // repair looks for (`href=\x01="/x"`), so those repairs get another pass.
    if warnings.iter().any(|warning| warning == CONTROL_CHARS_WARNING) {
        html = apply(html, &FIXES[..RESCAN], &mut warnings);
    }
    tracing::Span::current().record("fixes", warnings.len());
    Sanitized {
        html: html.into_owned(),
        warnings,
    }
}

fn apply<'a>(mut html: Cow<'a, str>, fixes: &[(Fix, Option<&str>)], warnings: &mut Vec<String>) -> Cow<'a, str> {
    for (fix, warning) in fixes {
        let fixed = match fix(&*html) {
            Cow::Owned(fixed) => fixed,
            Cow::Borrowed(_) => continue,
        };
        html = Cow::Owned(fixed);
        if let Some(warning) = warning
            && !warnings.iter().any(|seen| seen == warning)
        {
            warnings.push((*warning).to_string());
        }
    }
    html
}

type Fix = fn(&str) -> Cow<'_, str>;

const CONTROL_CHARS_WARNING: &str = "Removed control characters";
/// The repairs that run ahead of control character removal.
const RESCAN: usize = 4;

/// Ordered repairs. A fix returns [`Cow::Owned`] only when it changed something.
const FIXES: &[(Fix, Option<&str>)] = &[
    (strip_nul, Some("Removed NULL bytes")),
    (collapse_double_brackets, Some("Fixed double angle brackets")),
    (repair_double_equals, Some("Fixed malformed attributes (double equals)")),
    (escape_stray_brackets, Some("Escaped stray angle brackets")),
    (strip_control_chars, Some(CONTROL_CHARS_WARNING)),
    (normalize_line_endings, None),
];

/// NUL crashes many parsers and is never valid in HTML text.
fn strip_nul(html: &str) -> Cow<'_, str> {
    if html.contains('\0') {
        Cow::Owned(html.replace('\0', ""))
    } else {
        Cow::Borrowed(html)
    }
}

/// `<<p>>` becomes `<p>`, but only when the inner span looks like a tag.
fn collapse_double_brackets(html: &str) -> Cow<'_, str> {
    consts::DOUBLE_BRACKET_REGEX.replace_all(html, "<${1}>")
}

/// `href=="/x"` becomes `href="/x"`. Only spans inside a start tag are
/// considered, so script text like `a=="b"` is left alone.
fn repair_double_equals(html: &str) -> Cow<'_, str> {
    if !html.contains("==") {
        return Cow::Borrowed(html);
    }
    let mut changed = false;
    let fixed = consts::TAG_SPAN_REGEX.replace_all(html, |captures: &regex::Captures<'_>| {
        let tag = &captures[0];
        match consts::DOUBLE_EQUALS_REGEX.replace_all(tag, "${1}=${2}") {
            Cow::Owned(repaired) => {
                changed = true;
                repaired
            },
            Cow::Borrowed(untouched) => untouched.to_string(),
        }
    });
    if changed { Cow::Owned(fixed.into_owned()) } else { Cow::Borrowed(html) }
}

/// A `<` that cannot start a tag is entity-encoded so the parser does not
/// invent a phantom element from it.
fn escape_stray_brackets(html: &str) -> Cow<'_, str> {
    let bytes = html.as_bytes();
    let mut fixed: Option<String> = None;
    let mut copied = 0;
    for position in memchr_iter(b'<', bytes) {
        let starts_tag = bytes
            .get(position + 1)
            .is_some_and(|next| next.is_ascii_alphabetic() || matches!(next, b'/' | b'!' | b'?'));
        if starts_tag {
            continue;
        }
        // `<` is ASCII, so both slice boundaries fall on char boundaries.
        let out = fixed.get_or_insert_with(|| String::with_capacity(html.len() + 16));
        out.push_str(&html[copied..position]);
        out.push_str("&lt;");
        copied = position + 1;
    }
    match fixed {
        Some(mut out) => {
            out.push_str(&html[copied..]);
            Cow::Owned(out)
        },
        None => Cow::Borrowed(html),
    }
}

fn is_stray_control(c: char) -> bool {
    c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r' | '\x7f')
}

/// C0 control characters other than tab, newline and carriage return.
fn strip_control_chars(html: &str) -> Cow<'_, str> {
    if html.chars().any(is_stray_control) {
        Cow::Owned(html.chars().filter(|c| !is_stray_control(*c)).collect())
    } else {
        Cow::Borrowed(html)
    }
}

fn normalize_line_endings(html: &str) -> Cow<'_, str> {
    if html.contains('\r') {
        Cow::Owned(html.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(html)
    }
}
