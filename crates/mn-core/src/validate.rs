//! # Field Validation
//!
//! Boundary checks for client-supplied comment fields. A request either
//! passes as a whole or is rejected before anything touches the store.

use crate::error::{AppError, Result};
use crate::models::{CommentEdit, NewComment};

pub const MAX_TEXT_LEN: usize = 65535;
pub const MAX_AUTHOR_LEN: usize = 254;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_WEBSITE_LEN: usize = 254;

/// Validates all client-controlled fields of a creation request.
pub fn check_new(new: &NewComment) -> Result<()> {
    check_text(&new.text)?;
    check_author(new.author.as_deref())?;
    check_email(new.email.as_deref())?;
    check_website(new.website.as_deref())?;
    Ok(())
}

/// Validates the mutable fields of an edit request.
pub fn check_edit(edit: &CommentEdit) -> Result<()> {
    check_text(&edit.text)?;
    check_author(edit.author.as_deref())?;
    check_website(edit.website.as_deref())?;
    Ok(())
}

pub fn check_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("text is missing or blank".into()));
    }
    if text.len() > MAX_TEXT_LEN {
        return Err(AppError::Validation(format!(
            "text exceeds {} characters",
            MAX_TEXT_LEN
        )));
    }
    Ok(())
}

pub fn check_author(author: Option<&str>) -> Result<()> {
    match author {
        Some(a) if a.len() > MAX_AUTHOR_LEN => Err(AppError::Validation(format!(
            "author exceeds {} characters",
            MAX_AUTHOR_LEN
        ))),
        _ => Ok(()),
    }
}

pub fn check_email(email: Option<&str>) -> Result<()> {
    match email {
        Some(e) if e.len() > MAX_EMAIL_LEN => Err(AppError::Validation(format!(
            "email exceeds {} characters",
            MAX_EMAIL_LEN
        ))),
        _ => Ok(()),
    }
}

pub fn check_website(website: Option<&str>) -> Result<()> {
    let Some(site) = website else { return Ok(()) };
    if site.len() > MAX_WEBSITE_LEN {
        return Err(AppError::Validation(format!(
            "website exceeds {} characters",
            MAX_WEBSITE_LEN
        )));
    }
    if !isurl(site) {
        return Err(AppError::Validation("website is not a valid URL".into()));
    }
    Ok(())
}

/// Accepts `example.tld`, `http(s)://example.tld[:port][/path]` and
/// internationalized hosts; rejects every other scheme (`ftp:`, `tel:`,
/// ...) and bare strings without a dotted host.
pub fn isurl(raw: &str) -> bool {
    let rest = if let Some(r) = raw.strip_prefix("https://") {
        r
    } else if let Some(r) = raw.strip_prefix("http://") {
        r
    } else {
        // Anything with an explicit scheme other than http(s) is out.
        let head = raw
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();
        if head.contains(':') {
            return false;
        }
        raw
    };

    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    let (host, port) = match authority.rsplit_once(':') {
        Some((h, p)) => (h, Some(p)),
        None => (authority, None),
    };
    if let Some(p) = port {
        if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }
    !host.is_empty()
        && host.contains('.')
        && !host.starts_with('.')
        && !host.ends_with('.')
        && host.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Mode;

    fn base() -> NewComment {
        NewComment {
            parent: None,
            text: "Lorem ipsum ...".into(),
            author: None,
            email: None,
            website: None,
            remote_addr: "deadbeef".into(),
            mode: Mode::Approved,
            notification: false,
        }
    }

    #[test]
    fn blank_text_is_rejected() {
        for text in ["", "   ", "\n\n\n"] {
            let mut new = base();
            new.text = text.into();
            assert!(check_new(&new).is_err(), "{:?} should fail", text);
        }
    }

    #[test]
    fn field_length_bounds() {
        let mut new = base();
        new.email = Some("*".repeat(254));
        assert!(check_new(&new).is_ok());

        new.email = Some("*".repeat(1024));
        assert!(check_new(&new).is_err());

        let mut new = base();
        new.website = Some(format!("google.de/{}", "a".repeat(128)));
        assert!(check_new(&new).is_ok());

        new.website = Some(format!("google.de/{}", "a".repeat(1024)));
        assert!(check_new(&new).is_err());
    }

    #[test]
    fn url_shapes() {
        assert!(isurl("example.tld"));
        assert!(isurl("http://example.tld"));
        assert!(isurl("https://example.tld"));
        assert!(isurl("https://exämple.tld"));
        assert!(isurl("https://example.tld:1337/"));
        assert!(isurl("https://example.tld:1337/foobar"));
        assert!(isurl("https://example.tld:1337/foobar?p=1#thread"));

        assert!(!isurl("ftp://example.tld/"));
        assert!(!isurl("tel:+1234567890"));
        assert!(!isurl("+1234567890"));
        assert!(!isurl("spam"));
    }
}
