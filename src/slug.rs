//! URL slugs for products, galleries and organisations.

use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::PgConnection;
use std::collections::HashSet;

pub const MAX_SLUG_CHARS: usize = 100;

static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("static slug pattern"));
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").expect("static slug pattern"));
static NUMBERED_TAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-\d+)+$").expect("static slug pattern"));

/// Lowercase, strip punctuation, join words with `-`, cap at 100 characters.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = DISALLOWED.replace_all(lowered.trim(), "");
    let joined = SEPARATORS.replace_all(&stripped, "-");
    joined.chars().take(MAX_SLUG_CHARS).collect()
}

/// `base`, or the first of `base-2`, `base-3`, ... not already taken.
pub fn unique_slug(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|i| format!("{}-{}", base, i))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// `LIKE` pattern matching a slug and its numbered variants.
pub fn like_pattern(base: &str) -> String {
    let escaped = base.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("{}%", escaped)
}

/// `slug` without its trailing `-N` groups: every candidate `unique_slug`
/// can produce for a base shares the root of that base.
pub fn slug_root(slug: &str) -> &str {
    match NUMBERED_TAIL.find(slug) {
        Some(tail) if tail.start() > 0 => &slug[..tail.start()],
        _ => slug,
    }
}

/// Serialise slug selection for `base` within `scope` until the transaction ends.
///
/// Must run on a transaction's connection, before reading the taken slugs.
pub async fn lock_slug_family(
    conn: &mut PgConnection,
    scope: &str,
    base: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(format!("{}:{}", scope, slug_root(base)))
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Modern Chair!  "), "modern-chair");
        assert_eq!(slugify("Sofa -- 3 seater"), "sofa-3-seater");
        assert_eq!(slugify("snake_case stays"), "snake_case-stays");
        assert_eq!(slugify("Café Table"), "café-table");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_caps_length() {
        let long = "a".repeat(250);
        assert_eq!(slugify(&long).chars().count(), MAX_SLUG_CHARS);
    }

    #[test]
    fn test_unique_slug_suffixes() {
        let mut taken = HashSet::new();
        assert_eq!(unique_slug("chair", &taken), "chair");
        taken.insert("chair".to_string());
        assert_eq!(unique_slug("chair", &taken), "chair-2");
        taken.insert("chair-2".to_string());
        taken.insert("chair-3".to_string());
        assert_eq!(unique_slug("chair", &taken), "chair-4");
    }

    #[test]
    fn test_slug_root_strips_numbered_tail() {
        assert_eq!(slug_root("chair"), "chair");
        assert_eq!(slug_root("chair-2"), "chair");
        assert_eq!(slug_root("chair-2-3"), "chair");
        assert_eq!(slug_root("sofa-3-seater"), "sofa-3-seater");
        assert_eq!(slug_root("2024"), "2024");
        // "chair" and "chair-2" can both yield "chair-2"
        let taken = HashSet::from(["chair".to_string()]);
        assert_eq!(slug_root(&unique_slug("chair", &taken)), slug_root("chair-2"));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "50\\%\\_off%");
    }
}
