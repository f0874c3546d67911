//! Input validation for batch uploads.

use url::Url;

use super::BatchError;

/// Checks that `urls` is non-empty and every entry is an absolute URL.
///
/// Entries must already be trimmed: the string is used verbatim as the key of
/// its batch entry and stored record.
///
/// Duplicates are allowed. Scheme support is checked later, per URL, by the
/// source provider, so an `ftp://` entry fails alone instead of failing the batch.
///
/// # Errors
///
/// [`BatchError::EmptyInput`] or [`BatchError::InvalidUrl`] naming the first bad entry.
pub fn validate_source_urls(urls: &[String]) -> Result<(), BatchError> {
    if urls.is_empty() {
        return Err(BatchError::EmptyInput);
    }

    for (index, url) in urls.iter().enumerate() {
        let valid = url.trim() == url
            && Url::parse(url).is_ok_and(|parsed| !parsed.cannot_be_a_base());
        if !valid {
            return Err(BatchError::InvalidUrl {
                position: index + 1,
                url: url.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_validate_rejects_empty_list() {
        assert!(matches!(validate_source_urls(&[]), Err(BatchError::EmptyInput)));
    }

    #[test]
    fn test_validate_accepts_duplicates() {
        let list = urls(&["https://a.test/x", "https://a.test/x"]);
        assert!(validate_source_urls(&list).is_ok());
    }

    #[test]
    fn test_validate_reports_first_bad_position() {
        let list = urls(&["https://a.test/x", "not a url", "mailto:someone@example.com"]);
        match validate_source_urls(&list) {
            Err(BatchError::InvalidUrl { position, url }) => {
                assert_eq!(position, 2);
                assert_eq!(url, "not a url");
            }
            other => panic!("Expected InvalidUrl, got: {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_non_hierarchical_url() {
        let list = urls(&["mailto:someone@example.com"]);
        assert!(matches!(
            validate_source_urls(&list),
            Err(BatchError::InvalidUrl { position: 1, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_surrounding_whitespace() {
        let list = urls(&["https://a.test/x", " https://a.test/y\n"]);
        match validate_source_urls(&list) {
            Err(BatchError::InvalidUrl { position, url }) => {
                assert_eq!(position, 2);
                assert_eq!(url, " https://a.test/y\n");
            }
            other => panic!("Expected InvalidUrl, got: {other:?}"),
        }
    }

    #[test]
    fn test_validate_leaves_scheme_checks_to_source() {
        let list = urls(&["ftp://files.test/a.bin"]);
        assert!(validate_source_urls(&list).is_ok());
    }
}
