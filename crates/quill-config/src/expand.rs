//! `${VAR}` and `${VAR:-default}` expansion for configuration values.
//!
//! Only braced references trigger expansion, so URLs with a literal `$`
//! survive untouched. An unset variable without a default is an error that
//! names the configuration field it came from.

use std::borrow::Cow;

use crate::ConfigError;

/// Name of a referenced variable that is not set.
struct MissingVar(String);

/// Expand variable references in `value`; `field` is used in error messages.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    let lookup = |name: &str| {
        std::env::var(name)
            .map(Some)
            .map_err(|_| MissingVar(name.to_owned()))
    };
    match shellexpand::env_with_context(value, lookup) {
        Ok(expanded) => Ok(Cow::into_owned(expanded)),
        Err(e) => Err(ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", e.cause.0),
        }),
    }
}

/// [`expand_env`] for optional fields; `None` stays `None`.
pub(crate) fn expand_opt(value: &mut Option<String>, field: &str) -> Result<(), ConfigError> {
    if let Some(raw) = value.take() {
        *value = Some(expand_env(&raw, field)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run `f` with `name` set (or unset for `None`), restoring it afterwards.
    ///
    /// Every test uses its own variable name, so tests never race on one.
    fn with_var<T>(name: &str, value: Option<&str>, f: impl FnOnce() -> T) -> T {
        // SAFETY: names are unique per test; no other thread reads them.
        unsafe {
            match value {
                Some(v) => std::env::set_var(name, v),
                None => std::env::remove_var(name),
            }
        }
        let out = f();
        // SAFETY: as above.
        unsafe { std::env::remove_var(name) };
        out
    }

    #[test]
    fn test_bucket_from_env() {
        let bucket = with_var("QUILL_TEST_BUCKET", Some("blog-media"), || {
            expand_env("${QUILL_TEST_BUCKET}", "media.s3.bucket")
        });

        assert_eq!(bucket.unwrap(), "blog-media");
    }

    #[test]
    fn test_default_applies_when_unset() {
        let region = with_var("QUILL_TEST_UNSET_REGION", None, || {
            expand_env("${QUILL_TEST_UNSET_REGION:-eu-west-1}", "media.s3.region")
        });

        assert_eq!(region.unwrap(), "eu-west-1");
    }

    #[test]
    fn test_missing_var_names_field() {
        let err = with_var("QUILL_TEST_MISSING", None, || {
            expand_env("https://${QUILL_TEST_MISSING}/media", "media.base_url")
        })
        .unwrap_err();

        let message = err.to_string();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(message.contains("QUILL_TEST_MISSING"));
        assert!(message.contains("media.base_url"));
    }

    #[test]
    fn test_reference_inside_url() {
        let url = with_var("QUILL_TEST_CDN_HOST", Some("cdn.example.com"), || {
            expand_env("https://${QUILL_TEST_CDN_HOST}/blog", "media.base_url")
        });

        assert_eq!(url.unwrap(), "https://cdn.example.com/blog");
    }

    #[test]
    fn test_bare_dollar_is_literal() {
        let url = expand_env("https://example.com/$path", "media.base_url").unwrap();

        assert_eq!(url, "https://example.com/$path");
    }

    #[test]
    fn test_optional_field() {
        let mut missing = None;
        expand_opt(&mut missing, "media.s3.endpoint").unwrap();
        assert!(missing.is_none());

        let mut endpoint = Some("http://localhost:9000".to_owned());
        expand_opt(&mut endpoint, "media.s3.endpoint").unwrap();
        assert_eq!(endpoint.as_deref(), Some("http://localhost:9000"));
    }
}
