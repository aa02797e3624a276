//! Ordered, short-circuiting validation chain: size then MIME allow-list.

/// Everything a validator needs besides the raw bytes.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub mime_type: &'a str,
}

/// One step in the chain. Returns `Err` with an operator-facing message on
/// rejection; the HTTP layer is responsible for turning that into a
/// client-facing 400 body.
pub trait Validator: Send + Sync {
    fn validate(&self, content: &[u8], ctx: &ValidationContext<'_>) -> Result<(), String>;
}

/// Rejects content larger than `max_bytes`.
pub struct SizeValidator {
    pub max_bytes: usize,
}

impl Validator for SizeValidator {
    fn validate(&self, content: &[u8], _ctx: &ValidationContext<'_>) -> Result<(), String> {
        if content.len() > self.max_bytes {
            return Err(format!(
                "File too large: {} bytes (max {} bytes)",
                content.len(),
                self.max_bytes
            ));
        }
        Ok(())
    }
}

/// Rejects MIME types outside an allow-list. An empty list permits everything.
/// An entry ending in `*` (e.g. `image/*`) matches the whole category.
pub struct MimeAllowlistValidator {
    pub allowed: Vec<String>,
}

impl Validator for MimeAllowlistValidator {
    fn validate(&self, _content: &[u8], ctx: &ValidationContext<'_>) -> Result<(), String> {
        if self.allowed.is_empty() {
            return Ok(());
        }

        if ctx.mime_type.is_empty() {
            return Err("MIME type not declared".to_string());
        }

        let exact_or_category_match = self.allowed.iter().any(|allowed| {
            if let Some(category) = allowed.strip_suffix("/*") {
                ctx.mime_type.starts_with(&format!("{category}/"))
            } else {
                allowed == ctx.mime_type
            }
        });

        if exact_or_category_match {
            Ok(())
        } else {
            Err(format!("File type not supported: {}", ctx.mime_type))
        }
    }
}

/// An ordered sequence of validators, evaluated with short-circuit-on-failure.
#[derive(Default)]
pub struct ValidationChain {
    validators: Vec<Box<dyn Validator>>,
}

impl ValidationChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Run every validator in order; stop and return the first failure.
    pub fn validate_all(&self, content: &[u8], ctx: &ValidationContext<'_>) -> Result<(), String> {
        for validator in &self.validators {
            validator.validate(content, ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_validator_rejects_oversized() {
        let v = SizeValidator { max_bytes: 4 };
        let ctx = ValidationContext { mime_type: "text/plain" };
        assert!(v.validate(b"12345", &ctx).is_err());
        assert!(v.validate(b"1234", &ctx).is_ok());
    }

    #[test]
    fn mime_allowlist_empty_permits_all() {
        let v = MimeAllowlistValidator { allowed: vec![] };
        let ctx = ValidationContext { mime_type: "anything/at-all" };
        assert!(v.validate(b"", &ctx).is_ok());
    }

    #[test]
    fn mime_allowlist_matches_category_wildcard() {
        let v = MimeAllowlistValidator { allowed: vec!["image/*".to_string()] };
        let ok_ctx = ValidationContext { mime_type: "image/png" };
        let bad_ctx = ValidationContext { mime_type: "application/pdf" };
        assert!(v.validate(b"", &ok_ctx).is_ok());
        assert!(v.validate(b"", &bad_ctx).is_err());
    }

    #[test]
    fn chain_short_circuits_on_first_failure() {
        let chain = ValidationChain::new()
            .with(SizeValidator { max_bytes: 2 })
            .with(MimeAllowlistValidator { allowed: vec!["text/plain".to_string()] });
        let ctx = ValidationContext { mime_type: "application/pdf" };
        let err = chain.validate_all(b"12345", &ctx).unwrap_err();
        assert!(err.contains("too large"));
    }

    #[test]
    fn chain_passes_when_all_validators_pass() {
        let chain = ValidationChain::new()
            .with(SizeValidator { max_bytes: 1024 })
            .with(MimeAllowlistValidator { allowed: vec![] });
        let ctx = ValidationContext { mime_type: "text/plain" };
        assert!(chain.validate_all(b"hello", &ctx).is_ok());
    }
}
