use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Naming tokens embed into rule-engine group names and request paths,
    // so the accepted alphabet stays deliberately narrow.
    static ref TOKEN_RE: Regex = Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9\-_]*$").unwrap();
}

/// Validate a naming token (a tenant, namespace, group, team, or template
/// name). `entity` names the kind of token for error reporting.
pub fn validate_token(entity: &'static str, token: &str) -> Result<(), crate::Error> {
    if token.is_empty() {
        return Err(crate::Error::NameEmpty { entity });
    } else if !TOKEN_RE.is_match(token) {
        return Err(crate::Error::NameInvalid {
            entity,
            name: token.to_string(),
        });
    }
    Ok(())
}
