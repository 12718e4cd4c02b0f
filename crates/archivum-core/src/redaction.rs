//! Sensitive-field redaction for audit details.
//!
//! Fields whose name is on [`SENSITIVE_FIELDS`] are removed, at any
//! depth, before audit details are persisted. Matching ignores ASCII
//! case.

use serde_json::Value;

pub const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "current_password",
    "old_password",
    "new_password",
    "password_confirmation",
    "confirm_password",
    "password_hash",
    "token",
    "access_token",
    "refresh_token",
    "id_token",
    "reset_token",
    "secret",
    "client_secret",
    "api_key",
    "authorization",
];

pub fn is_sensitive(field: &str) -> bool {
    SENSITIVE_FIELDS
        .iter()
        .any(|name| name.eq_ignore_ascii_case(field))
}

pub fn redact_sensitive(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !is_sensitive(key))
                .map(|(key, value)| (key, redact_sensitive(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(redact_sensitive).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_secrets_at_any_depth() {
        let details = json!({
            "username": "alice",
            "Password": "hunter2",
            "profile": { "refresh_token": "r", "email": "a@b.c" },
            "attempts": [{ "token": "t", "ok": true }],
        });

        assert_eq!(
            redact_sensitive(details),
            json!({
                "username": "alice",
                "profile": { "email": "a@b.c" },
                "attempts": [{ "ok": true }],
            })
        );
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(redact_sensitive(json!("password")), json!("password"));
        assert_eq!(redact_sensitive(Value::Null), Value::Null);
    }
}
