//! Connection address construction

use crate::traits::*;
use std::fmt;
use url::Url;

/// Query keys owned by the connector; pre-existing values are replaced
const RESERVED_KEYS: [&str; 3] = ["api_key", "app", "subscribeAll"];

/// Username and password for the event endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// `username:password`, as carried in the `api_key` parameter
    pub fn api_key(&self) -> String {
        format!("{}:{}", self.username, self.password)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Build the event stream address
///
/// Appends `api_key`, `app` (comma-joined) and `subscribeAll` to `base`,
/// keeping any other query parameters already present. `http`/`https`
/// bases are mapped to `ws`/`wss`.
pub fn build_connection_url(
    base: &str,
    apps: &[String],
    credentials: &Credentials,
    subscribe_all: bool,
) -> Result<Url> {
    if apps.is_empty() {
        return Err(SocketError::Configuration(
            "at least one application name is required".into(),
        ));
    }

    let mut url = Url::parse(base).map_err(|e| SocketError::InvalidUrl(format!("{}: {}", base, e)))?;

    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(SocketError::InvalidUrl(format!(
                "unsupported scheme '{}', expected ws or wss",
                other
            )))
        }
    };
    if url.scheme() != scheme && url.set_scheme(scheme).is_err() {
        return Err(SocketError::InvalidUrl(format!("cannot use scheme {} for {}", scheme, base)));
    }

    let preserved: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(preserved)
        .append_pair("api_key", &credentials.api_key())
        .append_pair("app", &apps.join(","))
        .append_pair("subscribeAll", if subscribe_all { "true" } else { "false" });

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn pairs(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    fn apps(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn embeds_credentials_apps_and_subscription() {
        let url = build_connection_url(
            "ws://localhost:8088/ari/events",
            &apps(&["myApp"]),
            &Credentials::new("foo", "bar"),
            true,
        )
        .unwrap();

        assert_eq!(url.path(), "/ari/events");
        let query = pairs(&url);
        assert_eq!(query["api_key"], "foo:bar");
        assert_eq!(query["app"], "myApp");
        assert_eq!(query["subscribeAll"], "true");
        assert_eq!(query.len(), 3);
    }

    #[test]
    fn joins_multiple_apps_with_commas() {
        let url = build_connection_url(
            "ws://localhost:8088/ari/events",
            &apps(&["app1", "app2", "app3"]),
            &Credentials::new("foo", "bar"),
            false,
        )
        .unwrap();

        let query = pairs(&url);
        assert_eq!(query["app"], "app1,app2,app3");
        assert_eq!(query["subscribeAll"], "false");
    }

    #[test]
    fn keeps_unrelated_query_parameters() {
        let url = build_connection_url(
            "ws://localhost:8088/ari/events?trace=1&app=stale",
            &apps(&["myApp"]),
            &Credentials::new("foo", "bar"),
            true,
        )
        .unwrap();

        let all: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(all[0], ("trace".to_string(), "1".to_string()));
        assert_eq!(all.iter().filter(|(k, _)| k == "app").count(), 1);
        assert_eq!(pairs(&url)["app"], "myApp");
    }

    #[test]
    fn maps_http_schemes_to_websocket() {
        let creds = Credentials::new("foo", "bar");
        let plain = build_connection_url("http://myserver:8088/ari/events", &apps(&["a"]), &creds, true).unwrap();
        let secure = build_connection_url("https://myserver/ari/events", &apps(&["a"]), &creds, true).unwrap();

        assert_eq!(plain.scheme(), "ws");
        assert_eq!(secure.scheme(), "wss");
    }

    #[test]
    fn rejects_bad_input() {
        let creds = Credentials::new("foo", "bar");
        assert!(matches!(
            build_connection_url("not a url", &apps(&["a"]), &creds, true),
            Err(SocketError::InvalidUrl(_))
        ));
        assert!(matches!(
            build_connection_url("ftp://host/ari", &apps(&["a"]), &creds, true),
            Err(SocketError::InvalidUrl(_))
        ));
        assert!(matches!(
            build_connection_url("ws://host/ari", &[], &creds, true),
            Err(SocketError::Configuration(_))
        ));
    }

    #[test]
    fn debug_output_hides_the_password() {
        let rendered = format!("{:?}", Credentials::new("foo", "secret"));
        assert!(rendered.contains("foo"));
        assert!(!rendered.contains("secret"));
    }
}
