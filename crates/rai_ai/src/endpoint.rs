use rai_core::error::{codes, AppError};

/// A validated service base URL.
///
/// Remote endpoints must be `https://host[:port]`; plain `http://` is only accepted for
/// `127.0.0.1`/`localhost`, which is what local emulators and test doubles listen on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
}

impl Endpoint {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let base_url = raw.trim().trim_end_matches('/').to_string();
        let invalid = |why: &str| {
            AppError::new(codes::ENDPOINT_INVALID, format!("Endpoint URL {why}"))
                .with_details(format!("url={base_url}"))
        };

        let (scheme, rest) = base_url
            .split_once("://")
            .ok_or_else(|| invalid("must include a scheme"))?;
        if rest.contains(&['/', '?', '#', '@'][..]) {
            // Path, query, fragment and userinfo are all rejected: callers append API paths.
            return Err(invalid("must be a bare origin (scheme://host[:port])"));
        }

        let (host, port) = match rest.rsplit_once(':') {
            Some((h, p)) => (h, Some(p)),
            None => (rest, None),
        };
        if host.is_empty() || !host.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-') {
            return Err(invalid("has an invalid host"));
        }
        if let Some(p) = port {
            match p.parse::<u16>() {
                Ok(n) if n > 0 => {}
                _ => return Err(invalid("has an invalid port")),
            }
        }

        let local = host == "127.0.0.1" || host == "localhost";
        match scheme {
            "https" => {}
            "http" if local => {}
            "http" => return Err(invalid("must use https for remote hosts")),
            _ => return Err(invalid("must use http(s)")),
        }

        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `path` must start with `/`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
