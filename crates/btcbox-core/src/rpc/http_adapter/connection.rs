use std::path::Path;

use reqwest::Url;

use crate::error::CoreError;

/// Build a connection string of the form
/// `scheme://[user[:password]@]host[:port]`.
///
/// Empty scheme or user parts are omitted, as is the password when no user
/// is given.
pub fn make_url(
    host: &str,
    scheme: Option<&str>,
    user: Option<&str>,
    password: Option<&str>,
    port: Option<u16>,
) -> String {
    let mut url = String::new();
    if let Some(scheme) = scheme.filter(|s| !s.is_empty()) {
        url.push_str(scheme);
        url.push_str("://");
    }
    if let Some(user) = user.filter(|u| !u.is_empty()) {
        url.push_str(user);
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            url.push(':');
            url.push_str(password);
        }
        url.push('@');
    }
    url.push_str(host);
    if let Some(port) = port {
        url.push(':');
        url.push_str(&port.to_string());
    }
    url
}

pub(super) fn resolve_auth(
    user: Option<&str>,
    pass: Option<&str>,
    cookie_file: Option<&Path>,
) -> Result<Option<(String, String)>, CoreError> {
    match (user, pass) {
        (Some(u), Some(p)) => return Ok(Some((u.to_owned(), p.to_owned()))),
        (Some(_), None) | (None, Some(_)) => {
            return Err(CoreError::Config(
                "both rpc user and rpc password must be set together".to_owned(),
            ));
        }
        (None, None) => {}
    }

    let Some(cookie_file) = cookie_file else {
        return Ok(None);
    };

    let content = std::fs::read_to_string(cookie_file).map_err(|e| {
        CoreError::Config(format!(
            "failed to read rpc cookie file {}: {e}",
            cookie_file.display()
        ))
    })?;
    let line = content
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .ok_or_else(|| {
            CoreError::Config(format!("rpc cookie file {} is empty", cookie_file.display()))
        })?;

    let (cookie_user, cookie_pass) = line.split_once(':').ok_or_else(|| {
        CoreError::Config(format!(
            "rpc cookie file {} must contain `username:password`",
            cookie_file.display()
        ))
    })?;
    if cookie_user.is_empty() || cookie_pass.is_empty() {
        return Err(CoreError::Config(format!(
            "rpc cookie file {} must contain non-empty `username:password`",
            cookie_file.display()
        )));
    }

    Ok(Some((cookie_user.to_owned(), cookie_pass.to_owned())))
}

pub(super) fn parse_connection(connection: &str) -> Result<Url, CoreError> {
    let parsed = Url::parse(connection).map_err(|e| {
        CoreError::Config(format!(
            "invalid connection `{connection}`: expected HTTP(S) URL ({e})"
        ))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(CoreError::Config(format!(
            "unsupported connection scheme `{other}`; expected http or https"
        ))),
    }
}
