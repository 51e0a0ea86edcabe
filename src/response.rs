//! The validation step every JSON response goes through before an operation looks at it.

use crate::{Client, Error};
use reqwest::{Method, Response};
use serde_json::Value;

/// Prefix the service puts in front of JSON bodies to keep them from being evaluated as scripts.
const GUARD: &str = "for (;;);";

/// `error` code meaning the session cookies are no longer valid.
pub(crate) const NOT_LOGGED_IN: i64 = 1_357_001;

const MAX_REDIRECTS: usize = 5;

/// Validates `response` and returns its parsed body.
///
/// The body is `null` when the service sent nothing. Redirects embedded in the body are followed
/// for GET requests only.
pub(crate) async fn check(
    client: &Client,
    method: &Method,
    mut response: Response,
) -> Result<Value, Error> {
    let mut hops = 0;
    loop {
        let body = response.error_for_status()?.text().await?;
        let value = parse_body(&body)?;
        inspect(client, &value)?;

        match redirect_target(&value) {
            Some(target) if *method == Method::GET && hops < MAX_REDIRECTS => {
                hops += 1;
                let target = client.base_url.join(target)?;
                tracing::info!(%target, hops, "following redirect");
                response = client.client.get(target).send().await?;
            }
            _ => return Ok(value),
        }
    }
}

/// Applies cookies carried in the body and rejects responses that mean the session has expired.
pub(crate) fn inspect(client: &Client, value: &Value) -> Result<(), Error> {
    if let Some(cookie) = jsmods_cookie(value) {
        client.set_cookie(&cookie);
    }
    if login_required(value) {
        tracing::warn!("session is not logged in");
        return Err(Error::NotLoggedIn);
    }
    Ok(())
}

/// Parses a response body. Several concatenated JSON documents become one array.
pub(crate) fn parse_body(body: &str) -> Result<Value, serde_json::Error> {
    let body = body.trim_start();
    let body = body.strip_prefix(GUARD).unwrap_or(body).trim();
    if body.is_empty() {
        return Ok(Value::Null);
    }
    let mut values = serde_json::Deserializer::from_str(body)
        .into_iter::<Value>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(if values.len() == 1 {
        values.remove(0)
    } else {
        Value::Array(values)
    })
}

fn redirect_target(value: &Value) -> Option<&str> {
    value.get("redirect").and_then(Value::as_str)
}

fn login_required(value: &Value) -> bool {
    value.get("error").and_then(Value::as_i64) == Some(NOT_LOGGED_IN)
        || redirect_target(value)
            .map_or(false, |target| target.contains("/login") || target.contains("login.php"))
}

/// Reads a `["Cookie", "setCookie", [], [name, value, max_age, path, ...]]` module call.
fn jsmods_cookie(value: &Value) -> Option<String> {
    let call = value.pointer("/jsmods/require/0")?.as_array()?;
    if call.first()?.as_str()? != "Cookie" {
        return None;
    }
    let args = call.get(3)?.as_array()?;
    let name = args.first()?.as_str()?.replacen("_js_", "", 1);
    let value = args.get(1)?.as_str()?;
    let path = args.get(3).and_then(Value::as_str).unwrap_or("/");
    Some(format!("{name}={value}; Path={path}"))
}
