//! Shared blocking HTTP helpers

use base64::Engine;
use std::io::Read;
use std::time::Duration;
use ureq::http::Response;
use ureq::Body;

/// Agent that turns 4xx/5xx into `ureq::Error::StatusCode`
pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build();
    config.into()
}

/// Agent that hands back every response so the caller can read error bodies
pub(crate) fn build_lenient_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    config.into()
}

/// Read a whole response body without the default size cap
pub(crate) fn read_bytes(response: Response<Body>) -> std::io::Result<Vec<u8>> {
    let mut reader = response.into_body().into_reader();
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(bytes)
}

pub(crate) fn read_text(response: &mut Response<Body>) -> String {
    response.body_mut().read_to_string().unwrap_or_default()
}

/// `Authorization` header value for HTTP Basic auth
pub(crate) fn basic_auth(username: &str, password: &str) -> String {
    let token =
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password));
    format!("Basic {}", token)
}

/// Encode a single file as a `multipart/form-data` body
pub(crate) fn multipart_body(
    boundary: &str,
    field: &str,
    filename: &str,
    content_type: &str,
    data: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_auth_header() {
        assert_eq!(basic_auth("user", "pass"), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_multipart_layout() {
        let body = multipart_body("XYZ", "files", "input.jpg", "image/jpeg", b"\xff\xd8\xff");
        let text = String::from_utf8_lossy(&body);
        assert!(text.starts_with("--XYZ\r\n"));
        assert!(text.contains("name=\"files\"; filename=\"input.jpg\""));
        assert!(text.contains("Content-Type: image/jpeg\r\n\r\n"));
        assert!(text.ends_with("\r\n--XYZ--\r\n"));
        assert!(body.windows(3).any(|w| w == b"\xff\xd8\xff"));
    }
}
