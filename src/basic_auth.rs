use actix_web::{HttpRequest, HttpResponse};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::BasicAuth;

/// Validate the Authorization header against the configured credentials.
/// With no credentials configured the dashboard is open.
pub fn check_basic_auth(req: &HttpRequest, auth: Option<&BasicAuth>) -> bool {
    let Some(config) = auth else {
        return true;
    };
    if let Some(auth_header) = req.headers().get("Authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(encoded) = auth_str.strip_prefix("Basic ") {
                if let Ok(decoded) = STANDARD.decode(encoded) {
                    if let Ok(credentials) = std::str::from_utf8(&decoded) {
                        let parts: Vec<&str> = credentials.splitn(2, ':').collect();
                        if parts.len() == 2
                            && parts[0] == config.username
                            && parts[1] == config.password
                        {
                            return true;
                        }
                    }
                }
            }
        }
    }
    false
}

pub fn unauthorized_response() -> HttpResponse {
    HttpResponse::Unauthorized()
        .append_header(("WWW-Authenticate", r#"Basic realm="Brigade""#))
        .finish()
}
