//! HTTP response handlers.

use anyhow::{Result, anyhow};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::generator::links::SITEMAP_FILE;

const XML: &str = "application/xml; charset=utf-8";
const JSON: &str = "application/json";
const PLAIN: &str = "text/plain; charset=utf-8";

pub fn respond_xml(request: Request, body: String) -> Result<()> {
    send_body(request, 200, XML, body.into_bytes())
}

pub fn respond_json(request: Request, body: &serde_json::Value) -> Result<()> {
    let body = serde_json::to_vec_pretty(body)?;
    send_body(request, 200, JSON, body)
}

/// 410 Gone: the requested checkpoint has been evicted.
///
/// The consumer has to resynchronize from the inventory, which the
/// `Link` header points at.
pub fn respond_gone(request: Request, message: &str) -> Result<()> {
    let body = format!("410 Gone\n{message}\nresynchronize from /{SITEMAP_FILE}\n");
    let response = Response::from_data(body.into_bytes())
        .with_status_code(StatusCode(410))
        .with_header(make_header("Content-Type", PLAIN)?)
        .with_header(make_header("Link", &format!("</{SITEMAP_FILE}>; rel=\"resourcelist\""))?);
    request.respond(response)?;
    Ok(())
}

pub fn respond_bad_request(request: Request, message: &str) -> Result<()> {
    let body = format!("400 Bad Request\n{message}\n");
    send_body(request, 400, PLAIN, body.into_bytes())
}

pub fn respond_not_found(request: Request) -> Result<()> {
    send_body(request, 404, PLAIN, b"404 Not Found".to_vec())
}

pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    send_body(request, 405, PLAIN, b"405 Method Not Allowed".to_vec())
}

/// Respond with 503 Service Unavailable (shutting down, or no inventory yet).
pub fn respond_unavailable(request: Request, message: &str) -> Result<()> {
    let body = format!("503 Service Unavailable\n{message}\n");
    send_body(request, 503, PLAIN, body.into_bytes())
}

pub fn is_read_request(request: &Request) -> bool {
    matches!(request.method(), Method::Get | Method::Head)
}

fn send_body(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    if request.method() == &Method::Head {
        let response = Response::empty(StatusCode(status))
            .with_header(make_header("Content-Type", content_type)?);
        request.respond(response)?;
        return Ok(());
    }

    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type)?);
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &str, value: &str) -> Result<Header> {
    Header::from_bytes(key, value).map_err(|()| anyhow!("invalid header `{key}: {value}`"))
}
