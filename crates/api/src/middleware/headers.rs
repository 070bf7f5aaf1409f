use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};

/// Security headers applied to every response.
pub async fn common_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("deny"));
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("origin-when-cross-origin"),
    );

    response
}
