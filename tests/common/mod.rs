#![allow(dead_code)]

use bytego::{App, RuntimeConfig};
use bytes::Bytes;
use http::{Method, Request, Response};

/// App with default settings, independent of the test environment.
pub fn app() -> App {
    App::with_config(RuntimeConfig::default())
}

pub fn request(method: Method, uri: &str) -> Request<Bytes> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}

pub fn get(uri: &str) -> Request<Bytes> {
    request(Method::GET, uri)
}

pub fn with_header(mut request: Request<Bytes>, name: &'static str, value: &str) -> Request<Bytes> {
    request
        .headers_mut()
        .insert(name, value.parse().unwrap());
    request
}

pub fn body_text(response: &Response<Bytes>) -> String {
    String::from_utf8(response.body().to_vec()).unwrap()
}

pub fn body_json(response: &Response<Bytes>) -> serde_json::Value {
    serde_json::from_slice(response.body()).unwrap()
}

pub fn header<'a>(response: &'a Response<Bytes>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}
