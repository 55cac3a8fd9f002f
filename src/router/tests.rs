use super::{Router, Routes};
use crate::dispatcher::{handler, Handler};
use crate::error::RouteError;
use http::Method;
use std::sync::Arc;

fn noop() -> Handler {
    handler(|_| Ok(()))
}

fn router(routes: &[(&str, &str)]) -> Router {
    let mut router = Router::new();
    for (method, path) in routes {
        router.handle(method, path, [noop()]).unwrap();
    }
    router
}

#[test]
fn test_literal_route_has_no_params() {
    let router = router(&[("GET", "/"), ("GET", "/api/v1/health")]);
    let m = router.find(&Method::GET, "/api/v1/health").unwrap();
    assert!(m.params.is_empty());
    assert_eq!(&*m.template, "/api/v1/health");
    assert!(router.find(&Method::GET, "/").is_some());
}

#[test]
fn test_methods_do_not_share_trees() {
    let router = router(&[("GET", "/items/:id"), ("POST", "/items")]);
    assert!(router.find(&Method::GET, "/items/1").is_some());
    assert!(router.find(&Method::POST, "/items/1").is_none());
    assert!(router.find(&Method::GET, "/items").is_none());
    assert!(router.find(&Method::DELETE, "/items").is_none());
}

#[test]
fn test_params_are_percent_decoded() {
    let router = router(&[("GET", "/search/:term")]);
    let m = router.find(&Method::GET, "/search/caf%C3%A9%20au%20lait").unwrap();
    assert_eq!(m.params.get("term"), Some("café au lait"));
}

#[test]
fn test_undecodable_param_kept_raw() {
    let router = router(&[("GET", "/raw/:v")]);
    let m = router.find(&Method::GET, "/raw/%FF").unwrap();
    assert_eq!(m.params.get("v"), Some("%FF"));
}

#[test]
fn test_encoded_requests_reach_literal_routes() {
    let router = router(&[("GET", "/wiki/東京"), ("GET", "/a b"), ("GET", "/~docs/:page")]);

    let m = router.find(&Method::GET, "/wiki/%E6%9D%B1%E4%BA%AC").unwrap();
    assert_eq!(&*m.template, "/wiki/東京");
    assert!(router.find(&Method::GET, "/wiki/%e6%9d%b1%e4%ba%ac").is_some());
    assert_eq!(&*router.find(&Method::GET, "/a%20b").unwrap().template, "/a b");

    let m = router.find(&Method::GET, "/%7Edocs/%69ntro").unwrap();
    assert_eq!(m.params.get("page"), Some("intro"));
}

#[test]
fn test_encoded_slash_is_not_a_separator() {
    let router = router(&[("GET", "/a/b"), ("GET", "/files/:name")]);
    assert!(router.find(&Method::GET, "/a%2Fb").is_none());
    let m = router.find(&Method::GET, "/files/x%2fy").unwrap();
    assert_eq!(m.params.get("name"), Some("x/y"));
}

#[test]
fn test_encoded_and_raw_templates_collide() {
    let mut router = Router::new();
    router.get("/caf%C3%A9", [noop()]).unwrap();
    assert!(matches!(
        router.get("/café", [noop()]).err(),
        Some(RouteError::DuplicateRoute { .. })
    ));
}

#[test]
fn test_registration_validation() {
    let mut router = Router::new();
    assert_eq!(
        router.handle("", "/a", [noop()]).err(),
        Some(RouteError::EmptyMethod)
    );
    assert_eq!(
        router.handle("G ET", "/a", [noop()]).err(),
        Some(RouteError::InvalidMethod("G ET".to_string()))
    );
    assert_eq!(
        router.handle("GET", "a", [noop()]).err(),
        Some(RouteError::InvalidPath("a".to_string()))
    );
    assert!(matches!(
        router.handle("GET", "/a", Vec::<Handler>::new()),
        Err(RouteError::EmptyChain { .. })
    ));
    assert!(matches!(
        router.handle("GET", "/a/*p/b", [noop()]),
        Err(RouteError::WildcardNotLast(_))
    ));
    assert!(router.routes().is_empty());
}

#[test]
fn test_duplicate_route_rejected() {
    let mut router = router(&[("GET", "/users/:id")]);
    let err = router.handle("GET", "/users/:uid", [noop()]).err();
    assert_eq!(
        err,
        Some(RouteError::DuplicateRoute {
            method: "GET".to_string(),
            path: "/users/:uid".to_string(),
        })
    );
    // Same template under another method is fine
    assert!(router.handle("PUT", "/users/:id", [noop()]).is_ok());
}

#[test]
fn test_extension_method() {
    let router = router(&[("PURGE", "/cache/*key")]);
    let purge = Method::from_bytes(b"PURGE").unwrap();
    let m = router.find(&purge, "/cache/a/b").unwrap();
    assert_eq!(m.params.get("key"), Some("a/b"));
}

#[test]
fn test_max_params_watermark() {
    let mut router = router(&[("GET", "/a/:x")]);
    assert_eq!(router.max_params(), 1);
    router.get("/b/:x/:y/*z", [noop()]).unwrap();
    assert_eq!(router.max_params(), 3);
    router.get("/c", [noop()]).unwrap();
    assert_eq!(router.max_params(), 3);

    let m = router.find(&Method::GET, "/a/1").unwrap();
    assert!(m.params.capacity() >= 3);
}

#[test]
fn test_params_buffer_returns_to_pool() {
    let router = router(&[("GET", "/a/:x")]);
    for i in 0..10 {
        let path = format!("/a/{i}");
        let m = router.find(&Method::GET, &path).unwrap();
        assert_eq!(m.params.len(), 1);
    }
    let metrics = router.params_pool().metrics();
    assert_eq!(metrics.created(), 1);
    assert_eq!(metrics.in_use(), 0);
}

#[test]
fn test_global_middleware_prepended_at_registration() {
    let mut router = Router::new();
    router.get("/before", [noop()]).unwrap();
    router.use_middleware([noop(), noop()]);
    router.get("/after", [noop()]).unwrap();

    assert_eq!(router.find(&Method::GET, "/before").unwrap().handlers.len(), 1);
    assert_eq!(router.find(&Method::GET, "/after").unwrap().handlers.len(), 3);
}

#[test]
fn test_not_found_chain_rebuilt() {
    let mut router = Router::new();
    assert!(router.not_found_chain().is_none());

    let terminal = noop();
    router.no_route([Arc::clone(&terminal)]);
    assert_eq!(router.not_found_chain().map(|c| c.len()), Some(1));

    router.use_middleware([noop()]);
    let chain = router.not_found_chain().unwrap();
    assert_eq!(chain.len(), 2);
    assert!(Arc::ptr_eq(&chain[1], &terminal));
}

#[test]
fn test_any_registers_every_method() {
    let mut router = Router::new();
    router.any("/ping", [noop()]).unwrap();
    for method in &super::ANY_METHODS {
        assert!(router.find(method, "/ping").is_some(), "{method} not registered");
    }
}

#[test]
fn test_routes_sorted_listing() {
    let router = router(&[("POST", "/b"), ("GET", "/b"), ("GET", "/a/:id"), ("GET", "/a")]);
    let listed: Vec<(String, String)> = router
        .routes()
        .into_iter()
        .map(|(m, t)| (m.to_string(), t.to_string()))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("GET".to_string(), "/a".to_string()),
            ("GET".to_string(), "/a/:id".to_string()),
            ("GET".to_string(), "/b".to_string()),
            ("POST".to_string(), "/b".to_string()),
        ]
    );
    router.dump_routes();
}

#[test]
fn test_group_joins_paths_and_nests() {
    let mut router = Router::new();
    {
        let mut api = router.group("/api/", [noop()]);
        api.get("/users", [noop()]).unwrap();
        let mut v1 = api.group("v1", [noop()]);
        assert_eq!(v1.base_path(), "/api/v1");
        v1.get("/items/:id", [noop()]).unwrap();
    }

    let users = router.find(&Method::GET, "/api/users").unwrap();
    assert_eq!(users.handlers.len(), 2);
    let item = router.find(&Method::GET, "/api/v1/items/9").unwrap();
    assert_eq!(item.handlers.len(), 3);
    assert_eq!(&*item.template, "/api/v1/items/:id");
    assert_eq!(item.params.get("id"), Some("9"));
}
