use bytego::dispatcher::{Context, INTERNAL_ERROR_BODY, NOT_FOUND_BODY};
use bytego::middleware::{logger, recovery};
use bytego::{
    error_handler, handler, CancelSignal, CookieOptions, Handler, HttpError, InvalidCookieName,
    RequestId, Routes, SameSite,
};
use bytes::Bytes;
use http::header::{HeaderName, CONTENT_TYPE, LOCATION};
use http::{Method, Request, StatusCode};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mod common;
use common::{app, body_json, body_text, get, header, request, with_header};

type Trace = Arc<Mutex<Vec<String>>>;

/// Middleware recording entry and exit around `next`.
fn around(trace: &Trace, name: &'static str) -> Handler {
    let trace = Arc::clone(trace);
    handler(move |c| {
        trace.lock().push(format!("{name}>"));
        let result = c.next();
        trace.lock().push(format!("<{name}"));
        result
    })
}

/// Handler recording that it ran, without touching the chain.
fn mark(trace: &Trace, name: &'static str) -> Handler {
    let trace = Arc::clone(trace);
    handler(move |_| {
        trace.lock().push(name.to_string());
        Ok(())
    })
}

fn entries(trace: &Trace) -> Vec<String> {
    trace.lock().clone()
}

#[test]
fn test_chain_order_global_group_route() {
    let trace = Trace::default();
    let mut app = app();
    app.use_middleware([around(&trace, "global")]);
    {
        let mut api = app.group("/api", [around(&trace, "api")]);
        let mut v1 = api.group("/v1", [around(&trace, "v1")]);
        v1.route("GET", "/ping", [around(&trace, "route")], mark(&trace, "terminal"))
            .unwrap();
    }

    let res = app.serve(get("/api/v1/ping"));
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        entries(&trace),
        vec!["global>", "api>", "v1>", "route>", "terminal", "<route", "<v1", "<api", "<global"]
    );
}

#[test]
fn test_handler_without_next_does_not_stop_chain() {
    let trace = Trace::default();
    let mut app = app();
    app.get("/x", [mark(&trace, "a"), mark(&trace, "b"), mark(&trace, "c")])
        .unwrap();
    app.serve(get("/x"));
    assert_eq!(entries(&trace), vec!["a", "b", "c"]);
}

#[test]
fn test_abort_stops_downstream_handlers() {
    let trace = Trace::default();
    let cursor = Arc::new(Mutex::new(0isize));
    let seen = Arc::clone(&cursor);

    let mut app = app();
    app.use_middleware([around(&trace, "outer")]);
    app.get(
        "/secret",
        [
            handler(move |c| {
                c.abort_with_status(StatusCode::UNAUTHORIZED);
                *seen.lock() = c.index();
                c.next()
            }),
            mark(&trace, "terminal"),
        ],
    )
    .unwrap();

    let res = app.serve(get("/secret"));
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.body().is_empty());
    assert_eq!(entries(&trace), vec!["outer>", "<outer"]);
    assert!(*cursor.lock() >= Context::ABORT_INDEX);
}

#[test]
fn test_error_surfaces_unchanged_to_middleware() {
    let observed = Arc::new(Mutex::new(None::<HttpError>));
    let slot = Arc::clone(&observed);
    let trace = Trace::default();

    let mut app = app();
    app.use_middleware([handler(move |c| {
        let result = c.next();
        if let Err(err) = &result {
            *slot.lock() = err.downcast_ref::<HttpError>().cloned();
        }
        result
    })]);
    app.get(
        "/teapot",
        [
            handler(|_| Err(HttpError::new(StatusCode::IM_A_TEAPOT, "short and stout").with_code(4180).into())),
            mark(&trace, "after"),
        ],
    )
    .unwrap();

    let res = app.serve(get("/teapot"));
    assert_eq!(
        *observed.lock(),
        Some(HttpError::new(StatusCode::IM_A_TEAPOT, "short and stout").with_code(4180))
    );
    assert!(entries(&trace).is_empty());

    assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(header(&res, "content-type"), Some("application/json; charset=utf-8"));
    let body = body_json(&res);
    assert_eq!(body["code"], 4180);
    assert_eq!(body["msg"], "short and stout");
}

#[test]
fn test_middleware_can_suppress_error() {
    let mut app = app();
    app.use_middleware([handler(|c| {
        if c.next().is_err() {
            c.string(StatusCode::SERVICE_UNAVAILABLE, "degraded")?;
        }
        Ok(())
    })]);
    app.get("/flaky", [handler(|_| Err(anyhow::anyhow!("backend timeout")))])
        .unwrap();

    let res = app.serve(get("/flaky"));
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_text(&res), "degraded");
}

#[test]
fn test_error_handler_runs_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut app = app();
    app.set_error_handler(error_handler(move |err, c| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = c.string(StatusCode::BAD_GATEWAY, err.to_string());
    }));
    // Translates the error into a response and still returns it
    app.use_middleware([handler(|c| {
        let result = c.next();
        if let Err(err) = &result {
            c.handle_error(err);
            assert!(c.error_handled());
        }
        result
    })]);
    app.get("/boom", [handler(|_| Err(anyhow::anyhow!("upstream failed")))])
        .unwrap();

    let res = app.serve(get("/boom"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_text(&res), "upstream failed");
}

#[test]
fn test_error_after_commit_keeps_response() {
    let mut app = app();
    app.get(
        "/partial",
        [handler(|c| {
            c.string(StatusCode::OK, "partial")?;
            Err(anyhow::anyhow!("late failure"))
        })],
    )
    .unwrap();

    let res = app.serve(get("/partial"));
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_text(&res), "partial");
}

#[test]
fn test_swallowed_error_with_silent_handler_is_500() {
    let mut app = app();
    app.set_error_handler(error_handler(|_, _| {}));
    app.use_middleware([logger()]);
    app.get("/db", [handler(|_| Err(anyhow::anyhow!("db down")))])
        .unwrap();

    let res = app.serve(get("/db"));
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(&res), INTERNAL_ERROR_BODY);
    assert_eq!(header(&res, "content-type"), Some("text/plain; charset=utf-8"));
}

#[test]
fn test_recovered_panic_with_silent_handler_is_500() {
    let mut app = app();
    app.set_error_handler(error_handler(|_, _| {}));
    app.use_middleware([recovery()]);
    app.get("/panic", [handler(|_| panic!("boom"))]).unwrap();

    let res = app.serve(get("/panic"));
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(&res), INTERNAL_ERROR_BODY);
}

#[test]
fn test_percent_encoded_request_reaches_unicode_route() {
    let mut app = app();
    app.get("/wiki/東京", [handler(|c| c.string(StatusCode::OK, "tokyo"))])
        .unwrap();
    app.get("/a b", [handler(|c| c.string(StatusCode::OK, "space"))])
        .unwrap();

    let res = app.serve(get("/wiki/%E6%9D%B1%E4%BA%AC"));
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_text(&res), "tokyo");
    assert_eq!(body_text(&app.serve(get("/a%20b"))), "space");
}

#[test]
fn test_custom_not_found_not_double_written() {
    let mut app = app();
    app.no_route([handler(|c| {
        c.json(StatusCode::NOT_FOUND, &serde_json::json!({ "error": "nothing here" }))
    })]);

    let res = app.serve(get("/missing"));
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(&res), serde_json::json!({ "error": "nothing here" }));
}

#[test]
fn test_not_found_runs_global_middleware_then_default_body() {
    let trace = Trace::default();
    let mut app = app();
    app.use_middleware([around(&trace, "global")]);
    app.get("/exists", [mark(&trace, "exists")]).unwrap();

    let res = app.serve(get("/missing"));
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(&res), NOT_FOUND_BODY);
    assert_eq!(header(&res, "content-type"), Some("text/plain; charset=utf-8"));
    assert_eq!(entries(&trace), vec!["global>", "<global"]);

    // Wrong method is a miss as well
    let res = app.serve(request(Method::DELETE, "/exists"));
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_not_found_handler_sees_no_route() {
    let mut app = app();
    app.no_route([handler(|c| {
        assert!(c.route_template().is_none());
        assert_eq!(c.params().count(), 0);
        let path = c.path().to_string();
        c.string(StatusCode::NOT_FOUND, format!("no page at {path}"))
    })]);
    let res = app.serve(get("/a/b"));
    assert_eq!(body_text(&res), "no page at /a/b");
}

#[test]
fn test_context_accessors() {
    #[derive(Deserialize)]
    struct NewPet {
        name: String,
        age: u8,
    }

    let mut app = app();
    app.post(
        "/owners/:owner/pets",
        [handler(|c| {
            assert_eq!(c.route_template(), Some("/owners/:owner/pets"));
            assert_eq!(c.param("owner"), Some("ada lovelace"));
            assert_eq!(c.query("tag").as_deref(), Some("good dog"));
            assert_eq!(c.query("missing"), None);
            assert_eq!(c.content_type(), "application/json");
            assert_eq!(c.client_ip().as_deref(), Some("203.0.113.7"));
            let pet: NewPet = c.bind_json()?;
            let created = serde_json::json!({ "owner": c.param("owner"), "name": pet.name, "age": pet.age });
            c.json(StatusCode::CREATED, &created)
        })],
    )
    .unwrap();

    let req = Request::builder()
        .method(Method::POST)
        .uri("/owners/ada%20lovelace/pets?tag=good+dog")
        .header(CONTENT_TYPE, "application/json; charset=utf-8")
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .body(Bytes::from_static(br#"{"name":"Rex","age":3}"#))
        .unwrap();

    let res = app.serve(req);
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(
        body_json(&res),
        serde_json::json!({ "owner": "ada lovelace", "name": "Rex", "age": 3 })
    );
}

#[test]
fn test_form_reads_body_then_query() {
    let mut app = app();
    app.post(
        "/login",
        [handler(|c| {
            let user = c.form("user").unwrap_or_default();
            let next = c.form("next").unwrap_or_default();
            let missing = c.form("missing");
            assert!(missing.is_none());
            c.string(StatusCode::OK, format!("{user} -> {next}"))
        })],
    )
    .unwrap();

    let mut req = request(Method::POST, "/login?user=ignored&next=%2Fhome");
    *req.body_mut() = Bytes::from_static(b"user=ada+lovelace&pass=x%26y");
    let req = with_header(req, "content-type", "application/x-www-form-urlencoded");
    assert_eq!(body_text(&app.serve(req)), "ada lovelace -> /home");

    // A JSON body is not form data
    let mut req = request(Method::POST, "/login?user=from-query");
    *req.body_mut() = Bytes::from_static(br#"{"user":"json"}"#);
    let req = with_header(req, "content-type", "application/json");
    assert_eq!(body_text(&app.serve(req)), "from-query -> ");
}

#[test]
fn test_cookies_read_and_set() {
    let mut app = app();
    app.get(
        "/session",
        [handler(|c| {
            let theme = c.cookie("theme").unwrap_or("light").to_string();
            c.set_same_site(SameSite::Lax);
            c.set_cookie(
                "sid",
                "token value",
                &CookieOptions {
                    max_age: 600,
                    secure: true,
                    http_only: true,
                    ..CookieOptions::default()
                },
            )?;
            c.set_cookie("seen", "1", &CookieOptions::default())?;
            c.string(StatusCode::OK, theme)
        })],
    )
    .unwrap();

    let res = app.serve(with_header(get("/session"), "cookie", "lang=en; theme=dark"));
    assert_eq!(body_text(&res), "dark");
    let cookies: Vec<&str> = res
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    assert_eq!(
        cookies,
        [
            "sid=token+value; Path=/; Max-Age=600; HttpOnly; Secure; SameSite=Lax",
            "seen=1; Path=/; SameSite=Lax",
        ]
    );

    // SameSite does not carry over to the next request on a pooled context
    let res = app.serve(get("/session"));
    assert_eq!(body_text(&res), "light");
    assert!(res
        .headers()
        .get_all("set-cookie")
        .iter()
        .all(|v| !v.to_str().unwrap().contains("SameSite")));
}

#[test]
fn test_invalid_cookie_name_is_an_error() {
    let mut app = app();
    app.set_error_handler(error_handler(|err, c| {
        let invalid = err.downcast_ref::<InvalidCookieName>().is_some();
        let _ = c.string(StatusCode::BAD_REQUEST, invalid.to_string());
    }));
    app.get(
        "/bad",
        [handler(|c| c.set_cookie("bad;name", "v", &CookieOptions::default()))],
    )
    .unwrap();

    let res = app.serve(get("/bad"));
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(&res), "true");
    assert!(res.headers().get("set-cookie").is_none());
}

#[test]
fn test_bind_json_failure_is_bad_request() {
    let mut app = app();
    app.post(
        "/pets",
        [handler(|c| {
            let _: serde_json::Map<String, serde_json::Value> = c.bind_json()?;
            Ok(())
        })],
    )
    .unwrap();

    let res = app.serve(request(Method::POST, "/pets"));
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(&res);
    assert_eq!(body["code"], 400);
    assert!(body["msg"].as_str().unwrap().starts_with("invalid JSON body"));
}

#[test]
fn test_store_shared_between_handlers() {
    #[derive(Debug, PartialEq)]
    struct User {
        id: u32,
    }

    let mut app = app();
    app.use_middleware([handler(|c| {
        c.set("user", User { id: 7 });
        c.next()
    })]);
    app.get(
        "/me",
        [handler(|c| {
            let user = c.get::<User>("user").ok_or_else(|| HttpError::unauthorized("no user"))?;
            assert!(c.get::<String>("user").is_none());
            c.string(StatusCode::OK, format!("user {}", user.id))
        })],
    )
    .unwrap();

    assert_eq!(body_text(&app.serve(get("/me"))), "user 7");
}

#[test]
fn test_pooled_context_is_clean_on_reuse() {
    let mut app = app();
    app.get(
        "/first/:id",
        [handler(|c| {
            c.set("secret", "first request".to_string());
            c.set_header(HeaderName::from_static("x-first"), "1")?;
            c.string(StatusCode::ACCEPTED, "first")
        })],
    )
    .unwrap();
    app.get(
        "/second",
        [handler(|c| {
            assert!(c.get::<String>("secret").is_none());
            assert!(c.store().is_empty());
            assert_eq!(c.param("id"), None);
            assert_eq!(c.params().count(), 0);
            assert!(!c.response().committed());
            assert_eq!(c.response().size(), 0);
            assert!(c.response().headers().is_empty());
            assert!(!c.error_handled());
            Ok(())
        })],
    )
    .unwrap();

    let first = app.serve(get("/first/1"));
    assert_eq!(first.status(), StatusCode::ACCEPTED);
    let second = app.serve(get("/second"));
    assert_eq!(second.status(), StatusCode::OK);
    assert!(second.headers().get("x-first").is_none());
    assert!(second.body().is_empty());

    assert_eq!(app.context_pool().metrics().created(), 1);
    assert_eq!(app.context_pool().idle(), 1);
}

#[test]
fn test_status_written_once() {
    let mut app = app();
    app.get(
        "/twice",
        [handler(|c| {
            c.status(StatusCode::CREATED);
            c.status(StatusCode::INTERNAL_SERVER_ERROR);
            c.set_header(HeaderName::from_static("x-late"), "ignored")?;
            Ok(())
        })],
    )
    .unwrap();

    let res = app.serve(get("/twice"));
    assert_eq!(res.status(), StatusCode::CREATED);
    assert!(res.headers().get("x-late").is_none());
}

#[test]
fn test_redirect() {
    let mut app = app();
    app.get("/old", [handler(|c| c.redirect(StatusCode::MOVED_PERMANENTLY, "/new"))])
        .unwrap();
    app.get("/bad", [handler(|c| c.redirect(StatusCode::OK, "/new"))])
        .unwrap();

    let res = app.serve(get("/old"));
    assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.headers().get(LOCATION).unwrap(), "/new");

    let res = app.serve(get("/bad"));
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.headers().get(LOCATION).is_none());
}

#[test]
fn test_incoming_request_id_adopted() {
    let id = RequestId::new();
    let mut app = app();
    app.get(
        "/id",
        [handler(|c| {
            let id = c.request_id().map(|id| id.to_string()).unwrap_or_default();
            c.string(StatusCode::OK, id)
        })],
    )
    .unwrap();

    let res = app.serve(with_header(get("/id"), "x-request-id", &id.to_string()));
    assert_eq!(body_text(&res), id.to_string());

    let res = app.serve(with_header(get("/id"), "x-request-id", "not-a-ulid"));
    let fresh = body_text(&res);
    assert_ne!(fresh, "not-a-ulid");
    assert!(fresh.parse::<RequestId>().is_ok());
}

#[test]
fn test_cancellation_visible_to_handlers() {
    let mut app = app();
    app.get(
        "/slow",
        [handler(|c| {
            c.cancellation().check()?;
            c.string(StatusCode::OK, "done")
        })],
    )
    .unwrap();

    let live = CancelSignal::new();
    let res = app.serve_with_signal(get("/slow"), live.clone());
    assert_eq!(res.status(), StatusCode::OK);

    live.cancel();
    let res = app.serve_with_signal(get("/slow"), live);
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_head_and_any() {
    let mut app = app();
    app.any("/echo", [handler(|c| {
        let method = c.method().to_string();
        c.string(StatusCode::OK, method)
    })])
    .unwrap();

    for method in [Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::OPTIONS] {
        let res = app.serve(request(method.clone(), "/echo"));
        assert_eq!(body_text(&res), method.as_str());
    }
}
