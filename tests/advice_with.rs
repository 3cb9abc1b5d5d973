use routeweave::{Engine, EngineBuilder, RouteBuilder, RouteError, StepsDsl};

fn engine_with_route() -> Engine {
    let engine = EngineBuilder::new().build().unwrap();
    engine.add_route(RouteBuilder::from("direct:start").route_id("r1").to("mock:foo").id("foo").to("mock:bar").to("mock:result")).unwrap();
    engine
}

fn history_labels(engine: &Engine) -> Vec<String> {
    let exchanges = engine.mock_endpoint("mock:result").unwrap().received_exchanges();
    exchanges[0].history().iter().map(|h| h.label.clone()).collect()
}

#[tokio::test]
async fn weave_by_id_before_runs_first() {
    let engine = engine_with_route();
    engine
        .advice_with("r1", |a| {
            a.weave_by_id("foo").before(|s| s.to("mock:before"))?;
            a.weave_by_id("foo").after(|s| s.to("mock:after"))
        })
        .unwrap();
    engine.start().unwrap();

    for _ in 0..2 {
        engine.producer_template().send_body("direct:start", "Hello World").await.unwrap();
    }

    assert_eq!(history_labels(&engine), vec!["mock:before", "mock:foo", "mock:after", "mock:bar", "mock:result"]);
    assert_eq!(engine.mock_endpoint("mock:before").unwrap().received_counter(), 2);
}

#[tokio::test]
async fn weave_by_to_string_replace_with_multicast() {
    let engine = engine_with_route();
    engine.advice_with("r1", |a| a.weave_by_to_string(".*bar.*").replace(|s| s.multicast(|m| m.to("mock:a").to("mock:b")))).unwrap();
    engine.start().unwrap();

    let bar = engine.mock_endpoint("mock:bar").unwrap();
    bar.expected_message_count(0);
    for uri in ["mock:a", "mock:b", "mock:result"] {
        engine.mock_endpoint(uri).unwrap().expected_bodies_received(&["Hello World"]);
    }

    engine.producer_template().send_body("direct:start", "Hello World").await.unwrap();

    for uri in ["mock:a", "mock:b", "mock:result"] {
        engine.mock_endpoint(uri).unwrap().assert_is_satisfied().await.unwrap();
    }
    bar.assert_is_satisfied().await.unwrap();
}

#[tokio::test]
async fn weave_remove_leaves_no_endpoint() {
    let engine = engine_with_route();
    engine.advice_with("r1", |a| a.weave_by_to_string("mock:bar").remove()).unwrap();
    engine.start().unwrap();

    engine.producer_template().send_body("direct:start", "Hello World").await.unwrap();

    assert!(!engine.has_endpoint("mock:bar"));
    assert_eq!(history_labels(&engine), vec!["mock:foo", "mock:result"]);
    let definition = engine.route_definition("r1").unwrap();
    assert!(definition.outputs().iter().all(|n| !n.to_string().contains("mock:bar")));
}

#[tokio::test]
async fn weave_remove_on_running_route_releases_endpoint() {
    let engine = engine_with_route();
    engine.start().unwrap();
    assert!(engine.has_endpoint("mock:bar"));

    engine.advice_with("r1", |a| a.weave_by_to_uri("mock:bar").remove()).unwrap();
    assert!(!engine.has_endpoint("mock:bar"));

    engine.producer_template().send_body("direct:start", "Hello World").await.unwrap();
    assert_eq!(engine.mock_endpoint("mock:result").unwrap().received_counter(), 1);
}

#[tokio::test]
async fn weave_add_first_and_last() {
    let engine = engine_with_route();
    engine
        .advice_with("r1", |a| {
            a.weave_add_first(|s| s.to("mock:first"))?;
            a.weave_add_last(|s| s.to("mock:last"))
        })
        .unwrap();
    engine.start().unwrap();
    engine.producer_template().send_body("direct:start", "Hello World").await.unwrap();

    let last = engine.mock_endpoint("mock:last").unwrap().received_exchanges();
    let labels: Vec<String> = last[0].history().iter().map(|h| h.label.clone()).collect();
    assert_eq!(labels, vec!["mock:first", "mock:foo", "mock:bar", "mock:result", "mock:last"]);
}

#[tokio::test]
async fn unmatched_selector_keeps_route_untouched() {
    let engine = engine_with_route();
    let before = engine.route_definition("r1").unwrap();

    let err = engine
        .advice_with("r1", |a| {
            a.weave_by_to_uri("mock:foo").replace(|s| s.to("mock:changed"))?;
            a.weave_by_to_string("kafka").remove()
        })
        .unwrap_err();

    assert!(matches!(err, RouteError::IllegalArgument(ref m) if m.contains("kafka") && m.contains("r1")));
    assert_eq!(engine.route_definition("r1").unwrap(), before);
}

#[tokio::test]
async fn unknown_weave_id_is_illegal_argument() {
    let engine = engine_with_route();
    let err = engine.advice_with("r1", |a| a.weave_by_id("missing").remove()).unwrap_err();
    assert!(matches!(err, RouteError::IllegalArgument(ref m) if m.contains("missing") && m.contains("r1")));
    assert_eq!(engine.route_ids(), vec!["r1"]);
}

#[tokio::test]
async fn replace_from_with_valid_endpoint() {
    let engine = engine_with_route();
    engine.advice_with("r1", |a| {
        a.replace_from_with("direct:test");
        Ok(())
    })
    .unwrap();
    engine.start().unwrap();

    let err = engine.producer_template().send_body("direct:start", "Hello World").await.unwrap_err();
    assert!(matches!(err, RouteError::NoConsumer(_)));

    engine.producer_template().send_body("direct:test", "Hello World").await.unwrap();
    let result = engine.mock_endpoint("mock:result").unwrap();
    assert_eq!(result.received_bodies(), vec!["Hello World"]);
    assert_eq!(result.received_exchanges()[0].from_endpoint(), Some("direct:test"));
}

#[tokio::test]
async fn replace_from_with_invalid_endpoint_fails() {
    let engine = engine_with_route();

    for _ in 0..2 {
        let err = engine
            .advice_with("r1", |a| {
                a.replace_from_with("invalid:scheme");
                Ok(())
            })
            .unwrap_err();
        match err {
            RouteError::FailedToCreateRoute {
                route_id,
                cause,
            } => {
                assert_eq!(route_id, "r1");
                assert!(matches!(*cause, RouteError::ResolveEndpointFailed { ref uri, .. } if uri == "invalid:scheme"));
            }
            other => panic!("unexpected error: {other}"),
        }
        // the failed route is gone, a second attempt fails the same way
        engine.add_route(RouteBuilder::from("direct:start").route_id("r1").to("mock:foo").id("foo").to("mock:bar").to("mock:result")).unwrap();
    }

    engine.remove_route("r1").unwrap();
    engine
        .advice_with("r1", |_| Ok(()))
        .map(|_| ())
        .expect_err("route was removed");
    assert!(engine.route_ids().is_empty());
}

#[tokio::test]
async fn failed_advice_leaves_no_endpoint_behind() {
    let engine = engine_with_route();
    engine.start().unwrap();

    let err = engine.advice_with("r1", |a| a.weave_add_last(|s| s.to("mock:leak").to("invalid:x"))).unwrap_err();
    assert!(matches!(err, RouteError::FailedToCreateRoute { .. }));
    assert!(engine.route_ids().is_empty());
    for uri in ["mock:leak", "mock:foo", "mock:result", "direct:start"] {
        assert!(!engine.has_endpoint(uri), "{} is still registered", uri);
    }
}

#[tokio::test]
async fn intercept_send_to_endpoint_skips_original() {
    let engine = engine_with_route();
    engine
        .advice_with("r1", |a| {
            a.intercept_send_to_endpoint("mock:bar").skip_send_to_original_endpoint().steps(|s| s.to("mock:detour"));
            Ok(())
        })
        .unwrap();
    engine.start().unwrap();
    engine.producer_template().send_body("direct:start", "Hello World").await.unwrap();

    assert_eq!(engine.mock_endpoint("mock:bar").unwrap().received_counter(), 0);
    assert_eq!(engine.mock_endpoint("mock:detour").unwrap().received_counter(), 1);
    assert_eq!(engine.mock_endpoint("mock:result").unwrap().received_counter(), 1);
}

#[tokio::test]
async fn mock_endpoints_and_skip() {
    let engine = EngineBuilder::new().build().unwrap();
    engine.add_route(RouteBuilder::from("direct:start").route_id("r1").to("seda:audit").to("mock:result")).unwrap();
    engine
        .advice_with("r1", |a| {
            a.mock_endpoints_and_skip("seda:*");
            Ok(())
        })
        .unwrap();
    engine.start().unwrap();
    engine.producer_template().send_body("direct:start", "Hello World").await.unwrap();

    let mocked = engine.mock_endpoint("mock:seda:audit").unwrap();
    mocked.expected_bodies_received(&["Hello World"]);
    mocked.assert_is_satisfied().await.unwrap();
    assert_eq!(engine.mock_endpoint("mock:result").unwrap().received_counter(), 1);
}
