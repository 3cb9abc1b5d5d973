use routeweave::{
    Body, Engine, EngineBuilder, RouteBuilder, StepsDsl,
    tracer::{TraceDirection, TraceFormatter},
};

fn two_hop_engine(trace_out: bool) -> Engine {
    let engine = EngineBuilder::new().tracing(true).trace_out_exchanges(trace_out).build().unwrap();
    engine.add_route(RouteBuilder::from("direct:start").route_id("r1").to("mock:a").to("mock:b")).unwrap();
    engine.start().unwrap();
    engine
}

#[tokio::test]
async fn completion_mode_traces_once_per_hop() {
    let engine = two_hop_engine(false);
    engine.producer_template().send_body("direct:start", "Hello World").await.unwrap();

    let tracer = engine.tracer();
    let events = tracer.backlog().dump_all();
    assert_eq!(events.len(), 2);

    let formatter = tracer.formatter();
    for event in &events {
        assert_eq!(event.direction, TraceDirection::Complete);
        assert!(formatter.format(event).starts_with("Complete:"));
    }
    assert_eq!(events[0].to_node, "mock:a");
    assert_eq!(events[1].previous_node, "mock:a");
    assert_eq!(events[1].to_node, "mock:b");
    assert_eq!(events[1].body, "Hello World");
}

#[tokio::test]
async fn out_mode_traces_in_out_pair_per_hop() {
    let engine = two_hop_engine(true);
    engine.producer_template().send_body("direct:start", "Hello World").await.unwrap();

    let tracer = engine.tracer();
    let lines: Vec<String> = tracer.backlog().dump_all().iter().map(|e| tracer.formatter().format(e)).collect();
    let prefixes: Vec<&str> = lines.iter().map(|l| l.split(':').next().unwrap_or_default()).collect();
    assert_eq!(prefixes, vec!["In", "Out", "In", "Out"]);
    assert!(lines[2].contains("mock:a --> mock:b"));
}

#[tokio::test]
async fn trace_events_are_sent_to_destination() {
    let engine = EngineBuilder::new().tracing(true).trace_destination("mock:traced").build().unwrap();
    engine.add_route(RouteBuilder::from("direct:start").route_id("r1").to("mock:a").to("mock:b")).unwrap();
    engine.start().unwrap();

    let traced = engine.mock_endpoint("mock:traced").unwrap();
    traced.expected_message_count(2);
    engine.producer_template().send_body("direct:start", "Hello World").await.unwrap();
    traced.assert_is_satisfied().await.unwrap();

    let exchanges = traced.received_exchanges();
    let Body::Json(event) = exchanges[0].body() else {
        panic!("trace event body is not JSON");
    };
    assert_eq!(event["to_node"], "mock:a");
    assert_eq!(event["route_id"], "r1");

    // the original exchange is untouched
    let original = engine.mock_endpoint("mock:b").unwrap().received_exchanges();
    assert_eq!(original[0].body_text().as_deref(), Some("Hello World"));
}

#[tokio::test]
async fn tracing_can_be_toggled_at_runtime() {
    let engine = two_hop_engine(false);
    let tracer = engine.tracer();

    tracer.set_enabled(false);
    engine.producer_template().send_body("direct:start", "quiet").await.unwrap();
    assert!(tracer.backlog().dump_all().is_empty());

    tracer.set_enabled(true);
    engine.producer_template().send_body("direct:start", "loud").await.unwrap();
    assert_eq!(tracer.backlog().dump_traced_messages("to2").len(), 1);
}
