use super::*;
use crate::domain::{
    EssOperationMode, EssState, GarageLightRequest, HoermannE4Command, LedStripeMode, QuickStatsResponse,
};
use serde_json::json;

fn sample_stats() -> QuickStatsResponse {
    QuickStatsResponse {
        power_import_watts: 1200,
        power_export_watts: 0,
        energy_price_cents: 31.5,
        outside_temperature: Some(4.5),
        battery_soc: None,
        updated_at_ms: 42,
    }
}

#[test]
fn subscribe_request_decodes_from_client_shape() {
    let text = r#"{"id":"1","kind":"rpcRequest","rpcRequest":{"type":"subscribe","subscribe":{"subscriptionId":"s1","type":"quickStatsEvents"}}}"#;

    let Inbound::Request { id, request } = decode_inbound(text).expect("envelope") else {
        panic!("expected request");
    };
    assert_eq!(id, "1");
    assert_eq!(
        request.expect("request"),
        RpcRequest::Subscribe {
            subscribe: Subscribe { subscription_id: "s1".into(), kind: SubscriptionType::QuickStatsEvents }
        }
    );
}

#[test]
fn unit_requests_decode_without_payload() {
    let text = r#"{"id":"7","kind":"rpcRequest","rpcRequest":{"type":"essRead"}}"#;
    let Inbound::Request { request, .. } = decode_inbound(text).expect("envelope") else {
        panic!("expected request");
    };
    assert_eq!(request.expect("request"), RpcRequest::EssRead);
}

#[test]
fn scalar_payload_field_uses_original_name() {
    let text = r#"{"id":"2","kind":"rpcRequest","rpcRequest":{"type":"garageVentilationRequest","garageVentilationCommandMilliVolts":3300}}"#;
    let Inbound::Request { request, .. } = decode_inbound(text).expect("envelope") else {
        panic!("expected request");
    };
    assert_eq!(
        request.expect("request"),
        RpcRequest::GarageVentilationRequest { garage_ventilation_command_milli_volts: 3300 }
    );
}

#[test]
fn led_stripe_requests_use_client_field_names() {
    let mode = r#"{"id":"3","kind":"rpcRequest","rpcRequest":{"type":"garageLightRequest","garageLightRequest":{"type":"setLedStripeMode","setLedStripeMode":"auto"}}}"#;
    let Inbound::Request { request, .. } = decode_inbound(mode).expect("envelope") else {
        panic!("expected request");
    };
    assert_eq!(
        request.expect("request"),
        RpcRequest::GarageLightRequest {
            garage_light_request: GarageLightRequest::SetLedStripeMode { led_stripe_mode: LedStripeMode::Auto }
        }
    );

    let low = r#"{"id":"4","kind":"rpcRequest","rpcRequest":{"type":"garageLightRequest","garageLightRequest":{"type":"setLedStripeLowMillivolts","ledStripeLowMillivolts":3000}}}"#;
    let Inbound::Request { request, .. } = decode_inbound(low).expect("envelope") else {
        panic!("expected request");
    };
    assert_eq!(
        request.expect("request"),
        RpcRequest::GarageLightRequest {
            garage_light_request: GarageLightRequest::SetLedStripeLowMillivolts { led_stripe_low_milli_volts: 3000 }
        }
    );
}

#[test]
fn missing_payload_field_is_reported_under_the_envelope_id() {
    let text = r#"{"id":"9","kind":"rpcRequest","rpcRequest":{"type":"sendHoermannE4Command"}}"#;
    let Inbound::Request { id, request } = decode_inbound(text).expect("envelope") else {
        panic!("expected request");
    };
    assert_eq!(id, "9");
    let err = request.expect_err("payload should be rejected");
    assert!(matches!(err, CodecError::InvalidRequest(_)));
    assert!(err.to_string().contains("hoermannE4Command"));
}

#[test]
fn missing_request_body_is_reported() {
    let text = r#"{"id":"3","kind":"rpcRequest"}"#;
    let Inbound::Request { request, .. } = decode_inbound(text).expect("envelope") else {
        panic!("expected request");
    };
    assert!(matches!(request, Err(CodecError::MissingRequest)));
}

#[test]
fn non_request_kinds_are_ignored() {
    let text = r#"{"id":"4","kind":"notify","notify":{"subscriptionId":"x"}}"#;
    let inbound = decode_inbound(text).expect("envelope");
    assert!(matches!(inbound, Inbound::Ignored { kind: Kind::Notify, .. }));
}

#[test]
fn unknown_kind_is_malformed() {
    let err = decode_inbound(r#"{"id":"5","kind":"telemetry"}"#).expect_err("unknown kind");
    assert!(matches!(err, CodecError::Malformed(_)));

    let err = decode_inbound("not json").expect_err("garbage");
    assert!(matches!(err, CodecError::Malformed(_)));
}

#[test]
fn response_shapes_carry_exactly_one_field() {
    let created = Envelope::response("1", ResponseBody::SubscriptionCreated(true).into());
    assert_eq!(
        serde_json::to_value(&created).expect("encode"),
        json!({"id": "1", "kind": "rpcResponse", "rpcResponse": {"subscriptionCreated": true}})
    );

    let ack = Envelope::response("2", ResponseBody::HoermannE4CommandResult(false).into());
    assert_eq!(
        serde_json::to_value(&ack).expect("encode")["rpcResponse"],
        json!({"hoermannE4CommandResult": false})
    );

    let empty = Envelope::response("3", RpcResponse::empty());
    assert_eq!(serde_json::to_value(&empty).expect("encode")["rpcResponse"], json!({}));

    let failed = Envelope::response("4", RpcResponse::failed("device unreachable"));
    assert_eq!(
        serde_json::to_value(&failed).expect("encode")["rpcResponse"],
        json!({"errorMsg": "device unreachable"})
    );
}

#[test]
fn responses_decode_back_to_the_right_variant() {
    let empty = decode(r#"{"id":"3","kind":"rpcResponse","rpcResponse":{}}"#).expect("decode");
    assert_eq!(empty.body, Body::RpcResponse { rpc_response: RpcResponse::empty() });

    let failed = decode(r#"{"id":"4","kind":"rpcResponse","rpcResponse":{"errorMsg":"nope"}}"#).expect("decode");
    let Body::RpcResponse { rpc_response } = failed.body else {
        panic!("expected response");
    };
    assert_eq!(rpc_response.error_msg(), Some("nope"));
    assert!(!rpc_response.is_success());

    let ess = EssState {
        operation_mode: EssOperationMode::Passthrough,
        soc: 55,
        soc_limit_from: 20,
        soc_limit_to: 90,
        grid_power_watts: 100,
        battery_power_watts: -50,
        updated_at_ms: 1,
    };
    let text = encode(&Envelope::response("5", ResponseBody::EssState(ess.clone()).into())).expect("encode");
    let decoded = decode(&text).expect("decode");
    assert_eq!(
        decoded.body,
        Body::RpcResponse { rpc_response: RpcResponse::Body(ResponseBody::EssState(ess)) }
    );
}

#[test]
fn notify_flattens_event_next_to_subscription_id() {
    let push = Envelope::notify("s1", NotifyEvent::QuickStatsResponse(sample_stats()));
    let value = serde_json::to_value(&push).expect("encode");

    assert_eq!(value["kind"], "notify");
    assert_eq!(value["notify"]["subscriptionId"], "s1");
    assert_eq!(value["notify"]["quickStatsResponse"]["powerImportWatts"], 1200);
    assert!(value["notify"]["quickStatsResponse"].get("batterySoc").is_none());
}

#[test]
fn every_notify_gets_a_fresh_id() {
    let a = Envelope::notify("s1", NotifyEvent::QuickStatsResponse(sample_stats()));
    let b = Envelope::notify("s1", NotifyEvent::QuickStatsResponse(sample_stats()));
    assert_ne!(a.id, b.id);
    assert_eq!(a.kind(), Kind::Notify);
}

#[test]
fn notify_event_maps_back_to_its_subscription_type() {
    let event = NotifyEvent::QuickStatsResponse(sample_stats());
    assert_eq!(event.subscription_type(), SubscriptionType::QuickStatsEvents);
    assert_eq!(SubscriptionType::QuickStatsEvents.to_string(), "quickStatsEvents");
}

#[test]
fn request_tags_match_wire_names() {
    let request = RpcRequest::SendHoermannE4Command { hoermann_e4_command: HoermannE4Command::Open };
    let value = serde_json::to_value(&request).expect("encode");
    assert_eq!(value["type"], request.tag());
    assert_eq!(value["hoermannE4Command"], "open");
}
