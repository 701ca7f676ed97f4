//! Browser tests
//!
//! Run with `wasm-pack test --headless --firefox` (or chrome). Guests are
//! assembled by hand so the tests need no guest toolchain.

#![cfg(target_arch = "wasm32")]

use huehost::config::HostConfig;
use huehost::driver::{DriverState, StopReason, TickOutcome};
use huehost::guest::{LoadError, TickError};
use huehost::runtime::{pad_value, Host, StartError};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

// =============================================================================
// Guest assembly
// =============================================================================

fn leb(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

fn name(out: &mut Vec<u8>, s: &str) {
    leb(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

fn section(out: &mut Vec<u8>, id: u8, content: &[u8]) {
    out.push(id);
    leb(out, content.len() as u32);
    out.extend_from_slice(content);
}

/// `draw_frame(frame)`: writes `color` at `offset` and reports `report`
///
/// `callback_params` is the number of i32 params the callback import is
/// declared with (1 is correct).
fn guest(callback_params: usize, offset: u8, color: [u8; 3], report: u32) -> Vec<u8> {
    let mut out = vec![0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];

    // Types: 0 = callback, 1 = draw_frame (i32) -> ()
    let mut types = vec![0x02, 0x60];
    leb(&mut types, callback_params as u32);
    types.extend(std::iter::repeat_n(0x7F, callback_params));
    types.extend_from_slice(&[0x00, 0x60, 0x01, 0x7F, 0x00]);
    section(&mut out, 0x01, &types);

    let mut imports = vec![0x01];
    name(&mut imports, "env");
    name(&mut imports, "jsSetBackgroundColor");
    imports.extend_from_slice(&[0x00, 0x00]);
    section(&mut out, 0x02, &imports);

    section(&mut out, 0x03, &[0x01, 0x01]);
    section(&mut out, 0x05, &[0x01, 0x00, 0x01]);

    let mut exports = vec![0x02];
    name(&mut exports, "memory");
    exports.extend_from_slice(&[0x02, 0x00]);
    name(&mut exports, "draw_frame");
    exports.extend_from_slice(&[0x00, 0x01]);
    section(&mut out, 0x07, &exports);

    let mut body = vec![0x00]; // no locals
    for (i, &c) in color.iter().enumerate() {
        body.extend_from_slice(&[0x41, offset + i as u8]); // i32.const addr
        body.push(0x41); // i32.const value (signed LEB)
        if c >= 0x40 {
            body.extend_from_slice(&[0x80 | (c & 0x7F), c >> 7]);
        } else {
            body.push(c);
        }
        body.extend_from_slice(&[0x3A, 0x00, 0x00]); // i32.store8
    }
    body.push(0x41); // i32.const report (signed LEB, may be multi-byte)
    let mut v = report as i32;
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        if (v == 0 && byte & 0x40 == 0) || (v == -1 && byte & 0x40 != 0) {
            body.push(byte);
            break;
        }
        body.push(byte | 0x80);
    }
    body.extend_from_slice(&[0x10, 0x00, 0x0B]); // call 0, end

    let mut code = vec![0x01];
    leb(&mut code, body.len() as u32);
    code.extend_from_slice(&body);
    section(&mut out, 0x0A, &code);

    out
}

fn config() -> HostConfig {
    HostConfig::from_json(
        r#"{ "frameExport": "draw_frame", "totalSteps": null, "labelFormat": "css" }"#,
    )
    .unwrap()
}

/// Fresh page state: unstyled body, empty label
fn reset_page() -> web_sys::Element {
    let document = web_sys::window().unwrap().document().unwrap();
    let body = document.body().unwrap();
    body.style().remove_property("background-color").unwrap();

    let label = match document.get_element_by_id("color") {
        Some(el) => el,
        None => {
            let el = document.create_element("span").unwrap();
            el.set_id("color");
            body.append_child(&el).unwrap();
            el
        }
    };
    label.set_text_content(Some(""));
    label
}

fn background() -> String {
    let body = web_sys::window().unwrap().document().unwrap().body().unwrap();
    body.style().get_property_value("background-color").unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[wasm_bindgen_test]
async fn frame_zero_paints_red() {
    let label = reset_page();
    let mut host = Host::instantiate(&config(), &guest(1, 16, [255, 0, 0], 16))
        .await
        .unwrap();

    // Loading alone must not touch the page
    assert_eq!(background(), "");
    assert_eq!(label.text_content().unwrap(), "");

    assert_eq!(host.tick(), TickOutcome::Continue);
    assert_eq!(background(), "rgb(255, 0, 0)");
    assert_eq!(label.text_content().unwrap(), "rgb(255, 0, 0)");
    assert_eq!(host.driver().frame(), 1);

    let handle = host.handle();
    assert_eq!(handle.color().as_deref(), Some("rgb(255, 0, 0)"));
}

#[wasm_bindgen_test]
async fn stopped_host_does_not_tick() {
    let label = reset_page();
    let mut host = Host::instantiate(&config(), &guest(1, 16, [255, 0, 0], 16))
        .await
        .unwrap();

    host.handle().stop();
    assert_eq!(host.tick(), TickOutcome::Halt);
    assert_eq!(
        host.driver().state(),
        &DriverState::Stopped(StopReason::Cancelled)
    );
    assert_eq!(host.driver().frame(), 0);
    assert_eq!(background(), "");
    assert_eq!(label.text_content().unwrap(), "");
}

#[wasm_bindgen_test]
async fn padded_label() {
    let label = reset_page();
    let config = HostConfig {
        label_format: huehost::color::LabelFormat::Padded,
        ..config()
    };
    let mut host = Host::instantiate(&config, &guest(1, 0, [7, 42, 255], 0))
        .await
        .unwrap();

    host.tick();
    assert_eq!(background(), "rgb(7, 42, 255)");
    assert_eq!(label.text_content().unwrap(), "rgb(007, 042, 255)");
}

#[wasm_bindgen_test]
async fn mismatched_import_never_runs() {
    let label = reset_page();
    let result = Host::instantiate(&config(), &guest(2, 16, [255, 0, 0], 16)).await;

    match result {
        Err(StartError::Load(LoadError::ImportSignatureMismatch { name, .. })) => {
            assert_eq!(name, "jsSetBackgroundColor")
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("mismatched guest was instantiated"),
    }
    assert_eq!(background(), "");
    assert_eq!(label.text_content().unwrap(), "");
}

#[wasm_bindgen_test]
async fn out_of_bounds_report_stops_driver() {
    let label = reset_page();
    let mut host = Host::instantiate(&config(), &guest(1, 0, [1, 2, 3], 65534))
        .await
        .unwrap();

    assert_eq!(host.tick(), TickOutcome::Halt);
    match host.driver().state() {
        DriverState::Stopped(StopReason::TickFailed(TickError::Bounds(e))) => {
            assert_eq!(e.address, 65534);
            assert_eq!(e.memory_size, 65536);
        }
        other => panic!("unexpected state {:?}", other),
    }
    assert_eq!(background(), "");
    assert_eq!(label.text_content().unwrap(), "");
}

#[wasm_bindgen_test]
async fn missing_label_element_fails_start() {
    reset_page();
    let config = HostConfig {
        label_selector: "#does-not-exist".to_string(),
        ..config()
    };
    let result = Host::instantiate(&config, &guest(1, 0, [0, 0, 0], 0)).await;
    assert!(matches!(result, Err(StartError::Platform(_))));
}

#[wasm_bindgen_test]
fn pad_value_errors() {
    assert_eq!(pad_value(JsValue::from(5)).unwrap(), "005");

    let err = pad_value(JsValue::from_str("5")).unwrap_err();
    assert!(err.is_instance_of::<js_sys::TypeError>());

    let err = pad_value(JsValue::from(256)).unwrap_err();
    assert!(err.is_instance_of::<js_sys::RangeError>());

    let err = pad_value(JsValue::from(-1)).unwrap_err();
    assert!(err.dyn_ref::<js_sys::RangeError>().is_some());
}
