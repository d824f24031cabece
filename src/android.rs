//! JNI bindings for Android.
//!
//! These functions are called from Kotlin via the JNI bridge.

use jni::objects::{JClass, JString};
use jni::sys::jstring;
use jni::JNIEnv;

use crate::{debug_svg, format_json};

fn call_with_json(env: &mut JNIEnv, json: &JString, f: fn(&str) -> crate::Result<String>) -> jstring {
    let json: String = match env.get_string(json) {
        Ok(s) => s.into(),
        Err(_) => return std::ptr::null_mut(),
    };

    match f(&json) {
        Ok(out) => match env.new_string(&out) {
            Ok(js) => js.into_raw(),
            Err(_) => std::ptr::null_mut(),
        },
        Err(e) => {
            log::warn!("scoreformat: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Format a JSON measure description and return its layout as JSON.
///
/// Called from Kotlin as:
///   external fun formatJson(json: String): String?
#[no_mangle]
pub extern "system" fn Java_com_solobandultra_app_ScoreFormat_formatJson(
    mut env: JNIEnv,
    _class: JClass,
    json: JString,
) -> jstring {
    call_with_json(&mut env, &json, format_json)
}

/// Format a JSON measure description and return its debug SVG.
///
/// Called from Kotlin as:
///   external fun debugSvg(json: String): String?
#[no_mangle]
pub extern "system" fn Java_com_solobandultra_app_ScoreFormat_debugSvg(
    mut env: JNIEnv,
    _class: JClass,
    json: JString,
) -> jstring {
    call_with_json(&mut env, &json, debug_svg)
}
