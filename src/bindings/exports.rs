//! Native method symbols.
//!
//! Each call blocks its JVM thread until the runtime returns. Lifecycle failures
//! other than initialize have no channel back to Kotlin, so they are only logged.

use std::ffi::c_void;
use std::sync::OnceLock;

use jni::JNIEnv;
use jni::objects::{GlobalRef, JObject};
use jni::sys::{JNI_FALSE, JNI_TRUE, JNI_VERSION_1_6, jboolean, jint, jobject};
use log::{error, warn};

use crate::bindings::head_pose::{HEAD_POSE_CLASS, new_head_pose};
use crate::engine::{EngineError, EngineResult, PlatformContext, runtime};
use crate::utils::logger;

/// Application context from the first initialize. The NDK context built from it
/// lives for the whole process, so the reference is never released.
static APP_CONTEXT: OnceLock<GlobalRef> = OnceLock::new();

#[unsafe(no_mangle)]
pub extern "system" fn JNI_OnLoad(_vm: *mut jni::sys::JavaVM, _reserved: *mut c_void) -> jint {
    logger::init();
    JNI_VERSION_1_6
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_infra_xrphone_XrPhone_initOpenXrAndVulkanNative<'local>(
    env: JNIEnv<'local>,
    _this: JObject<'local>,
    context: JObject<'local>,
) -> jboolean {
    logger::init();

    let result = platform_context(&env, &context).and_then(|ctx| runtime::initialize(&ctx));
    match result {
        Ok(()) => JNI_TRUE,
        Err(e) => {
            error!("initOpenXrAndVulkanNative failed: {}", e);
            JNI_FALSE
        }
    }
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_infra_xrphone_XrPhone_resumeOpenXrNative<'local>(
    _env: JNIEnv<'local>,
    _this: JObject<'local>,
) {
    log_failure("resumeOpenXrNative", runtime::resume());
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_infra_xrphone_XrPhone_pauseOpenXrNative<'local>(
    _env: JNIEnv<'local>,
    _this: JObject<'local>,
) {
    log_failure("pauseOpenXrNative", runtime::pause());
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_infra_xrphone_XrPhone_shutdownOpenXrNative<'local>(
    _env: JNIEnv<'local>,
    _this: JObject<'local>,
) {
    log_failure("shutdownOpenXrNative", runtime::shutdown());
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_infra_xrphone_XrPhone_getHeadPoseNative<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
) -> jobject {
    let pose = runtime::head_pose();
    match new_head_pose(&mut env, &pose) {
        Ok(obj) => obj.into_raw(),
        Err(e) => {
            // The pending exception surfaces in Kotlin when this returns.
            error!("cannot construct {}: {}", HEAD_POSE_CLASS, e);
            std::ptr::null_mut()
        }
    }
}

fn platform_context(env: &JNIEnv, context: &JObject) -> EngineResult<PlatformContext> {
    if context.is_null() {
        return Err(EngineError::Unsupported("application context is null".to_string()));
    }
    let jni_err = |e: jni::errors::Error| EngineError::Unsupported(format!("JNI: {}", e));

    let vm = env.get_java_vm().map_err(jni_err)?;
    let global = match APP_CONTEXT.get() {
        Some(global) => global.clone(),
        None => {
            let global = env.new_global_ref(context).map_err(jni_err)?;
            APP_CONTEXT.get_or_init(|| global).clone()
        }
    };

    Ok(PlatformContext::Android {
        vm: vm.get_java_vm_pointer() as *mut c_void,
        context: global.as_obj().as_raw() as *mut c_void,
    })
}

fn log_failure(call: &str, result: EngineResult<()>) {
    if let Err(e) = result {
        warn!("{}: {}", call, e);
    }
}
