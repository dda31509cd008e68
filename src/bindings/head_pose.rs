//! `XrPhone.HeadPose` construction.

use jni::JNIEnv;
use jni::objects::{JObject, JValue};

use crate::engine::HeadPose;

/// Binary name of the Kotlin `data class HeadPose` nested in `XrPhone`.
pub const HEAD_POSE_CLASS: &str = "com/infra/xrphone/XrPhone$HeadPose";

/// `HeadPose(timestampNs: Long, px, py, pz, qx, qy, qz, qw: Float)`.
pub const HEAD_POSE_CTOR_SIG: &str = "(JFFFFFFF)V";

/// Constructor arguments in declaration order.
pub fn ctor_args(pose: &HeadPose) -> [JValue<'static, 'static>; 8] {
    let [px, py, pz] = pose.position;
    let [qx, qy, qz, qw] = pose.orientation;
    [
        JValue::Long(pose.timestamp_ns),
        JValue::Float(px),
        JValue::Float(py),
        JValue::Float(pz),
        JValue::Float(qx),
        JValue::Float(qy),
        JValue::Float(qz),
        JValue::Float(qw),
    ]
}

/// Builds a new `XrPhone$HeadPose`.
///
/// If the class or constructor cannot be resolved the JVM exception stays pending;
/// that is a packaging mismatch between the library and the app, not a data error.
pub fn new_head_pose<'local>(env: &mut JNIEnv<'local>, pose: &HeadPose) -> jni::errors::Result<JObject<'local>> {
    env.new_object(HEAD_POSE_CLASS, HEAD_POSE_CTOR_SIG, &ctor_args(pose))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_code(v: &JValue) -> char {
        match v {
            JValue::Long(_) => 'J',
            JValue::Float(_) => 'F',
            JValue::Int(_) => 'I',
            JValue::Double(_) => 'D',
            JValue::Bool(_) => 'Z',
            _ => '?',
        }
    }

    #[test]
    fn slot_types_spell_the_constructor_signature() {
        let args = ctor_args(&HeadPose::IDENTITY);
        let codes: String = args.iter().map(type_code).collect();
        assert_eq!(format!("({})V", codes), HEAD_POSE_CTOR_SIG);
    }

    #[test]
    fn each_field_lands_in_its_slot() {
        let pose = HeadPose::new(9_876_543_210, [1.5, -2.25, 3.125], [0.1, 0.2, 0.3, 0.9]);
        let args = ctor_args(&pose);

        assert!(matches!(args[0], JValue::Long(9_876_543_210)));
        let floats: Vec<f32> = args[1..]
            .iter()
            .map(|v| match v {
                JValue::Float(f) => *f,
                _ => panic!("expected a float slot"),
            })
            .collect();
        assert_eq!(floats, vec![1.5, -2.25, 3.125, 0.1, 0.2, 0.3, 0.9]);
    }

    #[test]
    fn timestamp_keeps_full_64_bits() {
        let pose = HeadPose::new(i64::MAX, [0.0; 3], [0.0, 0.0, 0.0, 1.0]);
        assert!(matches!(ctor_args(&pose)[0], JValue::Long(i64::MAX)));
    }

    #[test]
    fn class_name_is_nested_binary_name() {
        assert!(HEAD_POSE_CLASS.ends_with("XrPhone$HeadPose"));
        assert!(!HEAD_POSE_CLASS.contains('.'));
    }
}
