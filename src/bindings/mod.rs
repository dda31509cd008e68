//! JNI surface for `com.infra.xrphone.XrPhone`.
//!
//! `exports` holds the native method symbols. `head_pose` is the marshaling for the
//! one object that crosses back into the JVM, kept separate so the slot layout can
//! be tested without a VM.

pub mod exports;
pub mod head_pose;
