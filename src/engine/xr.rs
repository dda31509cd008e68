//! OpenXR engine on a Vulkan device.

use std::sync::Arc;

use log::{info, warn};
use openxr as xr;

use crate::engine::config::{FormFactorKind, ReferenceSpaceKind};
use crate::engine::frame_pump::{FramePump, FramePumpParts, PumpShared};
use crate::engine::graphics::XrVulkan;
use crate::engine::{EngineError, EngineResult, HeadPose, PlatformContext, XrBackend, XrConfig, XrResultExt};

pub struct OpenXrBackend {
    // Field order is drop order: the pump must stop before the session goes, and the
    // session before the Vulkan device and the XR instance.
    pump: FramePump,
    view_space: xr::Space,
    reference_space: xr::Space,
    #[allow(dead_code)]
    session: xr::Session<xr::Vulkan>,
    vulkan: XrVulkan,
    #[allow(dead_code)]
    instance: xr::Instance,
    shared: Arc<PumpShared>,
}

impl OpenXrBackend {
    pub fn open(ctx: &PlatformContext, config: &XrConfig) -> EngineResult<Self> {
        let entry = load_entry(ctx)?;

        let available = entry.enumerate_extensions().xr("enumerate_extensions")?;
        if !available.khr_vulkan_enable {
            return Err(EngineError::MissingExtension("XR_KHR_vulkan_enable"));
        }

        let mut enabled = xr::ExtensionSet::default();
        enabled.khr_vulkan_enable = true;
        #[cfg(target_os = "android")]
        {
            if !available.khr_android_create_instance {
                return Err(EngineError::MissingExtension("XR_KHR_android_create_instance"));
            }
            enabled.khr_android_create_instance = true;
        }

        let instance = entry
            .create_instance(
                &xr::ApplicationInfo {
                    application_name: &config.app_name,
                    application_version: 0,
                    engine_name: "xrphone",
                    engine_version: 0,
                    api_version: xr::Version::new(1, 0, 0),
                },
                &enabled,
                &[],
            )
            .xr("create_instance")?;
        let props = instance.properties().xr("instance properties")?;
        info!(
            "[OpenXR] runtime {} {}.{}.{}",
            props.runtime_name,
            props.runtime_version.major(),
            props.runtime_version.minor(),
            props.runtime_version.patch()
        );

        let (form_factor, view_type) = match config.form_factor {
            FormFactorKind::HeadMounted => (
                xr::FormFactor::HEAD_MOUNTED_DISPLAY,
                xr::ViewConfigurationType::PRIMARY_STEREO,
            ),
            FormFactorKind::Handheld => (
                xr::FormFactor::HANDHELD_DISPLAY,
                xr::ViewConfigurationType::PRIMARY_MONO,
            ),
        };
        let system = instance.system(form_factor).xr("get system")?;

        let blend_mode = instance
            .enumerate_environment_blend_modes(system, view_type)
            .xr("enumerate_environment_blend_modes")?
            .first()
            .copied()
            .ok_or_else(|| EngineError::Unsupported("no environment blend mode".to_string()))?;

        let vulkan = XrVulkan::new(&instance, system, &config.app_name)?;

        let (session, frame_waiter, frame_stream) = unsafe {
            instance
                .create_session::<xr::Vulkan>(system, &vulkan.session_create_info())
                .xr("create_session")?
        };

        let reference_type = pick_reference_space(&session, config.reference_space)?;
        let reference_space = session
            .create_reference_space(reference_type, xr::Posef::IDENTITY)
            .xr("create reference space")?;
        let view_space = session
            .create_reference_space(xr::ReferenceSpaceType::VIEW, xr::Posef::IDENTITY)
            .xr("create view space")?;
        info!("[OpenXR] session created, reference space {:?}", reference_type);

        let pump = FramePump::spawn(FramePumpParts {
            instance: instance.clone(),
            session: session.clone(),
            frame_waiter,
            frame_stream,
            view_type,
            blend_mode,
        })?;
        let shared = pump.shared().clone();

        Ok(Self {
            pump,
            view_space,
            reference_space,
            session,
            vulkan,
            instance,
            shared,
        })
    }
}

impl XrBackend for OpenXrBackend {
    fn name(&self) -> &'static str {
        "openxr"
    }

    fn resume(&mut self) -> EngineResult<()> {
        if self.shared.is_finished() {
            warn!("[OpenXR] resume after the session ended; reinitialize to recover");
        }
        self.pump.set_paused(false);
        Ok(())
    }

    fn pause(&mut self) -> EngineResult<()> {
        self.pump.set_paused(true);
        Ok(())
    }

    fn head_pose(&self) -> EngineResult<Option<HeadPose>> {
        if !self.shared.is_running() {
            return Ok(None);
        }
        let Some(time) = self.shared.display_time() else {
            return Ok(None);
        };

        let location = self
            .view_space
            .locate(&self.reference_space, time)
            .xr("locate view space")?;
        if !location
            .location_flags
            .contains(xr::SpaceLocationFlags::ORIENTATION_VALID)
        {
            return Ok(None);
        }
        Ok(Some(HeadPose::from((time, location.pose))))
    }
}

impl Drop for OpenXrBackend {
    fn drop(&mut self) {
        self.pump.stop();
        info!(
            "[OpenXR] releasing session on {}",
            self.vulkan.device.physical_device().properties().device_name
        );
    }
}

fn pick_reference_space(
    session: &xr::Session<xr::Vulkan>,
    wanted: ReferenceSpaceKind,
) -> EngineResult<xr::ReferenceSpaceType> {
    let supported = session
        .enumerate_reference_spaces()
        .xr("enumerate_reference_spaces")?;
    let stage = xr::ReferenceSpaceType::STAGE;
    if wanted == ReferenceSpaceKind::Stage && supported.contains(&stage) {
        return Ok(stage);
    }
    if wanted == ReferenceSpaceKind::Stage {
        warn!("[OpenXR] STAGE space unsupported, falling back to LOCAL");
    }
    Ok(xr::ReferenceSpaceType::LOCAL)
}

/// Loads the OpenXR loader. On Android the loader needs the VM and app context
/// from `initialize`, registered once per process.
fn load_entry(ctx: &PlatformContext) -> EngineResult<xr::Entry> {
    #[cfg(target_os = "android")]
    register_android_context(ctx)?;
    #[cfg(not(target_os = "android"))]
    let _ = ctx;

    let entry = unsafe { xr::Entry::load() }.map_err(|e| EngineError::Loader(format!("{}", e)))?;

    #[cfg(target_os = "android")]
    entry
        .initialize_android_loader()
        .xr("initialize_android_loader")?;

    Ok(entry)
}

#[cfg(target_os = "android")]
fn register_android_context(ctx: &PlatformContext) -> EngineResult<()> {
    use std::sync::Once;

    static REGISTER: Once = Once::new();

    let PlatformContext::Android { vm, context } = *ctx else {
        return Err(EngineError::Unsupported(
            "Android build needs an Android platform context".to_string(),
        ));
    };
    REGISTER.call_once(|| unsafe {
        ndk_context::initialize_android_context(vm, context);
    });
    Ok(())
}
