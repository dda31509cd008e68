//! Vulkan instance + device created the way the OpenXR runtime asks for them.
//!
//! Uses the `XR_KHR_vulkan_enable` handshake: the runtime lists the extensions it
//! needs and names the physical device; we create everything through vulkano and
//! hand the raw handles back for session creation.

use std::fmt::Debug;
use std::sync::Arc;

use log::info;
use openxr as xr;
use vulkano::device::physical::PhysicalDevice;
use vulkano::device::{Device, DeviceCreateInfo, DeviceExtensions, Queue, QueueCreateInfo, QueueFlags};
use vulkano::instance::{Instance, InstanceCreateInfo, InstanceExtensions};
use vulkano::{Handle, Version, VulkanLibrary, VulkanObject};

use crate::engine::{EngineError, EngineResult, XrResultExt};

/// Vulkan version we request. Every runtime that supports Vulkan accepts 1.1.
const TARGET_API: Version = Version::V1_1;

fn vk_err<E: Debug>(call: &'static str) -> impl FnOnce(E) -> EngineError {
    move |e| EngineError::Vulkan {
        call,
        message: format!("{:?}", e),
    }
}

/// Whether the runtime's supported range covers `TARGET_API`. Patch levels are ignored.
fn admits_target(min: xr::Version, max: xr::Version) -> bool {
    let level = |v: xr::Version| (u32::from(v.major()), u32::from(v.minor()));
    let target = (TARGET_API.major, TARGET_API.minor);
    level(min) <= target && target <= level(max)
}

pub struct XrVulkan {
    // Field order is drop order: queue, device, then instance.
    pub queue: Arc<Queue>,
    pub device: Arc<Device>,
    pub instance: Arc<Instance>,
}

impl XrVulkan {
    pub fn new(xr_instance: &xr::Instance, system: xr::SystemId, app_name: &str) -> EngineResult<Self> {
        let reqs = xr_instance
            .graphics_requirements::<xr::Vulkan>(system)
            .xr("graphics_requirements")?;
        let (min, max) = (reqs.min_api_version_supported, reqs.max_api_version_supported);
        if !admits_target(min, max) {
            return Err(EngineError::Unsupported(format!(
                "runtime accepts Vulkan {}.{} to {}.{}, not {}.{}",
                min.major(),
                min.minor(),
                max.major(),
                max.minor(),
                TARGET_API.major,
                TARGET_API.minor
            )));
        }

        let library = VulkanLibrary::new().map_err(vk_err("load library"))?;

        let instance_exts = xr_instance
            .vulkan_legacy_instance_extensions(system)
            .xr("vulkan_legacy_instance_extensions")?;
        let instance = Instance::new(
            library,
            InstanceCreateInfo {
                application_name: Some(app_name.to_string()),
                engine_name: Some("xrphone".to_string()),
                max_api_version: Some(TARGET_API),
                enabled_extensions: InstanceExtensions::from_iter(instance_exts.split_whitespace()),
                ..Default::default()
            },
        )
        .map_err(vk_err("create instance"))?;

        let raw_physical = unsafe {
            xr_instance
                .vulkan_graphics_device(system, instance.handle().as_raw() as _)
                .xr("vulkan_graphics_device")?
        };
        let physical_device = Self::find_physical_device(&instance, raw_physical as u64)?;

        let queue_family_index = physical_device
            .queue_family_properties()
            .iter()
            .position(|q| q.queue_flags.intersects(QueueFlags::GRAPHICS))
            .ok_or_else(|| EngineError::Unsupported("no Vulkan graphics queue family".to_string()))?
            as u32;

        let device_exts = xr_instance
            .vulkan_legacy_device_extensions(system)
            .xr("vulkan_legacy_device_extensions")?;
        let (device, mut queues) = Device::new(
            physical_device.clone(),
            DeviceCreateInfo {
                queue_create_infos: vec![QueueCreateInfo {
                    queue_family_index,
                    ..Default::default()
                }],
                enabled_extensions: DeviceExtensions::from_iter(device_exts.split_whitespace()),
                ..Default::default()
            },
        )
        .map_err(vk_err("create device"))?;

        let queue = queues
            .next()
            .ok_or_else(|| EngineError::Unsupported("device returned no queue".to_string()))?;

        info!(
            "[Vulkan] device '{}' (api {}), queue family {}",
            physical_device.properties().device_name,
            physical_device.api_version(),
            queue_family_index
        );

        Ok(Self {
            queue,
            device,
            instance,
        })
    }

    fn find_physical_device(instance: &Arc<Instance>, raw: u64) -> EngineResult<Arc<PhysicalDevice>> {
        instance
            .enumerate_physical_devices()
            .map_err(vk_err("enumerate physical devices"))?
            .find(|pd| pd.handle().as_raw() == raw)
            .ok_or_else(|| {
                EngineError::Unsupported("runtime named a physical device Vulkan does not list".to_string())
            })
    }

    /// Raw handles for `xr::Instance::create_session::<xr::Vulkan>`.
    pub fn session_create_info(&self) -> xr::vulkan::SessionCreateInfo {
        xr::vulkan::SessionCreateInfo {
            instance: self.instance.handle().as_raw() as _,
            physical_device: self.device.physical_device().handle().as_raw() as _,
            device: self.device.handle().as_raw() as _,
            queue_family_index: self.queue.queue_family_index(),
            queue_index: self.queue.queue_index(),
        }
    }
}
