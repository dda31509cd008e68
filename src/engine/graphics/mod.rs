pub mod xr_vulkan;

pub use xr_vulkan::XrVulkan;
