use std::ffi::CStr;

use ash::vk;

///Helper that is created if the host instance was created with `VK_EXT_debug_utils`.
/// Allows to name objects so they show up readable in captures and validation messages.
pub struct Debugger {
    pub debug_loader: ash::ext::debug_utils::Device,
}

impl Debugger {
    pub fn new(instance: &ash::Instance, device: &ash::Device) -> Self {
        Debugger {
            debug_loader: ash::ext::debug_utils::Device::new(instance, device),
        }
    }

    pub fn name_raw_object(
        &self,
        ty: vk::ObjectType,
        handle: u64,
        name: &CStr,
    ) -> Result<(), vk::Result> {
        let mut info = vk::DebugUtilsObjectNameInfoEXT::default().object_name(name);
        info.object_type = ty;
        info.object_handle = handle;
        unsafe { self.debug_loader.set_debug_utils_object_name(&info) }
    }
}
