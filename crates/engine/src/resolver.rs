//! Dispatch-table resolution via a scratch device

use d3d9hook_sdk::{
    DeviceMethod, WindowHandle, D3D9_DEVICE_METHOD_COUNT, D3D9_DEVICE_TOTAL_METHOD_COUNT,
};

use crate::error::ResolveError;
use crate::factory::DeviceFactory;
use crate::table::{read_entries, DispatchTable};

/// Resolve the device dispatch table
///
/// Builds a throwaway base device, copies its dispatch table and releases
/// it. Then, if `probe_extended` is set, tries the same with an extended
/// device; a failure there only leaves the extended methods unresolved.
///
/// # Arguments
/// * `factory` - Source of scratch devices
/// * `window` - Window handed to device creation (null is allowed)
/// * `probe_extended` - Whether to attempt the extended interface at all
///
/// # Errors
/// Fails if the base device cannot be created or its table is invalid.
#[tracing::instrument(skip_all)]
pub fn resolve(
    factory: &dyn DeviceFactory,
    window: WindowHandle,
    probe_extended: bool,
) -> Result<DispatchTable, ResolveError> {
    let mut table = DispatchTable::new();

    tracing::debug!("Creating scratch device (window={:p})", window.as_raw());
    let base_vtable = {
        let device = factory.create_device(window)?;
        tracing::debug!("Scratch device created: {:p}", device.as_ptr());

        let vtable = device.dispatch_table()?;
        // SAFETY: a live IDirect3DDevice9 has D3D9_DEVICE_METHOD_COUNT slots
        let entries = unsafe { read_entries(vtable, 0..D3D9_DEVICE_METHOD_COUNT)? };
        table.commit(entries);
        vtable
    };

    if !probe_extended {
        tracing::debug!("Extended interface probing disabled");
        return Ok(table);
    }

    let extended = factory.create_device_ex(window).and_then(|device| {
        tracing::debug!("Scratch extended device created: {:p}", device.as_ptr());
        let vtable = device.dispatch_table()?;
        // SAFETY: a live IDirect3DDevice9Ex has the full table
        let entries = unsafe {
            read_entries(
                vtable,
                D3D9_DEVICE_METHOD_COUNT..D3D9_DEVICE_TOTAL_METHOD_COUNT,
            )?
        };
        let alternates = if vtable == base_vtable {
            Vec::new()
        } else {
            tracing::debug!("Extended device has its own dispatch table: {:p}", vtable);
            // SAFETY: as above, the base range is a prefix of the full table
            unsafe { read_entries(vtable, 0..D3D9_DEVICE_METHOD_COUNT)? }
        };
        Ok((entries, alternates))
    });

    match extended {
        Ok((entries, alternates)) => {
            table.commit(entries);
            table.commit_alternates(alternates);
            table.mark_extended();
            tracing::debug!("Extended device created - PresentEx supported");
        }
        Err(e) => {
            tracing::debug!("Extended device unavailable, hooking base interface only: {}", e);
        }
    }

    tracing::info!(
        "Resolved {} dispatch-table entries ({}: {:p})",
        table.len(),
        DeviceMethod::Present.name(),
        table
            .get(DeviceMethod::Present)
            .map(|e| e.target())
            .unwrap_or(std::ptr::null())
    );

    Ok(table)
}
