//! Windows audio backend via Core Audio (WASAPI endpoint APIs).
//!
//! Volume and mute go through `IAudioEndpointVolume` on the default render
//! endpoint.  Switching the default endpoint uses the undocumented but
//! long-stable `IPolicyConfig` interface, the same one the Sound control
//! panel uses; it is set for the console, multimedia and communications
//! roles so every application follows the switch.
//!
//! COM is initialised (multithreaded apartment) when the backend is created
//! and uninitialised when it is dropped, so create and use it on one thread.

#![cfg(target_os = "windows")]

use std::ffi::c_void;

use songled_core::domain::{percent_to_scalar, scalar_to_percent, AudioEndpoint};
use windows::core::{interface, GUID, HRESULT, PCWSTR, PWSTR};
use windows::core::{IUnknown, IUnknown_Vtbl};
use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Foundation::BOOL;
use windows::Win32::Media::Audio::Endpoints::IAudioEndpointVolume;
use windows::Win32::Media::Audio::{
    eCommunications, eConsole, eMultimedia, eRender, ERole, IMMDevice, IMMDeviceEnumerator,
    MMDeviceEnumerator, DEVICE_STATE_ACTIVE,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoTaskMemFree, CoUninitialize, CLSCTX_ALL,
    COINIT_MULTITHREADED, STGM_READ,
};

use crate::application::audio_control::{AudioBackend, AudioError};

/// CLSID of the `PolicyConfigClient` coclass.
const CLSID_POLICY_CONFIG_CLIENT: GUID = GUID::from_u128(0x870af99c_171d_4f9e_af0d_e63df40c2bc9);

#[allow(non_snake_case)]
#[interface("f8679f50-850a-41cf-9c72-430f290290c8")]
unsafe trait IPolicyConfig: IUnknown {
    fn GetMixFormat(&self, device: PCWSTR, format: *mut *mut c_void) -> HRESULT;
    fn GetDeviceFormat(&self, device: PCWSTR, default: i32, format: *mut *mut c_void) -> HRESULT;
    fn ResetDeviceFormat(&self, device: PCWSTR) -> HRESULT;
    fn SetDeviceFormat(&self, device: PCWSTR, endpoint: *mut c_void, mix: *mut c_void)
        -> HRESULT;
    fn GetProcessingPeriod(
        &self,
        device: PCWSTR,
        default: i32,
        default_period: *mut i64,
        min_period: *mut i64,
    ) -> HRESULT;
    fn SetProcessingPeriod(&self, device: PCWSTR, period: *mut i64) -> HRESULT;
    fn GetShareMode(&self, device: PCWSTR, mode: *mut c_void) -> HRESULT;
    fn SetShareMode(&self, device: PCWSTR, mode: *mut c_void) -> HRESULT;
    fn GetPropertyValue(&self, device: PCWSTR, key: *const c_void, value: *mut c_void)
        -> HRESULT;
    fn SetPropertyValue(&self, device: PCWSTR, key: *const c_void, value: *mut c_void)
        -> HRESULT;
    fn SetDefaultEndpoint(&self, device: PCWSTR, role: ERole) -> HRESULT;
    fn SetEndpointVisibility(&self, device: PCWSTR, visible: i32) -> HRESULT;
}

/// `HRESULT_FROM_WIN32(ERROR_NOT_FOUND)`, which MMDevice reports as E_NOTFOUND.
const E_NOTFOUND: HRESULT = HRESULT(0x8007_0490_u32 as i32);

fn platform(e: windows::core::Error) -> AudioError {
    AudioError::Platform(format!("{} ({:?})", e.message(), e.code()))
}

/// Maps E_NOTFOUND to `None` and every other failure to a platform error.
fn none_if_not_found<T>(result: windows::core::Result<T>) -> Result<Option<T>, AudioError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.code() == E_NOTFOUND => Ok(None),
        Err(e) => Err(platform(e)),
    }
}

/// Balances the `CoInitializeEx` made in [`WasapiAudioBackend::new`].
struct ComApartment;

impl Drop for ComApartment {
    fn drop(&mut self) {
        // SAFETY: paired with a successful CoInitializeEx on this thread.
        unsafe { CoUninitialize() };
    }
}

/// [`AudioBackend`] over the Windows Core Audio APIs.
pub struct WasapiAudioBackend {
    enumerator: IMMDeviceEnumerator,
    volume: IAudioEndpointVolume,
    // Declared last: COM must outlive the interfaces above.
    _com: ComApartment,
}

impl WasapiAudioBackend {
    /// Initialises COM on the calling thread and binds to the current
    /// default render endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::Platform`] if COM or the endpoint APIs fail.
    pub fn new() -> Result<Self, AudioError> {
        // SAFETY: no reserved pointer; the matching CoUninitialize runs in
        // ComApartment::drop.
        unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) }
            .ok()
            .map_err(platform)?;
        let com = ComApartment;

        // SAFETY: MMDeviceEnumerator is a registered in-proc coclass.
        let enumerator: IMMDeviceEnumerator =
            unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }.map_err(platform)?;
        let volume = default_endpoint_volume(&enumerator)?;

        Ok(Self {
            enumerator,
            volume,
            _com: com,
        })
    }
}

impl AudioBackend for WasapiAudioBackend {
    fn master_volume(&self) -> Result<u8, AudioError> {
        // SAFETY: `volume` is a live interface pointer.
        let scalar = unsafe { self.volume.GetMasterVolumeLevelScalar() }.map_err(platform)?;
        Ok(scalar_to_percent(scalar))
    }

    fn set_master_volume(&mut self, percent: u8) -> Result<(), AudioError> {
        // SAFETY: null event context is allowed.
        unsafe {
            self.volume
                .SetMasterVolumeLevelScalar(percent_to_scalar(percent), std::ptr::null())
        }
        .map_err(platform)
    }

    fn is_muted(&self) -> Result<bool, AudioError> {
        // SAFETY: `volume` is a live interface pointer.
        let muted = unsafe { self.volume.GetMute() }.map_err(platform)?;
        Ok(muted.as_bool())
    }

    fn toggle_mute(&mut self) -> Result<bool, AudioError> {
        let muted = !self.is_muted()?;
        // SAFETY: null event context is allowed.
        unsafe { self.volume.SetMute(BOOL::from(muted), std::ptr::null()) }.map_err(platform)?;
        Ok(muted)
    }

    fn enumerate_render_endpoints(&self) -> Result<Vec<AudioEndpoint>, AudioError> {
        // SAFETY: all calls are on live interface pointers owned by this scope.
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(eRender, DEVICE_STATE_ACTIVE)
                .map_err(platform)?;
            let count = collection.GetCount().map_err(platform)?;

            let mut endpoints = Vec::with_capacity(count as usize);
            for i in 0..count {
                let device = collection.Item(i).map_err(platform)?;
                endpoints.push(AudioEndpoint {
                    index: i as usize,
                    id: device_id(&device)?,
                    name: friendly_name(&device)?,
                });
            }
            Ok(endpoints)
        }
    }

    fn default_endpoint_id(&self) -> Result<Option<String>, AudioError> {
        // SAFETY: `enumerator` is a live interface pointer.
        let found = unsafe { self.enumerator.GetDefaultAudioEndpoint(eRender, eMultimedia) };
        // E_NOTFOUND: no render device is active at all.
        none_if_not_found(found)?.map(|d| device_id(&d)).transpose()
    }

    fn set_default_endpoint(&mut self, id: &str) -> Result<(), AudioError> {
        let wide: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();

        // SAFETY: `wide` is NUL-terminated and outlives every call below.
        unsafe {
            let policy: IPolicyConfig =
                CoCreateInstance(&CLSID_POLICY_CONFIG_CLIENT, None, CLSCTX_ALL).map_err(platform)?;
            for role in [eConsole, eMultimedia, eCommunications] {
                policy
                    .SetDefaultEndpoint(PCWSTR(wide.as_ptr()), role)
                    .ok()
                    .map_err(|e| {
                        if e.code() == E_NOTFOUND {
                            AudioError::EndpointNotFound(id.to_string())
                        } else {
                            platform(e)
                        }
                    })?;
            }
        }
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), AudioError> {
        self.volume = default_endpoint_volume(&self.enumerator)?;
        Ok(())
    }
}

fn default_endpoint_volume(
    enumerator: &IMMDeviceEnumerator,
) -> Result<IAudioEndpointVolume, AudioError> {
    // SAFETY: `enumerator` is live; Activate returns an owned interface.
    unsafe {
        let device = enumerator
            .GetDefaultAudioEndpoint(eRender, eMultimedia)
            .map_err(platform)?;
        device
            .Activate::<IAudioEndpointVolume>(CLSCTX_ALL, None)
            .map_err(platform)
    }
}

/// Endpoint id string; frees the COM-allocated buffer.
fn device_id(device: &IMMDevice) -> Result<String, AudioError> {
    // SAFETY: GetId returns a CoTaskMemAlloc'd NUL-terminated string that we
    // free exactly once after copying it.
    unsafe {
        let raw: PWSTR = device.GetId().map_err(platform)?;
        let id = raw.to_string();
        CoTaskMemFree(Some(raw.0 as *const c_void));
        id.map_err(|e| AudioError::Platform(format!("endpoint id is not valid UTF-16: {e}")))
    }
}

fn friendly_name(device: &IMMDevice) -> Result<String, AudioError> {
    // SAFETY: `device` is live; the PROPVARIANT is owned and cleared on drop.
    unsafe {
        let store = device.OpenPropertyStore(STGM_READ).map_err(platform)?;
        let value = store.GetValue(&PKEY_Device_FriendlyName).map_err(platform)?;
        Ok(value.to_string())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
