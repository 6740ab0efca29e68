//! Process-global interceptor routines
//!
//! Redirected dispatch-table slots point at these functions. They carry no
//! context of their own: each call looks up the active manager's state and
//! the published original entry point, then hands off to [`HookState`].
//!
//! A hook kind may be redirected in two dispatch tables (the base device's
//! and a separate extended device's). Each route remembers the table it
//! belongs to so a call forwards to the original read from the caller's own
//! table.
//!
//! Originals are never cleared. A call that raced an unload still finds a
//! valid entry point to forward to.

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use d3d9hook_sdk::{
    BeginSceneFn, EndSceneFn, IDirect3DDevice9, PresentExFn, PresentFn, PresentParameters, Rect,
    ResetFn, RgnData, D3DERR_INVALIDCALL, HRESULT, HWND,
};

use super::kind::HookKind;
use crate::intercept::HookState;

/// Routes per hook kind: the primary table and one alternate
pub(crate) const ROUTES_PER_KIND: usize = 2;

/// One pre-redirection entry point and the table it was read from
struct Route {
    table: AtomicPtr<()>,
    original: AtomicPtr<()>,
}

impl Route {
    const fn new() -> Self {
        Self {
            table: AtomicPtr::new(ptr::null_mut()),
            original: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

/// Pre-redirection entry points, indexed by [`HookKind::index`] and route
static ORIGINALS: [[Route; ROUTES_PER_KIND]; HookKind::COUNT] =
    [const { [Route::new(), Route::new()] }; HookKind::COUNT];

/// State of the currently loaded manager
static ACTIVE: RwLock<Option<Arc<HookState>>> = RwLock::new(None);

/// Record the original entry point for `kind` in dispatch table `table`
///
/// Route 0 is the base device's table; route 1 a separate extended table.
pub(crate) fn publish_original(
    kind: HookKind,
    route: usize,
    table: *const *const (),
    original: *const (),
) {
    let route = &ORIGINALS[kind.index()][route];
    // Original first: a reader matching the table must see its entry point
    route.original.store(original as *mut (), Ordering::Release);
    route.table.store(table as *mut (), Ordering::Release);
}

/// Route interceptor calls to `state`
///
/// Returns `false` if another manager already owns the routing.
pub(crate) fn claim(state: &Arc<HookState>) -> bool {
    let mut active = ACTIVE.write();
    match active.as_ref() {
        Some(current) => Arc::ptr_eq(current, state),
        None => {
            *active = Some(Arc::clone(state));
            true
        }
    }
}

/// Stop routing to `state`; a no-op if it is not the active one
pub(crate) fn release(state: &Arc<HookState>) {
    let mut active = ACTIVE.write();
    if active.as_ref().is_some_and(|current| Arc::ptr_eq(current, state)) {
        *active = None;
    }
}

fn active() -> Option<Arc<HookState>> {
    ACTIVE.read().clone()
}

/// Dispatch table of the object `this`
///
/// # Safety
/// `this` must be null or a live COM object.
unsafe fn table_of(this: *mut IDirect3DDevice9) -> *mut () {
    if this.is_null() {
        return ptr::null_mut();
    }
    *(this as *const *mut ())
}

/// Entry point recorded for `table`, or the primary route's
fn select(routes: &[Route; ROUTES_PER_KIND], table: *mut ()) -> *mut () {
    routes
        .iter()
        .find(|route| !table.is_null() && route.table.load(Ordering::Acquire) == table)
        .map(|route| route.original.load(Ordering::Acquire))
        .filter(|entry| !entry.is_null())
        .unwrap_or_else(|| routes[0].original.load(Ordering::Acquire))
}

/// Typed original entry point for `kind`, as read from the table `this`
/// dispatches through
///
/// # Safety
/// `F` must be the function-pointer type of the method `kind` redirects, and
/// `this` must be null or a live COM object.
unsafe fn original<F: Copy>(kind: HookKind, this: *mut IDirect3DDevice9) -> Option<F> {
    let entry = select(&ORIGINALS[kind.index()], table_of(this));
    if entry.is_null() {
        return None;
    }
    Some(std::mem::transmute_copy(&entry))
}

/// Interceptor routine to install for `kind`
pub(crate) fn replacement_for(kind: HookKind) -> *const () {
    match kind {
        HookKind::BeginScene => begin_scene_detour as BeginSceneFn as *const (),
        HookKind::EndScene => end_scene_detour as EndSceneFn as *const (),
        HookKind::Present => present_detour as PresentFn as *const (),
        HookKind::PresentEx => present_ex_detour as PresentExFn as *const (),
        HookKind::Reset => reset_detour as ResetFn as *const (),
    }
}

unsafe extern "system" fn begin_scene_detour(this: *mut IDirect3DDevice9) -> HRESULT {
    let Some(original) = original::<BeginSceneFn>(HookKind::BeginScene, this) else {
        return D3DERR_INVALIDCALL;
    };

    match active() {
        Some(state) => state.begin_scene(this, original),
        None => original(this),
    }
}

unsafe extern "system" fn end_scene_detour(this: *mut IDirect3DDevice9) -> HRESULT {
    let Some(original) = original::<EndSceneFn>(HookKind::EndScene, this) else {
        return D3DERR_INVALIDCALL;
    };

    match active() {
        Some(state) => state.end_scene(this, original),
        None => original(this),
    }
}

unsafe extern "system" fn present_detour(
    this: *mut IDirect3DDevice9,
    source_rect: *const Rect,
    dest_rect: *const Rect,
    dest_window_override: HWND,
    dirty_region: *const RgnData,
) -> HRESULT {
    let Some(original) = original::<PresentFn>(HookKind::Present, this) else {
        return D3DERR_INVALIDCALL;
    };

    match active() {
        Some(state) => state.present(
            this,
            source_rect,
            dest_rect,
            dest_window_override,
            dirty_region,
            original,
        ),
        None => original(this, source_rect, dest_rect, dest_window_override, dirty_region),
    }
}

unsafe extern "system" fn present_ex_detour(
    this: *mut IDirect3DDevice9,
    source_rect: *const Rect,
    dest_rect: *const Rect,
    dest_window_override: HWND,
    dirty_region: *const RgnData,
    flags: u32,
) -> HRESULT {
    let Some(original) = original::<PresentExFn>(HookKind::PresentEx, this) else {
        return D3DERR_INVALIDCALL;
    };

    match active() {
        Some(state) => state.present_ex(
            this,
            source_rect,
            dest_rect,
            dest_window_override,
            dirty_region,
            flags,
            original,
        ),
        None => original(
            this,
            source_rect,
            dest_rect,
            dest_window_override,
            dirty_region,
            flags,
        ),
    }
}

unsafe extern "system" fn reset_detour(
    this: *mut IDirect3DDevice9,
    presentation_parameters: *mut PresentParameters,
) -> HRESULT {
    let Some(original) = original::<ResetFn>(HookKind::Reset, this) else {
        return D3DERR_INVALIDCALL;
    };

    match active() {
        Some(state) => state.reset(this, presentation_parameters, original),
        None => original(this, presentation_parameters),
    }
}
