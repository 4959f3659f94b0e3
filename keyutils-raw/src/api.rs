// Copyright (c) 2018, Ben Boeckel
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without modification,
// are permitted provided that the following conditions are met:
//
//     * Redistributions of source code must retain the above copyright notice,
//       this list of conditions and the following disclaimer.
//     * Redistributions in binary form must reproduce the above copyright notice,
//       this list of conditions and the following disclaimer in the documentation
//       and/or other materials provided with the distribution.
//     * Neither the name of this project nor the names of its contributors
//       may be used to endorse or promote products derived from this software
//       without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND
// ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE IMPLIED
// WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT OWNER OR CONTRIBUTORS BE LIABLE FOR
// ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES
// (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES;
// LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON
// ANY THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT
// (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE OF THIS
// SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! Safe-ish wrappers around the raw `keyctl(2)` bindings in `functions`.
//!
//! These return `Result<_, errno::Errno>` instead of the raw `-1`-on-error C convention and
//! take `Option`/slice arguments in place of null pointers and length-query calling
//! conventions. They are still thin: callers are responsible for upholding the kernel's
//! contracts (valid serials, sized buffers).

use std::ffi::CString;
use std::mem::MaybeUninit;
use std::os::raw::c_int;
use std::ptr;

use crate::functions;
use crate::types::{KeyPermissions, KeyringSerial, TimeoutSeconds};

/// Reexport of `errno::Errno` as `Error`.
pub type Error = errno::Errno;
/// Simpler `Result` type with the error already set.
pub type Result<T> = std::result::Result<T, Error>;

fn to_cstring(s: &str) -> CString {
    CString::new(s).expect("description/type strings must not contain an embedded NUL")
}

fn check_long(ret: libc::c_long) -> Result<libc::c_long> {
    if ret == -1 {
        Err(errno::errno())
    } else {
        Ok(ret)
    }
}

fn check_serial(ret: c_int) -> Result<KeyringSerial> {
    if ret == -1 {
        Err(errno::errno())
    } else {
        KeyringSerial::new(ret).ok_or(errno::Errno(libc::EINVAL))
    }
}

fn buffer_ptr(buffer: &mut Option<&mut [MaybeUninit<u8>]>) -> (*mut libc::c_char, libc::size_t) {
    match buffer {
        Some(buffer) => (buffer.as_mut_ptr().cast(), buffer.len()),
        None => (ptr::null_mut(), 0),
    }
}

/// Add a key of the given type to a keyring, returning its new serial.
pub fn add_key(type_: &str, description: &str, payload: &[u8], keyring: KeyringSerial) -> Result<KeyringSerial> {
    let type_ = to_cstring(type_);
    let description = to_cstring(description);
    let ret = unsafe {
        functions::add_key(
            type_.as_ptr(),
            description.as_ptr(),
            payload.as_ptr().cast(),
            payload.len(),
            keyring.get(),
        )
    };
    check_serial(ret)
}

/// Request a key from the kernel by type and description.
///
/// `keyring`, if given, is the keyring to link the found (or newly constructed) key into. If
/// not given and a request to `/sbin/request-key` constructs the key, it is linked into the
/// default keyring.
pub fn request_key(
    type_: &str,
    description: &str,
    info: Option<&str>,
    keyring: Option<KeyringSerial>,
) -> Result<KeyringSerial> {
    let type_ = to_cstring(type_);
    let description = to_cstring(description);
    let info = info.map(to_cstring);
    let ret = unsafe {
        functions::request_key(
            type_.as_ptr(),
            description.as_ptr(),
            info.as_ref().map_or(ptr::null(), |info| info.as_ptr()),
            keyring.map_or(0, KeyringSerial::get),
        )
    };
    check_serial(ret)
}

/// Look up (and optionally create) one of the special per-process/session keyrings.
pub fn keyctl_get_keyring_id(id: c_int, create: bool) -> Result<KeyringSerial> {
    let ret = unsafe { functions::keyctl_get_keyring_ID(id, create as c_int) };
    check_serial(ret)
}

/// Join (creating if necessary) a session keyring, becoming its manager.
///
/// `name` is `None` for a fresh anonymous session keyring.
pub fn keyctl_join_session_keyring(name: Option<&str>) -> Result<KeyringSerial> {
    let name = name.map(to_cstring);
    let ret =
        unsafe { functions::keyctl_join_session_keyring(name.as_ref().map_or(ptr::null(), |name| name.as_ptr())) };
    check_serial(ret)
}

/// Hand the session keyring joined by this thread to its parent process.
///
/// The parent must not have altered its session keyring since the `fork` which created this
/// process, or the kernel rejects the handoff.
pub fn keyctl_session_to_parent() -> Result<()> {
    check_long(unsafe { functions::keyctl_session_to_parent() }).map(drop)
}

/// Revoke a key or keyring, preventing further operations against it.
pub fn keyctl_revoke(id: KeyringSerial) -> Result<()> {
    check_long(unsafe { functions::keyctl_revoke(id.get()) }).map(drop)
}

/// Set the access control bits on a key or keyring.
pub fn keyctl_setperm(id: KeyringSerial, perm: KeyPermissions) -> Result<()> {
    check_long(unsafe { functions::keyctl_setperm(id.get(), perm) }).map(drop)
}

/// Describe a key or keyring, writing `"type;uid;gid;perm;description"` into `buffer`.
///
/// Pass `None` to query the required buffer size without writing anything.
pub fn keyctl_describe(id: KeyringSerial, mut buffer: Option<&mut [MaybeUninit<u8>]>) -> Result<usize> {
    let (ptr, len) = buffer_ptr(&mut buffer);
    let ret = check_long(unsafe { functions::keyctl_describe(id.get(), ptr, len) })?;
    Ok(ret as usize)
}

/// Create a link from `ringid` to `id`, replacing any existing link to a key of the same type
/// and description.
pub fn keyctl_link(id: KeyringSerial, ringid: KeyringSerial) -> Result<()> {
    check_long(unsafe { functions::keyctl_link(id.get(), ringid.get()) }).map(drop)
}

/// Remove the link from `ringid` to `id`.
pub fn keyctl_unlink(id: KeyringSerial, ringid: KeyringSerial) -> Result<()> {
    check_long(unsafe { functions::keyctl_unlink(id.get(), ringid.get()) }).map(drop)
}

/// Read a key's payload into `buffer`.
///
/// Pass `None` to query the required buffer size without reading anything.
pub fn keyctl_read(id: KeyringSerial, mut buffer: Option<&mut [MaybeUninit<u8>]>) -> Result<usize> {
    let (ptr, len) = buffer_ptr(&mut buffer);
    let ret = check_long(unsafe { functions::keyctl_read(id.get(), ptr, len) })?;
    Ok(ret as usize)
}

/// Set the expiration timeout of a key or keyring.
///
/// A timeout of `0` clears any existing expiration.
pub fn keyctl_set_timeout(id: KeyringSerial, timeout: TimeoutSeconds) -> Result<()> {
    check_long(unsafe { functions::keyctl_set_timeout(id.get(), timeout) }).map(drop)
}

/// Invalidate a key or keyring immediately, unlinking it from every keyring that references it.
pub fn keyctl_invalidate(id: KeyringSerial) -> Result<()> {
    check_long(unsafe { functions::keyctl_invalidate(id.get()) }).map(drop)
}
