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

use crate::types::KeyPermissions;

// Raw kernel ABI: a key/keyring serial is a plain `c_int`, including the reserved negative
// "special keyring" values (`KEY_SPEC_*`), so it is not typed as `KeyringSerial` here; the safe
// wrappers in `api` convert at the boundary. Only the syscalls the `keyutils` wrapper crate
// exercises are declared: `keyctl(2)` has several more (persistent keyrings, Diffie-Hellman,
// request-key negotiation) that memento never touches.
#[rustfmt::skip]
#[link(name = "keyutils")]
extern "C" {
    pub fn add_key(
        type_:          *const libc::c_char,
        description:    *const libc::c_char,
        payload:        *const libc::c_void,
        plen:           libc::size_t,
        keyring:        libc::c_int)
        -> libc::c_int;
    pub fn request_key(
        type_:          *const libc::c_char,
        description:    *const libc::c_char,
        callout_info:   *const libc::c_char,
        keyring:        libc::c_int)
        -> libc::c_int;

    pub fn keyctl_get_keyring_ID(
        id:     libc::c_int,
        create: libc::c_int)
        -> libc::c_int;
    pub fn keyctl_join_session_keyring(
        name:   *const libc::c_char)
        -> libc::c_int;
    pub fn keyctl_revoke(
        id: libc::c_int)
        -> libc::c_long;
    pub fn keyctl_setperm(
        id:     libc::c_int,
        perm:   KeyPermissions)
        -> libc::c_long;
    pub fn keyctl_describe(
        id:     libc::c_int,
        buffer: *mut libc::c_char,
        buflen: libc::size_t)
        -> libc::c_long;
    pub fn keyctl_link(
        id:     libc::c_int,
        ringid: libc::c_int)
        -> libc::c_long;
    pub fn keyctl_unlink(
        id:     libc::c_int,
        ringid: libc::c_int)
        -> libc::c_long;
    pub fn keyctl_read(
        id:     libc::c_int,
        buffer: *mut libc::c_char,
        buflen: libc::size_t)
        -> libc::c_long;
    pub fn keyctl_set_timeout(
        key:        libc::c_int,
        timeout:    libc::c_uint)
        -> libc::c_long;
    pub fn keyctl_invalidate(
        id: libc::c_int)
        -> libc::c_long;
    // Enabled for memento: joining a fresh anonymous session keyring in the store needs to hand
    // parenthood of it to the login shell, so the shell keeps using it once this process exits
    // by double-forking away. Upstream carries this declaration out, commented, because its
    // callers never fork.
    pub fn keyctl_session_to_parent()
        -> libc::c_long;
}
