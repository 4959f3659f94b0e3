// Copyright (c) 2015, Ben Boeckel
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

use std::borrow::Borrow;
use std::result;
use std::time::Duration;

use keyutils_raw::*;
use log::error;
use uninit::extension_traits::VecCapacity;

use crate::constants::{Permission, SpecialKeyring};
use crate::keytype::*;
use crate::keytypes;

/// Reexport of `Errno` as `Error`.
pub type Error = errno::Errno;
/// Simpler `Result` type with the error already set.
pub type Result<T> = result::Result<T, Error>;

/// Request a key from the kernel.
fn request_impl<K: KeyType>(
    description: &str,
    info: Option<&str>,
    id: Option<KeyringSerial>,
) -> Result<KeyringSerial> {
    request_key(K::name(), description, info, id)
}

fn read_impl(id: KeyringSerial) -> Result<Vec<u8>> {
    let mut sz = keyctl_read(id, None)?;
    let mut buffer = vec![0; sz];
    loop {
        let write_buffer = buffer.get_backing_buffer();
        sz = keyctl_read(id, Some(unsafe { write_buffer.as_mut_uninit() }))?;

        if sz <= buffer.capacity() {
            break;
        }

        buffer.resize(sz, 0);
    }
    buffer.truncate(sz);
    Ok(buffer)
}

/// Representation of a kernel keyring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyring {
    id: KeyringSerial,
}

impl Keyring {
    /// Instantiate a keyring from an ID.
    ///
    /// # Safety
    ///
    /// This method assumes that the given serial is a valid keyring ID at the kernel level.
    pub unsafe fn new(id: KeyringSerial) -> Self {
        Keyring { id }
    }

    fn new_impl(id: KeyringSerial) -> Self {
        Keyring { id }
    }

    pub(crate) fn serial(&self) -> KeyringSerial {
        self.id
    }

    fn get_keyring(id: SpecialKeyring, create: bool) -> Result<Keyring> {
        keyctl_get_keyring_id(id.serial(), create).map(Self::new_impl)
    }

    /// Attach to a special keyring. Fails if the keyring does not already exist.
    pub fn attach(id: SpecialKeyring) -> Result<Self> {
        Self::get_keyring(id, false)
    }

    /// Attach to a special keyring or create it if it does not exist.
    pub fn attach_or_create(id: SpecialKeyring) -> Result<Self> {
        Self::get_keyring(id, true)
    }

    /// Create a new anonymous keyring and set it as the session keyring.
    pub fn join_anonymous_session() -> Result<Self> {
        keyctl_join_session_keyring(None).map(Self::new_impl)
    }

    /// Attach to a named session keyring.
    ///
    /// If a keyring named `name` exists, attach it as the session keyring (requires the
    /// `search` permission). If it does not exist, create it and attach it as the session
    /// keyring.
    pub fn join_session<N>(name: N) -> Result<Self>
    where
        N: AsRef<str>,
    {
        keyctl_join_session_keyring(Some(name.as_ref())).map(Self::new_impl)
    }

    /// Hand the session keyring this process joined to its parent process.
    ///
    /// The parent's session keyring must not have changed since this process was forked from
    /// it, or the kernel refuses the handoff with `EINVAL`.
    pub fn session_to_parent() -> Result<()> {
        keyctl_session_to_parent()
    }

    /// Adds a link to `key` to the keyring.
    ///
    /// Requires `write` permission on the keyring and `link` permission on the key.
    pub fn link_key(&mut self, key: &Key) -> Result<()> {
        keyctl_link(key.id, self.id)
    }

    /// Removes the link to `key` from the keyring.
    ///
    /// Requires `write` permission on the keyring.
    pub fn unlink_key(&mut self, key: &Key) -> Result<()> {
        keyctl_unlink(key.id, self.id)
    }

    /// Adds a link to `keyring` to this keyring.
    pub fn link_keyring(&mut self, keyring: &Keyring) -> Result<()> {
        keyctl_link(keyring.id, self.id)
    }

    /// Removes the link to `keyring` from this keyring.
    pub fn unlink_keyring(&mut self, keyring: &Keyring) -> Result<()> {
        keyctl_unlink(keyring.id, self.id)
    }

    /// Adds a key of the given type and description to the keyring.
    ///
    /// If a key with the same description already exists in the keyring, its payload is
    /// replaced and the old key's link is dropped. Requires `write` permission on the keyring.
    pub fn add_key<K, D, P>(&mut self, description: D, payload: P) -> Result<Key>
    where
        K: KeyType,
        D: Borrow<K::Description>,
        P: Borrow<K::Payload>,
    {
        self.add_key_impl::<K>(description.borrow(), payload.borrow())
            .map(Key::new_impl)
    }

    fn add_key_impl<K>(&mut self, description: &K::Description, payload: &K::Payload) -> Result<KeyringSerial>
    where
        K: KeyType,
    {
        add_key(K::name(), &description.description(), &payload.payload(), self.id)
    }

    /// Creates a new `user`-keytype secret in this keyring, the only key shape memento uses.
    pub fn add_secret<D>(&mut self, description: D, payload: &[u8]) -> Result<Key>
    where
        D: AsRef<str>,
    {
        self.add_key::<keytypes::User, _, _>(description.as_ref(), payload)
    }

    /// Revokes the keyring.
    ///
    /// Requires `write` permission on the keyring.
    pub fn revoke(self) -> Result<()> {
        keyctl_revoke(self.id)
    }

    /// Set the permissions on the keyring.
    ///
    /// Requires the `setattr` permission on the keyring and the SysAdmin capability if the
    /// current user does not own the keyring.
    pub fn set_permissions(&mut self, perms: Permission) -> Result<()> {
        keyctl_setperm(self.id, perms.bits())
    }

    /// Retrieve metadata about the keyring.
    ///
    /// # Panics
    ///
    /// If the kernel returns malformed data, the parser will panic.
    pub fn description(&self) -> Result<Description> {
        let mut sz = keyctl_describe(self.id, None)?;
        let mut buffer = vec![0; sz];
        loop {
            let write_buffer = buffer.get_backing_buffer();
            sz = keyctl_describe(self.id, Some(unsafe { write_buffer.as_mut_uninit() }))?;

            if sz <= buffer.capacity() {
                break;
            }

            buffer.resize(sz, 0);
        }
        buffer.truncate(sz);

        let description = String::from_utf8(buffer).expect("kernel descriptions are always ASCII");
        Ok(Description::parse(&description).expect("the kernel always returns 5 `;`-separated fields"))
    }

    /// Set an expiration timer on the keyring.
    ///
    /// A timeout of `Duration::from_secs(0)` clears any existing expiration. Requires the
    /// `setattr` permission on the keyring.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        keyctl_set_timeout(self.id, timeout.as_secs() as TimeoutSeconds)
    }

    /// Invalidates the keyring and schedules it for removal.
    ///
    /// Requires the `search` permission on the keyring.
    pub fn invalidate(self) -> Result<()> {
        keyctl_invalidate(self.id)
    }
}

/// Representation of a kernel key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    id: KeyringSerial,
}

impl Key {
    /// Instantiate a key from an ID.
    ///
    /// # Safety
    ///
    /// This method assumes that the given serial is a valid key ID at the kernel level.
    pub unsafe fn new(id: KeyringSerial) -> Self {
        Self::new_impl(id)
    }

    fn new_impl(id: KeyringSerial) -> Self {
        Key { id }
    }

    pub(crate) fn serial(&self) -> KeyringSerial {
        self.id
    }

    /// Requests a key with the given type and description by searching the thread, process,
    /// and session keyrings.
    ///
    /// If `target` is given, the found key is linked into it.
    pub fn request<'a, K, D, T>(description: D, target: T) -> Result<Self>
    where
        K: KeyType,
        D: Borrow<K::Description>,
        T: Into<Option<TargetKeyring<'a>>>,
    {
        request_impl::<K>(&description.borrow().description(), None, target.into().map(TargetKeyring::serial))
            .map(Self::new_impl)
    }

    /// Revokes the key. Requires `write` permission on the key.
    pub fn revoke(self) -> Result<()> {
        Keyring::new_impl(self.id).revoke()
    }

    /// Set the permissions on the key.
    pub fn set_permissions(&mut self, perms: Permission) -> Result<()> {
        Keyring::new_impl(self.id).set_permissions(perms)
    }

    /// Retrieve metadata about the key.
    pub fn description(&self) -> Result<Description> {
        Keyring::new_impl(self.id).description()
    }

    /// Read the payload of the key. Requires `read` permission on the key.
    pub fn read(&self) -> Result<Vec<u8>> {
        read_impl(self.id)
    }

    /// Set an expiration timer on the key.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        Keyring::new_impl(self.id).set_timeout(timeout)
    }

    /// Invalidates the key and schedules it for removal.
    pub fn invalidate(self) -> Result<()> {
        Keyring::new_impl(self.id).invalidate()
    }
}

/// Structure representing the metadata about a key or keyring.
#[derive(Debug, Clone)]
pub struct Description {
    /// The type of the key.
    pub type_: String,
    /// The user owner of the key.
    pub uid: libc::uid_t,
    /// The group owner of the key.
    pub gid: libc::gid_t,
    /// The permissions of the key.
    pub perms: Permission,
    /// The plaintext description of the key.
    pub description: String,
}

impl Description {
    fn parse(desc: &str) -> Option<Description> {
        let mut pieces = desc.split(';').collect::<Vec<_>>();
        // The kernel extends this string by adding fields at the front, so read it in reverse
        // to keep field positions stable.
        pieces.reverse();
        let len = pieces.len();
        if len < 5 {
            None
        } else {
            if len > 5 {
                error!("unexpected extra fields in key description: {}", desc);
            }
            let bits = KeyPermissions::from_str_radix(pieces[1], 16).unwrap();
            if Permission::from_bits(bits).is_none() {
                error!("unexpected permission bits in key description: {:x}", bits);
            }
            Some(Description {
                type_: pieces[4].to_owned(),
                uid: pieces[3].parse::<libc::uid_t>().unwrap(),
                gid: pieces[2].parse::<libc::gid_t>().unwrap(),
                perms: Permission::from_bits_truncate(bits),
                description: pieces[0].to_owned(),
            })
        }
    }
}

/// The destination keyring of a key request or creation.
#[derive(Debug)]
pub enum TargetKeyring<'a> {
    /// A special keyring.
    Special(SpecialKeyring),
    /// A specific keyring.
    Keyring(&'a mut Keyring),
}

impl<'a> TargetKeyring<'a> {
    fn serial(self) -> KeyringSerial {
        match self {
            TargetKeyring::Special(special) => {
                KeyringSerial::new(special.serial()).expect("special keyring serials are never zero")
            }
            TargetKeyring::Keyring(keyring) => keyring.id,
        }
    }
}

impl<'a> From<SpecialKeyring> for TargetKeyring<'a> {
    fn from(special: SpecialKeyring) -> Self {
        TargetKeyring::Special(special)
    }
}

impl<'a> From<&'a mut Keyring> for TargetKeyring<'a> {
    fn from(keyring: &'a mut Keyring) -> Self {
        TargetKeyring::Keyring(keyring)
    }
}

impl<'a> From<SpecialKeyring> for Option<TargetKeyring<'a>> {
    fn from(special: SpecialKeyring) -> Self {
        Some(special.into())
    }
}

impl<'a> From<&'a mut Keyring> for Option<TargetKeyring<'a>> {
    fn from(keyring: &'a mut Keyring) -> Self {
        Some(keyring.into())
    }
}

#[cfg(test)]
mod tests {
    use super::Description;

    #[test]
    fn parse_user_key_description() {
        let desc = Description::parse("user;1000;1000;3f010000;memento:fob").unwrap();
        assert_eq!(desc.type_, "user");
        assert_eq!(desc.uid, 1000);
        assert_eq!(desc.gid, 1000);
        assert_eq!(desc.description, "memento:fob");
    }

    #[test]
    fn parse_rejects_short_description() {
        assert!(Description::parse("user;1000;1000;3f010000").is_none());
    }
}
