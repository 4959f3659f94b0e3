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

use keyutils_raw::*;

/// Special keyrings predefined for a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialKeyring {
    /// A thread-specific keyring.
    ThreadKeyring,
    /// A process-specific keyring.
    ProcessKeyring,
    /// A session-specific keyring.
    SessionKeyring,
    /// A user-specific keyring.
    UserKeyring,
    /// A user-specific session keyring.
    UserSessionKeyring,
    /// A group-specific keyring.
    GroupKeyring,
}

impl SpecialKeyring {
    /// The raw serial number reserved for the special keyring.
    ///
    /// These are small negative sentinels, not real key serials; the kernel interprets them
    /// specially wherever a serial is accepted.
    pub(crate) fn serial(self) -> libc::c_int {
        match self {
            SpecialKeyring::ThreadKeyring => KEY_SPEC_THREAD_KEYRING,
            SpecialKeyring::ProcessKeyring => KEY_SPEC_PROCESS_KEYRING,
            SpecialKeyring::SessionKeyring => KEY_SPEC_SESSION_KEYRING,
            SpecialKeyring::UserKeyring => KEY_SPEC_USER_KEYRING,
            SpecialKeyring::UserSessionKeyring => KEY_SPEC_USER_SESSION_KEYRING,
            SpecialKeyring::GroupKeyring => KEY_SPEC_GROUP_KEYRING,
        }
    }
}

bitflags! {
    /// Permissions for a key or keyring.
    ///
    /// Kernel permission bits are split into four bytes: possessor, user, group, and other. Each
    /// byte carries the same `VIEW`/`READ`/`WRITE`/`SEARCH`/`LINK`/`SETATTR` vocabulary.
    pub struct Permission: KeyPermissions {
        /// The possessor of the key may view its attributes.
        const POSSESSOR_VIEW = KEY_POS_VIEW;
        /// The possessor of the key may read its payload (or list a keyring).
        const POSSESSOR_READ = KEY_POS_READ;
        /// The possessor of the key may update its payload (or link into a keyring).
        const POSSESSOR_WRITE = KEY_POS_WRITE;
        /// The possessor of the key may find it in a search.
        const POSSESSOR_SEARCH = KEY_POS_SEARCH;
        /// The possessor of the key may create a link to it.
        const POSSESSOR_LINK = KEY_POS_LINK;
        /// The possessor of the key may change its attributes.
        const POSSESSOR_SETATTR = KEY_POS_SETATTR;
        /// All possessor permissions.
        const POSSESSOR_ALL = KEY_POS_ALL;

        /// The owning user may view the key's attributes.
        const USER_VIEW = KEY_USR_VIEW;
        /// The owning user may read the key's payload (or list a keyring).
        const USER_READ = KEY_USR_READ;
        /// The owning user may update the key's payload (or link into a keyring).
        const USER_WRITE = KEY_USR_WRITE;
        /// The owning user may find the key in a search.
        const USER_SEARCH = KEY_USR_SEARCH;
        /// The owning user may create a link to the key.
        const USER_LINK = KEY_USR_LINK;
        /// The owning user may change the key's attributes.
        const USER_SETATTR = KEY_USR_SETATTR;
        /// All user permissions.
        const USER_ALL = KEY_USR_ALL;

        /// All group permissions.
        const GROUP_ALL = KEY_GRP_ALL;
        /// All other (world) permissions.
        const OTHER_ALL = KEY_OTH_ALL;
    }
}
