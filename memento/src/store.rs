//! Keyring-backed cache for the operator's secret.
//!
//! A [`Store`] derives a Fernet key from caller-supplied key material and an optional salt,
//! and uses it to encrypt/decrypt a memento that otherwise lives only as a `user`-type key in
//! the kernel session keyring.

use std::fmt;
use std::time::Duration;

use hmac::Hmac;
use keyutils::{Key, Keyring, Permission, SpecialKeyring};
use log::debug;
use sha2::Sha256;

use crate::error::{Error, Result};

/// Mementos larger than this are rejected outright; the cache is for tokens, not payloads.
pub const MEMENTO_MAX_LEN: usize = 16 * 1024;

const PBKDF2_ROUNDS: u32 = 100_000;
const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(12 * 60 * 60);

/// The permission mask every cached entry is created with: the owning user may view, read, and
/// change attributes; the possessor (this process, while it holds the serial) may do anything;
/// nobody else may do anything at all.
fn entry_permissions() -> Permission {
    Permission::POSSESSOR_ALL | Permission::USER_VIEW | Permission::USER_READ | Permission::USER_SETATTR
}

/// The namespaced identifier a cache entry is filed under: `owner:logicalKey[-parentPid]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyName(String);

impl KeyName {
    /// Build a key name from an owner and logical key, optionally scoped to a parent pid.
    pub fn new(owner: &str, logical_key: &str, parent_pid: Option<i32>) -> Self {
        let name = match parent_pid {
            Some(pid) => format!("{}:{}-{}", owner, logical_key, pid),
            None => format!("{}:{}", owner, logical_key),
        };
        KeyName(name)
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for KeyName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An optional salt read from a file.
///
/// Carried as raw bytes exactly as read: a trailing newline, if the salt file has one, is part
/// of the PBKDF2 input and must not be stripped to stay interoperable with caches written by
/// systems that don't strip it either.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Salt(Option<Vec<u8>>);

impl Salt {
    /// No salt at all (unsalted mode).
    pub fn none() -> Self {
        Salt(None)
    }

    /// Wrap already-read salt bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Salt(Some(bytes))
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_deref().unwrap_or(b"")
    }
}

/// Outcome of [`Store::recall`].
#[derive(Debug)]
pub enum RecallResult {
    /// The cache held a valid entry, decrypted successfully.
    Present(Vec<u8>),
    /// No cache entry exists (or it expired/was revoked).
    Absent,
    /// A cache entry exists but didn't decrypt under the derived key: a salt or key mismatch.
    Undecipherable,
}

/// Derive the 32-byte PBKDF2 key and base64url-encode it the way `fernet::Fernet::new` expects.
fn derive_fernet_key(key_material: &[u8], salt: &Salt) -> String {
    let mut output = [0u8; 32];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(key_material, salt.as_bytes(), PBKDF2_ROUNDS, &mut output);
    base64::encode_config(output, base64::URL_SAFE)
}

/// Encrypted, kernel-keyring-backed cache for one memento.
pub struct Store {
    name: KeyName,
    fernet: fernet::Fernet,
    keepalive: Duration,
    session: Keyring,
}

impl Store {
    /// Derive the cipher key and attach to (or create) the session keyring.
    ///
    /// `keepalive`: `None` means the 12-hour default; `Some(Duration::ZERO)` means indefinite;
    /// anything else is the literal timeout.
    pub fn new(name: KeyName, key_material: &[u8], salt: &Salt, keepalive: Option<Duration>) -> Result<Self> {
        let key = derive_fernet_key(key_material, salt);
        let fernet = fernet::Fernet::new(&key)
            .ok_or_else(|| Error::Cryptographic("derived key is not a valid Fernet key".into()))?;

        let session = match Keyring::attach(SpecialKeyring::SessionKeyring) {
            Ok(session) => session,
            Err(err) if err == errno::Errno(libc::ENOKEY) => {
                debug!("no session keyring attached to this process, joining a new one");
                let session = Keyring::join_anonymous_session()
                    .map_err(|err| Error::Environment(format!("failed to join a session keyring: {}", err)))?;
                // So the invoking shell keeps using this keyring once memento exits: without
                // this, a shell that started with no session keyring would get a fresh,
                // already-abandoned one from each invocation.
                Keyring::session_to_parent()
                    .map_err(|err| Error::Environment(format!("failed to hand off session keyring: {}", err)))?;
                session
            }
            Err(err) => return Err(Error::Keyring(err)),
        };

        Ok(Store {
            name,
            fernet,
            keepalive: keepalive.unwrap_or(DEFAULT_KEEPALIVE),
            session,
        })
    }

    fn find(&self) -> Result<Option<Key>> {
        match Key::request::<keyutils::keytypes::User, _, _>(self.name.as_ref(), None) {
            Ok(key) => Ok(Some(key)),
            Err(err) if is_absent(err) => Ok(None),
            Err(err) => Err(Error::Keyring(err)),
        }
    }

    /// Look up the cached memento, refreshing its timeout on a hit.
    pub fn recall(&self) -> Result<RecallResult> {
        let mut key = match self.find()? {
            Some(key) => key,
            None => return Ok(RecallResult::Absent),
        };

        match key.set_timeout(self.keepalive) {
            Ok(()) => {}
            Err(err) if is_absent(err) => return Ok(RecallResult::Absent),
            Err(err) => return Err(Error::Keyring(err)),
        }

        let ciphertext = match key.read() {
            Ok(bytes) => bytes,
            Err(err) if is_absent(err) => return Ok(RecallResult::Absent),
            Err(err) => return Err(Error::Keyring(err)),
        };
        let token = String::from_utf8(ciphertext)
            .map_err(|_| Error::Cryptographic("cached payload is not valid UTF-8".into()))?;

        match self.fernet.decrypt(&token) {
            Ok(plaintext) => Ok(RecallResult::Present(plaintext)),
            Err(_) => Ok(RecallResult::Undecipherable),
        }
    }

    /// Encrypt and publish a new cache entry, revoking the previous one only after the new one
    /// is fully constructed and linked (invariant I3).
    pub fn memorise(&self, plaintext: &[u8]) -> Result<()> {
        if plaintext.len() > MEMENTO_MAX_LEN {
            return Err(Error::Caller(format!(
                "memento is {} bytes, limit is {}",
                plaintext.len(),
                MEMENTO_MAX_LEN
            )));
        }

        // Must be captured before `add_secret` below: once the new key is linked into the
        // process keyring, `find` (which searches the process keyring before the session one)
        // would return the new key's own serial instead of the prior entry's.
        let previous = self.find()?;

        let token = self.fernet.encrypt(plaintext);

        let mut process = Keyring::attach_or_create(SpecialKeyring::ProcessKeyring)?;
        let mut new_key = process.add_secret(self.name.as_ref(), token.as_bytes())?;
        // Permission mask before the session link (invariant I4): nobody can observe a
        // world/group-readable entry even transiently.
        new_key.set_permissions(entry_permissions())?;
        new_key.set_timeout(self.keepalive)?;

        let mut session = self.session.clone();
        session.link_key(&new_key)?;

        if let Some(previous) = previous {
            match previous.revoke() {
                Ok(()) | Err(errno::Errno(libc::ENOKEY)) => {}
                Err(err) => return Err(Error::Keyring(err)),
            }
        }

        Ok(())
    }

    /// Unlink and revoke the cached entry. Idempotent: calling this when nothing is cached is
    /// not an error.
    pub fn forget(&self) -> Result<()> {
        let key = match self.find()? {
            Some(key) => key,
            None => return Ok(()),
        };

        let mut session = self.session.clone();
        match session.unlink_key(&key) {
            Ok(()) | Err(errno::Errno(libc::ENOKEY)) => {}
            Err(err) => return Err(Error::Keyring(err)),
        }
        match key.revoke() {
            Ok(()) | Err(errno::Errno(libc::ENOKEY)) => Ok(()),
            Err(err) => Err(Error::Keyring(err)),
        }
    }
}

/// Whether a keyring error means "treat this as if the key were never here".
fn is_absent(err: errno::Errno) -> bool {
    matches!(err, errno::Errno(libc::ENOKEY) | errno::Errno(libc::EKEYEXPIRED) | errno::Errno(libc::EKEYREVOKED))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_name_without_parent_pid() {
        let name = KeyName::new("memento", "alpha", None);
        assert_eq!(name.as_ref(), "memento:alpha");
    }

    #[test]
    fn key_name_with_parent_pid() {
        let name = KeyName::new("memento", "alpha", Some(4242));
        assert_eq!(name.as_ref(), "memento:alpha-4242");
    }

    #[test]
    fn unsalted_derivation_is_deterministic() {
        let a = derive_fernet_key(b"hunter2", &Salt::none());
        let b = derive_fernet_key(b"hunter2", &Salt::none());
        assert_eq!(a, b);
    }

    #[test]
    fn different_salts_derive_different_keys() {
        let a = derive_fernet_key(b"hunter2", &Salt::from_bytes(b"aaa".to_vec()));
        let b = derive_fernet_key(b"hunter2", &Salt::from_bytes(b"bbb".to_vec()));
        assert_ne!(a, b);
    }

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let key = derive_fernet_key(b"hunter2", &Salt::none());
        let fernet = fernet::Fernet::new(&key).unwrap();
        let token = fernet.encrypt(b"a secret");
        assert_eq!(fernet.decrypt(&token).unwrap(), b"a secret");
    }
}
