//! Zeroizing holder for passphrases and other sensitive character sequences.

use secrecy::{ExposeSecret, ExposeSecretMut, SecretBox};
use std::fmt;
use zeroize::Zeroize;

/// A sensitive character sequence, such as the passphrase that unlocks an
/// encrypted private key or a PKCS#12 archive.
///
/// The content lives in a [`SecretBox`] and can be read through
/// [`SecretBuffer::expose`] until the buffer is released.
/// [`SecretBuffer::release`] overwrites the backing memory with zeros in place
/// and is idempotent; dropping the buffer zeroizes it as well.
///
/// The type has no `Display` implementation and its `Debug` output is redacted.
/// Copies are only made through [`SecretBuffer::duplicate`], so every copy is
/// itself a `SecretBuffer` and is zeroized the same way.
pub struct SecretBuffer {
    content: SecretBox<String>,
    released: bool,
}

impl SecretBuffer {
    /// Takes ownership of `content` without copying its characters.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: SecretBox::new(Box::new(content.into())),
            released: false,
        }
    }

    /// Creates an empty buffer, e.g. to be filled one character at a time from
    /// an interactive prompt.
    pub fn empty() -> Self {
        Self::new(String::new())
    }

    /// Returns the content, or `None` once the buffer has been released.
    pub fn expose(&self) -> Option<&str> {
        if self.released {
            None
        } else {
            Some(self.content.expose_secret().as_str())
        }
    }

    /// Returns `true` once [`SecretBuffer::release`] has run.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Length of the content in bytes; zero after release.
    pub fn len(&self) -> usize {
        self.content.expose_secret().len()
    }

    /// Returns `true` if the buffer holds no characters.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a character.
    ///
    /// When the buffer has to grow, the old allocation is zeroized before it is
    /// returned to the allocator, so no partial copy of the secret is left
    /// behind. Has no effect once the buffer is released.
    pub fn push(&mut self, ch: char) {
        if self.released {
            return;
        }
        let content = self.content.expose_secret_mut();
        if content.len() + ch.len_utf8() > content.capacity() {
            let mut grown = String::with_capacity((content.capacity() * 2).max(32));
            grown.push_str(content);
            content.zeroize();
            *content = grown;
        }
        content.push(ch);
    }

    /// Returns an independent buffer holding a copy of the same content.
    ///
    /// Releasing either buffer does not affect the other. Duplicating a
    /// released buffer yields a released buffer.
    pub fn duplicate(&self) -> Self {
        match self.expose() {
            Some(content) => Self::new(content.to_owned()),
            None => Self {
                content: SecretBox::new(Box::default()),
                released: true,
            },
        }
    }

    /// Overwrites the content with zeros.
    ///
    /// The allocation itself is kept until the buffer is dropped. Calling this
    /// more than once is a no-op.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.content.expose_secret_mut().zeroize();
        self.released = true;
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer([REDACTED])")
    }
}

impl From<String> for SecretBuffer {
    fn from(content: String) -> Self {
        Self::new(content)
    }
}

impl From<&str> for SecretBuffer {
    fn from(content: &str) -> Self {
        Self::new(content.to_owned())
    }
}

impl FromIterator<char> for SecretBuffer {
    fn from_iter<I: IntoIterator<Item = char>>(iter: I) -> Self {
        let mut buffer = Self::empty();
        for ch in iter {
            buffer.push(ch);
        }
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Copies `len` bytes starting at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must point into a live allocation with at least `len` initialized bytes.
    unsafe fn read_backing(ptr: *const u8, len: usize) -> Vec<u8> {
        std::slice::from_raw_parts(ptr, len).to_vec()
    }

    #[test]
    fn test_expose_returns_content() {
        let secret = SecretBuffer::from("test123");
        assert_eq!(secret.expose(), Some("test123"));
        assert_eq!(secret.len(), 7);
        assert!(!secret.is_released());
    }

    #[test]
    fn test_release_overwrites_backing_memory() {
        let mut secret = SecretBuffer::new(String::from("test123"));
        let ptr = secret.content.expose_secret().as_ptr();
        let len = secret.len();

        // SAFETY: the string is live and `len` bytes of it are initialized.
        let before = unsafe { read_backing(ptr, len) };
        assert_eq!(before, b"test123");

        secret.release();

        // The allocation is kept until drop, so it can still be inspected in place.
        assert_eq!(secret.content.expose_secret().as_ptr(), ptr);
        // SAFETY: zeroize wrote zeros over the whole capacity, which is still owned by `secret`.
        let after = unsafe { read_backing(ptr, len) };
        assert!(after.iter().all(|b| *b == 0));
        assert_eq!(secret.expose(), None);
        assert!(secret.is_empty());
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut secret = SecretBuffer::from("test123");
        secret.release();
        secret.release();
        assert!(secret.is_released());
        assert_eq!(secret.expose(), None);
    }

    #[test]
    fn test_duplicate_is_independent() {
        let mut original = SecretBuffer::from("test123");
        let duplicate = original.duplicate();

        original.release();

        assert_eq!(original.expose(), None);
        assert_eq!(duplicate.expose(), Some("test123"));
    }

    #[test]
    fn test_duplicate_of_released_buffer_is_released() {
        let mut original = SecretBuffer::from("test123");
        original.release();

        let duplicate = original.duplicate();
        assert!(duplicate.is_released());
        assert_eq!(duplicate.expose(), None);
    }

    #[test]
    fn test_push_grows_buffer() {
        let secret: SecretBuffer = "a passphrase longer than thirty-two characters"
            .chars()
            .collect();
        assert_eq!(
            secret.expose(),
            Some("a passphrase longer than thirty-two characters")
        );
    }

    #[test]
    fn test_push_after_release_is_ignored() {
        let mut secret = SecretBuffer::from("abc");
        secret.release();
        secret.push('d');
        assert_eq!(secret.expose(), None);
        assert!(secret.is_empty());
    }

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretBuffer::from("test123");
        let debug = format!("{secret:?}");
        assert!(!debug.contains("test123"));
        assert_eq!(debug, "SecretBuffer([REDACTED])");
    }
}
