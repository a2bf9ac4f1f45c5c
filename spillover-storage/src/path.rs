//  Copyright 2026 spillover Project Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

use std::{
    fmt::{Debug, Display, Write},
    hash::Hasher,
};

use spillover_common::error::{Error, Result};
use twox_hash::XxHash64;

/// Longest path segment most file systems accept, in bytes.
const MAX_SEGMENT_LEN: usize = 255;

/// Maps cache keys to file paths below the persistence root.
///
/// The mapping must be deterministic and stable across restarts, so values evicted by a previous process can be
/// found again. Different keys must map to different paths.
pub trait PathMapper<K>: Send + Sync + 'static {
    /// Path segments of the entry file of the key, relative to the persistence root.
    ///
    /// Returns [`Error::InvalidKeyPath`] if the key cannot be mapped safely.
    fn path_for(&self, key: &K) -> Result<Vec<String>>;

    /// Whether the key may be written to the disk tier at all.
    ///
    /// Keys excluded here are dropped on eviction and never looked up on disk.
    #[expect(unused_variables)]
    fn should_persist(&self, key: &K) -> bool {
        true
    }
}

/// Check that a path segment stays within its parent directory.
///
/// Rejects empty segments, `.` and `..`, path separators, NUL, and segments longer than 255 bytes. Returns the
/// reason on rejection.
pub fn validate_segment(segment: &str) -> std::result::Result<(), &'static str> {
    if segment.is_empty() {
        return Err("empty path segment");
    }
    if segment == "." || segment == ".." {
        return Err("relative path segment");
    }
    if segment.contains(['/', '\\']) {
        return Err("path segment contains a separator");
    }
    if segment.contains('\0') {
        return Err("path segment contains NUL");
    }
    if segment.len() > MAX_SEGMENT_LEN {
        return Err("path segment is longer than 255 bytes");
    }
    Ok(())
}

/// The default path mapper: one file per key, named by the key's [`Display`] form.
///
/// Keys whose display form is not a safe file name are rejected with [`Error::InvalidKeyPath`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyPathMapper;

impl<K> PathMapper<K> for KeyPathMapper
where
    K: Display + Debug,
{
    fn path_for(&self, key: &K) -> Result<Vec<String>> {
        let segment = key.to_string();
        validate_segment(&segment).map_err(|reason| Error::invalid_key_path(key, reason))?;
        Ok(vec![segment])
    }
}

/// A path mapper that accepts any key and spreads the entry files over 256 directories.
///
/// The file name is the key's [`Display`] form with every byte outside `[A-Za-z0-9._-]` percent-escaped, so unsafe
/// keys are sanitized instead of rejected. The directory is the low byte of the xxHash64 of the file name, in hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanOutPathMapper;

impl FanOutPathMapper {
    fn escape(raw: &str) -> String {
        match raw {
            // A lone `%` is never produced for a non-empty input.
            "" => return "%".to_string(),
            "." => return "%2E".to_string(),
            ".." => return "%2E%2E".to_string(),
            _ => {}
        }
        let mut escaped = String::with_capacity(raw.len());
        for byte in raw.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
                escaped.push(byte as char);
            } else {
                // Writing into a `String` cannot fail.
                let _ = write!(escaped, "%{byte:02X}");
            }
        }
        escaped
    }

    fn bucket(name: &str) -> String {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(name.as_bytes());
        format!("{:02x}", hasher.finish() & 0xff)
    }
}

impl<K> PathMapper<K> for FanOutPathMapper
where
    K: Display + Debug,
{
    fn path_for(&self, key: &K) -> Result<Vec<String>> {
        let name = Self::escape(&key.to_string());
        validate_segment(&name).map_err(|reason| Error::invalid_key_path(key, reason))?;
        Ok(vec![Self::bucket(&name), name])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_segment() {
        for segment in ["key0", "a.b", "..a", "%2F", "日本"] {
            assert!(validate_segment(segment).is_ok(), "{segment}");
        }
        for segment in ["", ".", "..", "a/b", "/abs", "a\\b", "a\0b"] {
            assert!(validate_segment(segment).is_err(), "{segment:?}");
        }
        assert!(validate_segment(&"k".repeat(255)).is_ok());
        assert!(validate_segment(&"k".repeat(256)).is_err());
    }

    #[test]
    fn test_key_path_mapper() {
        assert_eq!(KeyPathMapper.path_for(&"key0").unwrap(), vec!["key0".to_string()]);
        assert_eq!(KeyPathMapper.path_for(&42u64).unwrap(), vec!["42".to_string()]);
        assert!(PathMapper::<&str>::should_persist(&KeyPathMapper, &"key0"));

        for key in ["..", "../etc/passwd", "/etc/passwd", ""] {
            let err = KeyPathMapper.path_for(&key).unwrap_err();
            assert!(err.is_invalid_key_path(), "{key:?}: {err}");
        }
    }

    #[test]
    fn test_fan_out_path_mapper() {
        let path = FanOutPathMapper.path_for(&"key0").unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].len(), 2);
        assert!(path[0].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(path[1], "key0");
        assert_eq!(FanOutPathMapper.path_for(&"key0").unwrap(), path);

        assert_eq!(FanOutPathMapper.path_for(&"../etc").unwrap()[1], "..%2Fetc");
        assert_eq!(FanOutPathMapper.path_for(&"..").unwrap()[1], "%2E%2E");
        assert_eq!(FanOutPathMapper.path_for(&"").unwrap()[1], "%");
        assert_eq!(FanOutPathMapper.path_for(&"a b%").unwrap()[1], "a%20b%25");

        // Escaping is injective: `%` itself is escaped.
        assert_ne!(
            FanOutPathMapper.path_for(&"a/b").unwrap(),
            FanOutPathMapper.path_for(&"a%2Fb").unwrap()
        );

        for key in ["key0", "../etc", "..", "", "a b%", "日本"] {
            for segment in FanOutPathMapper.path_for(&key).unwrap() {
                assert!(validate_segment(&segment).is_ok(), "{key:?} -> {segment:?}");
            }
        }

        let err = FanOutPathMapper.path_for(&"k".repeat(256)).unwrap_err();
        assert!(err.is_invalid_key_path());
    }
}
