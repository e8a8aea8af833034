//! Key derivation and password checks of the standard security handler
//! (revisions 2 to 4, ISO 32000-1 section 7.6.3).

use md5::{Digest, Md5};

use super::rc4::rc4_crypt;

const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
    0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
    0x69, 0x7A,
];

/// Parameters read from (or written to) an `/Encrypt` dictionary.
#[derive(Debug, Clone)]
pub(crate) struct StandardParams {
    pub revision: u32,
    /// Key length in bytes, 5..=16.
    pub key_length: usize,
    pub owner_value: Vec<u8>,
    pub user_value: Vec<u8>,
    pub permissions: i32,
    pub file_id: Vec<u8>,
    pub encrypt_metadata: bool,
}

pub(crate) fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PADDING[..32 - len]);
    padded
}

/// Algorithm 2: file encryption key from a user password.
pub(crate) fn file_key(password: &[u8], params: &StandardParams) -> Vec<u8> {
    let n = params.key_length.min(16);
    let mut hasher = Md5::new();
    hasher.update(pad_password(password));
    hasher.update(&params.owner_value);
    hasher.update(params.permissions.to_le_bytes());
    hasher.update(&params.file_id);
    if params.revision >= 4 && !params.encrypt_metadata {
        hasher.update([0xFF; 4]);
    }
    let mut hash = hasher.finalize().to_vec();

    if params.revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..n]).to_vec();
        }
    }
    hash.truncate(n);
    hash
}

/// RC4 key used by algorithms 3 and 7, derived from the owner password.
fn owner_rc4_key(owner_password: &[u8], revision: u32, key_length: usize) -> Vec<u8> {
    let n = key_length.min(16);
    let mut hash = Md5::digest(pad_password(owner_password)).to_vec();
    if revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..n]).to_vec();
        }
    }
    hash.truncate(n);
    hash
}

fn xor_key(key: &[u8], round: u8) -> Vec<u8> {
    key.iter().map(|b| b ^ round).collect()
}

/// Algorithm 3: the `/O` value.
pub(crate) fn owner_value(
    owner_password: &[u8],
    user_password: &[u8],
    revision: u32,
    key_length: usize,
) -> Vec<u8> {
    let owner = if owner_password.is_empty() {
        user_password
    } else {
        owner_password
    };
    let key = owner_rc4_key(owner, revision, key_length);
    let mut result = rc4_crypt(&key, &pad_password(user_password));
    if revision >= 3 {
        for round in 1..=19u8 {
            result = rc4_crypt(&xor_key(&key, round), &result);
        }
    }
    result
}

/// Algorithms 4 and 5: the `/U` value for a file key.
pub(crate) fn user_value(key: &[u8], revision: u32, file_id: &[u8]) -> Vec<u8> {
    if revision < 3 {
        return rc4_crypt(key, &PADDING);
    }
    let mut hasher = Md5::new();
    hasher.update(PADDING);
    hasher.update(file_id);
    let mut hash = hasher.finalize().to_vec();
    for round in 0..20u8 {
        hash = rc4_crypt(&xor_key(key, round), &hash);
    }
    hash.extend_from_slice(&[0u8; 16]);
    hash
}

/// Algorithm 6: returns the file key when `password` is the user password.
pub(crate) fn authenticate_user(password: &[u8], params: &StandardParams) -> Option<Vec<u8>> {
    let key = file_key(password, params);
    let expected = user_value(&key, params.revision, &params.file_id);
    let compared = if params.revision >= 3 { 16 } else { 32 };
    if params.user_value.len() < compared || expected.len() < compared {
        return None;
    }
    if constant_time_eq(&params.user_value[..compared], &expected[..compared]) {
        Some(key)
    } else {
        None
    }
}

/// Algorithm 7: recover the user password from `/O` and authenticate with it.
pub(crate) fn authenticate_owner(password: &[u8], params: &StandardParams) -> Option<Vec<u8>> {
    let key = owner_rc4_key(password, params.revision, params.key_length);
    let mut user_password = params.owner_value.clone();
    if params.revision >= 3 {
        for round in (0..=19u8).rev() {
            user_password = rc4_crypt(&xor_key(&key, round), &user_password);
        }
    } else {
        user_password = rc4_crypt(&key, &user_password);
    }
    authenticate_user(&user_password, params)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_for(user: &[u8], owner: &[u8], revision: u32, key_length: usize) -> StandardParams {
        let mut params = StandardParams {
            revision,
            key_length,
            owner_value: owner_value(owner, user, revision, key_length),
            user_value: Vec::new(),
            permissions: -3904,
            file_id: b"0123456789abcdef".to_vec(),
            encrypt_metadata: true,
        };
        let key = file_key(user, &params);
        params.user_value = user_value(&key, revision, &params.file_id);
        params
    }

    #[test]
    fn test_pad_password() {
        let padded = pad_password(b"abc");
        assert_eq!(&padded[..3], b"abc");
        assert_eq!(&padded[3..], &PADDING[..29]);
        assert_eq!(pad_password(&[1u8; 40]), [1u8; 32]);
    }

    #[test]
    fn test_user_password_r3() {
        let params = params_for(b"secret", b"owner", 3, 16);
        assert!(authenticate_user(b"secret", &params).is_some());
        assert!(authenticate_user(b"wrong", &params).is_none());
        assert_eq!(params.user_value.len(), 32);
        assert_eq!(params.owner_value.len(), 32);
    }

    #[test]
    fn test_user_password_r2() {
        let params = params_for(b"pw", b"", 2, 5);
        let key = authenticate_user(b"pw", &params).unwrap();
        assert_eq!(key.len(), 5);
        assert!(authenticate_user(b"", &params).is_none());
    }

    #[test]
    fn test_owner_password_unlocks_file_key() {
        for (revision, len) in [(2, 5), (3, 16)] {
            let params = params_for(b"user", b"boss", revision, len);
            let via_user = authenticate_user(b"user", &params).unwrap();
            let via_owner = authenticate_owner(b"boss", &params).unwrap();
            assert_eq!(via_user, via_owner);
            assert!(authenticate_owner(b"user-guess", &params).is_none());
        }
    }

    #[test]
    fn test_empty_owner_falls_back_to_user() {
        let params = params_for(b"same", b"", 3, 16);
        assert!(authenticate_owner(b"same", &params).is_some());
    }

    #[test]
    fn test_unencrypted_metadata_changes_key() {
        let mut params = params_for(b"u", b"o", 4, 16);
        let with_metadata = file_key(b"u", &params);
        params.encrypt_metadata = false;
        assert_ne!(with_metadata, file_key(b"u", &params));
    }
}
