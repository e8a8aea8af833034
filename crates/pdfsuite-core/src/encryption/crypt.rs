//! Per-object string and stream encryption over a lopdf object graph.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes128;
use cbc::{Decryptor, Encryptor};
use lopdf::{Dictionary, Object, ObjectId, StringFormat};
use md5::{Digest, Md5};
use tracing::{debug, info};

use super::rc4::rc4_crypt;
use super::standard::{self, StandardParams};
use super::{EncryptionSpec, PermissionSet};
use crate::error::{PdfSuiteError, Result};

type Aes128CbcEnc = Encryptor<Aes128>;
type Aes128CbcDec = Decryptor<Aes128>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CryptMethod {
    Identity,
    Rc4,
    AesV2,
}

#[derive(Debug, Clone)]
pub(crate) struct SecurityHandler {
    key: Vec<u8>,
    strings: CryptMethod,
    streams: CryptMethod,
    encrypt_metadata: bool,
}

impl SecurityHandler {
    pub(crate) fn new(key: Vec<u8>, strings: CryptMethod, streams: CryptMethod) -> Self {
        Self {
            key,
            strings,
            streams,
            encrypt_metadata: true,
        }
    }

    /// Algorithm 1: object key from the file key and object number.
    fn object_key(&self, id: ObjectId, method: CryptMethod) -> Vec<u8> {
        let mut hasher = Md5::new();
        hasher.update(&self.key);
        hasher.update(&id.0.to_le_bytes()[..3]);
        hasher.update(&id.1.to_le_bytes()[..2]);
        if method == CryptMethod::AesV2 {
            hasher.update(b"sAlT");
        }
        let digest = hasher.finalize();
        digest[..(self.key.len() + 5).min(16)].to_vec()
    }

    fn decrypt_bytes(&self, id: ObjectId, method: CryptMethod, data: &[u8]) -> Result<Vec<u8>> {
        match method {
            CryptMethod::Identity => Ok(data.to_vec()),
            CryptMethod::Rc4 => Ok(rc4_crypt(&self.object_key(id, method), data)),
            CryptMethod::AesV2 => aes_decrypt(&self.object_key(id, method), data),
        }
    }

    fn encrypt_bytes(&self, id: ObjectId, method: CryptMethod, data: &[u8]) -> Result<Vec<u8>> {
        match method {
            CryptMethod::Identity => Ok(data.to_vec()),
            CryptMethod::Rc4 => Ok(rc4_crypt(&self.object_key(id, method), data)),
            CryptMethod::AesV2 => aes_encrypt(&self.object_key(id, method), data),
        }
    }

    fn skips_stream(&self, dict: &Dictionary) -> bool {
        let type_is = |name: &[u8]| {
            dict.get(b"Type")
                .and_then(Object::as_name)
                .map(|n| n == name)
                .unwrap_or(false)
        };
        type_is(b"XRef") || (type_is(b"Metadata") && !self.encrypt_metadata)
    }

    pub(crate) fn decrypt_object(&self, id: ObjectId, object: &mut Object) -> Result<()> {
        self.transform(object, &|data: &[u8], method: CryptMethod| {
            self.decrypt_bytes(id, method, data)
        })
    }

    pub(crate) fn encrypt_object(&self, id: ObjectId, object: &mut Object) -> Result<()> {
        self.transform(object, &|data: &[u8], method: CryptMethod| {
            self.encrypt_bytes(id, method, data)
        })
    }

    fn transform(
        &self,
        object: &mut Object,
        apply: &dyn Fn(&[u8], CryptMethod) -> Result<Vec<u8>>,
    ) -> Result<()> {
        match object {
            Object::String(bytes, _) => {
                *bytes = apply(bytes, self.strings)?;
            }
            Object::Array(items) => {
                for item in items.iter_mut() {
                    self.transform(item, apply)?;
                }
            }
            Object::Dictionary(dict) => {
                for (_, value) in dict.iter_mut() {
                    self.transform(value, apply)?;
                }
            }
            Object::Stream(stream) => {
                for (_, value) in stream.dict.iter_mut() {
                    self.transform(value, apply)?;
                }
                if !self.skips_stream(&stream.dict) {
                    let content = apply(&stream.content, self.streams)?;
                    stream.set_content(content);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn aes_decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 16 {
        return Ok(Vec::new());
    }
    let (iv, body) = data.split_at(16);
    if body.is_empty() {
        return Ok(Vec::new());
    }
    if body.len() % 16 != 0 {
        return Err(PdfSuiteError::CorruptDocument(
            "AES payload is not a multiple of the block size".to_string(),
        ));
    }
    let mut buffer = body.to_vec();
    let cipher = Aes128CbcDec::new_from_slices(key, iv)
        .map_err(|e| PdfSuiteError::CorruptDocument(format!("AES key: {}", e)))?;
    let decrypted = cipher
        .decrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buffer)
        .map_err(|_| PdfSuiteError::CorruptDocument("AES decryption failed".to_string()))?;

    let pad = decrypted.last().copied().unwrap_or(0) as usize;
    if pad == 0 || pad > 16 || pad > decrypted.len() {
        return Err(PdfSuiteError::CorruptDocument("invalid AES padding".to_string()));
    }
    Ok(decrypted[..decrypted.len() - pad].to_vec())
}

/// AES-128-CBC with a content-derived IV, so output stays reproducible.
fn aes_encrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut hasher = Md5::new();
    hasher.update(key);
    hasher.update(data);
    let iv = hasher.finalize();

    let pad = 16 - data.len() % 16;
    let mut buffer = data.to_vec();
    buffer.extend(std::iter::repeat(pad as u8).take(pad));
    let len = buffer.len();
    let cipher = Aes128CbcEnc::new_from_slices(key, &iv)
        .map_err(|e| PdfSuiteError::SerializationError(format!("AES key: {}", e)))?;
    cipher
        .encrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buffer, len)
        .map_err(|_| PdfSuiteError::SerializationError("AES encryption failed".to_string()))?;

    let mut out = iv.to_vec();
    out.extend_from_slice(&buffer);
    Ok(out)
}

fn integer(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key).ok().and_then(|o| o.as_i64().ok())
}

fn bytes(dict: &Dictionary, key: &[u8]) -> Result<Vec<u8>> {
    dict.get(key)
        .and_then(Object::as_str)
        .map(<[u8]>::to_vec)
        .map_err(|_| {
            PdfSuiteError::CorruptDocument(format!(
                "encryption dictionary lacks /{}",
                String::from_utf8_lossy(key)
            ))
        })
}

fn resolve_dict<'a>(graph: &'a lopdf::Document, object: &'a Object) -> Option<&'a Dictionary> {
    match object {
        Object::Reference(id) => graph.get_object(*id).ok().and_then(|o| o.as_dict().ok()),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Crypt filter method for a V4 `/StmF` or `/StrF` entry.
fn crypt_filter(encrypt: &Dictionary, entry: &[u8]) -> Result<CryptMethod> {
    let name = match encrypt.get(entry).and_then(Object::as_name) {
        Ok(name) => name,
        Err(_) => return Ok(CryptMethod::Identity),
    };
    if name == b"Identity" {
        return Ok(CryptMethod::Identity);
    }
    let method = encrypt
        .get(b"CF")
        .and_then(Object::as_dict)
        .and_then(|cf| cf.get(name))
        .and_then(Object::as_dict)
        .and_then(|filter| filter.get(b"CFM"))
        .and_then(Object::as_name)
        .unwrap_or(b"None");
    match method {
        b"V2" => Ok(CryptMethod::Rc4),
        b"AESV2" => Ok(CryptMethod::AesV2),
        b"None" => Ok(CryptMethod::Identity),
        other => Err(PdfSuiteError::UnsupportedEncryption(format!(
            "crypt filter method {}",
            String::from_utf8_lossy(other)
        ))),
    }
}

pub(crate) fn first_file_id(graph: &lopdf::Document) -> Vec<u8> {
    graph
        .trailer
        .get(b"ID")
        .and_then(Object::as_array)
        .ok()
        .and_then(|ids| ids.first())
        .and_then(|id| id.as_str().ok())
        .map(<[u8]>::to_vec)
        .unwrap_or_default()
}

/// Authenticate against the `/Encrypt` dictionary and decrypt every object in
/// place. Returns `None` when the graph is not encrypted.
pub(crate) fn open(
    graph: &mut lopdf::Document,
    password: Option<&str>,
) -> Result<Option<PermissionSet>> {
    let Ok(encrypt_ref) = graph.trailer.get(b"Encrypt") else {
        return Ok(None);
    };
    let encrypt_id = encrypt_ref.as_reference().ok();
    let encrypt = resolve_dict(graph, encrypt_ref)
        .ok_or_else(|| PdfSuiteError::CorruptDocument("unreadable /Encrypt".to_string()))?
        .clone();

    let filter = encrypt.get(b"Filter").and_then(Object::as_name).unwrap_or(b"");
    if filter != b"Standard" {
        return Err(PdfSuiteError::UnsupportedEncryption(format!(
            "security handler {}",
            String::from_utf8_lossy(filter)
        )));
    }

    let version = integer(&encrypt, b"V").unwrap_or(0);
    let revision = integer(&encrypt, b"R").unwrap_or(2) as u32;
    let (key_length, strings, streams) = match version {
        1 => (5, CryptMethod::Rc4, CryptMethod::Rc4),
        2 => {
            let bits = integer(&encrypt, b"Length").unwrap_or(40);
            ((bits / 8).clamp(5, 16) as usize, CryptMethod::Rc4, CryptMethod::Rc4)
        }
        4 => (
            16,
            crypt_filter(&encrypt, b"StrF")?,
            crypt_filter(&encrypt, b"StmF")?,
        ),
        other => {
            return Err(PdfSuiteError::UnsupportedEncryption(format!(
                "standard handler V{} R{}",
                other, revision
            )))
        }
    };
    if !(2..=4).contains(&revision) {
        return Err(PdfSuiteError::UnsupportedEncryption(format!(
            "standard handler revision {}",
            revision
        )));
    }

    let permissions = integer(&encrypt, b"P").unwrap_or(0) as i32;
    let params = StandardParams {
        revision,
        key_length,
        owner_value: bytes(&encrypt, b"O")?,
        user_value: bytes(&encrypt, b"U")?,
        permissions,
        file_id: first_file_id(graph),
        encrypt_metadata: encrypt
            .get(b"EncryptMetadata")
            .and_then(Object::as_bool)
            .unwrap_or(true),
    };

    let key = match password {
        None => standard::authenticate_user(b"", &params).ok_or(PdfSuiteError::PasswordRequired)?,
        Some(password) => standard::authenticate_user(password.as_bytes(), &params)
            .or_else(|| standard::authenticate_owner(password.as_bytes(), &params))
            .ok_or(PdfSuiteError::WrongPassword)?,
    };
    debug!(version, revision, key_length, "authenticated standard security handler");

    let handler = SecurityHandler {
        key,
        strings,
        streams,
        encrypt_metadata: params.encrypt_metadata,
    };
    for (id, object) in graph.objects.iter_mut() {
        if Some(*id) == encrypt_id {
            continue;
        }
        handler.decrypt_object(*id, object)?;
    }
    if let Some(id) = encrypt_id {
        graph.objects.remove(&id);
    }
    graph.trailer.remove(b"Encrypt");

    Ok(Some(PermissionSet::from_p(permissions)))
}

/// Encrypt every object with the V2/R3 RC4-128 handler and attach the
/// `/Encrypt` dictionary and `/ID` to the trailer.
pub(crate) fn seal(graph: &mut lopdf::Document, spec: &EncryptionSpec, file_id: Vec<u8>) -> Result<()> {
    const REVISION: u32 = 3;
    const KEY_LENGTH: usize = 16;

    let user_password = spec.user_password.as_bytes();
    let mut params = StandardParams {
        revision: REVISION,
        key_length: KEY_LENGTH,
        owner_value: standard::owner_value(
            spec.owner_password().as_bytes(),
            user_password,
            REVISION,
            KEY_LENGTH,
        ),
        user_value: Vec::new(),
        permissions: spec.permissions.to_p(),
        file_id,
        encrypt_metadata: true,
    };
    let key = standard::file_key(user_password, &params);
    params.user_value = standard::user_value(&key, REVISION, &params.file_id);

    let handler = SecurityHandler::new(key, CryptMethod::Rc4, CryptMethod::Rc4);
    for (id, object) in graph.objects.iter_mut() {
        handler.encrypt_object(*id, object)?;
    }

    let mut encrypt = Dictionary::new();
    encrypt.set("Filter", Object::Name(b"Standard".to_vec()));
    encrypt.set("V", Object::Integer(2));
    encrypt.set("R", Object::Integer(REVISION as i64));
    encrypt.set("Length", Object::Integer((KEY_LENGTH * 8) as i64));
    encrypt.set("O", Object::String(params.owner_value, StringFormat::Hexadecimal));
    encrypt.set("U", Object::String(params.user_value, StringFormat::Hexadecimal));
    encrypt.set("P", Object::Integer(params.permissions as i64));
    let encrypt_id = graph.add_object(Object::Dictionary(encrypt));

    let id = Object::String(params.file_id, StringFormat::Hexadecimal);
    graph.trailer.set("ID", Object::Array(vec![id.clone(), id]));
    graph.trailer.set("Encrypt", Object::Reference(encrypt_id));
    info!(permissions = params.permissions, "applied RC4-128 standard security handler");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    fn handler(method: CryptMethod) -> SecurityHandler {
        SecurityHandler::new(vec![3u8; 16], method, method)
    }

    #[test]
    fn test_object_key_length() {
        let h = SecurityHandler::new(vec![1u8; 5], CryptMethod::Rc4, CryptMethod::Rc4);
        assert_eq!(h.object_key((1, 0), CryptMethod::Rc4).len(), 10);
        assert_eq!(handler(CryptMethod::Rc4).object_key((1, 0), CryptMethod::Rc4).len(), 16);
        assert_ne!(
            handler(CryptMethod::Rc4).object_key((1, 0), CryptMethod::Rc4),
            handler(CryptMethod::Rc4).object_key((2, 0), CryptMethod::Rc4)
        );
    }

    #[test]
    fn test_aes_roundtrip() {
        let key = [9u8; 16];
        for len in [0usize, 1, 15, 16, 17, 100] {
            let data: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let sealed = aes_encrypt(&key, &data).unwrap();
            assert_eq!(sealed.len() % 16, 0);
            assert_eq!(aes_decrypt(&key, &sealed).unwrap(), data);
        }
    }

    #[test]
    fn test_object_roundtrip_for_both_methods() {
        for method in [CryptMethod::Rc4, CryptMethod::AesV2] {
            let h = handler(method);
            let original = Object::Stream(Stream::new(
                dictionary! { "Title" => Object::string_literal("hello") },
                b"BT ET".to_vec(),
            ));
            let mut object = original.clone();
            h.encrypt_object((4, 0), &mut object).unwrap();
            assert_ne!(
                object.as_stream().unwrap().content,
                original.as_stream().unwrap().content
            );
            h.decrypt_object((4, 0), &mut object).unwrap();
            assert_eq!(object.as_stream().unwrap().content, b"BT ET".to_vec());
            assert_eq!(
                object.as_stream().unwrap().dict.get(b"Title").unwrap().as_str().unwrap(),
                b"hello"
            );
        }
    }

    #[test]
    fn test_metadata_stream_skipped_when_unencrypted() {
        let mut h = handler(CryptMethod::Rc4);
        h.encrypt_metadata = false;
        let mut object = Object::Stream(Stream::new(
            dictionary! { "Type" => "Metadata" },
            b"<x:xmpmeta/>".to_vec(),
        ));
        h.encrypt_object((2, 0), &mut object).unwrap();
        assert_eq!(object.as_stream().unwrap().content, b"<x:xmpmeta/>".to_vec());
    }

    #[test]
    fn test_crypt_filter_lookup() {
        let encrypt = dictionary! {
            "CF" => dictionary! {
                "StdCF" => dictionary! { "CFM" => "AESV2" },
            },
            "StmF" => "StdCF",
            "StrF" => "Identity",
        };
        assert_eq!(crypt_filter(&encrypt, b"StmF").unwrap(), CryptMethod::AesV2);
        assert_eq!(crypt_filter(&encrypt, b"StrF").unwrap(), CryptMethod::Identity);
        assert_eq!(crypt_filter(&encrypt, b"EFF").unwrap(), CryptMethod::Identity);
    }
}
