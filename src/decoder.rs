//! Named decoders applied to raw values before coercion (`encoding=...`).

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};

use crate::error::BoxError;

/// Turns an encoded raw value into the bytes it stands for.
///
/// `Vec<u8>` fields receive the bytes unchanged; every other field needs
/// them to be UTF-8.
pub trait Decoder: Send + Sync {
    /// The name used in `encoding=` directives, e.g. `base64`.
    fn encoding(&self) -> &str;
    fn decode(&self, value: &str) -> Result<Vec<u8>, BoxError>;
}

/// The base64 family, one variant per alphabet/padding combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base64Decoder {
    /// `base64`: standard alphabet, padded.
    Standard,
    /// `base64url`: URL-safe alphabet, padded.
    Url,
    /// `rawBase64`: standard alphabet, no padding.
    RawStandard,
    /// `rawBase64url`: URL-safe alphabet, no padding.
    RawUrl,
}

impl Base64Decoder {
    pub const ALL: [Base64Decoder; 4] = [
        Base64Decoder::Standard,
        Base64Decoder::Url,
        Base64Decoder::RawStandard,
        Base64Decoder::RawUrl,
    ];
}

impl Decoder for Base64Decoder {
    fn encoding(&self) -> &str {
        match self {
            Base64Decoder::Standard => "base64",
            Base64Decoder::Url => "base64url",
            Base64Decoder::RawStandard => "rawBase64",
            Base64Decoder::RawUrl => "rawBase64url",
        }
    }

    fn decode(&self, value: &str) -> Result<Vec<u8>, BoxError> {
        let bytes = match self {
            Base64Decoder::Standard => STANDARD.decode(value),
            Base64Decoder::Url => URL_SAFE.decode(value),
            Base64Decoder::RawStandard => STANDARD_NO_PAD.decode(value),
            Base64Decoder::RawUrl => URL_SAFE_NO_PAD.decode(value),
        }?;
        Ok(bytes)
    }
}

/// Encoding name to decoder. The base64 family is always present; user
/// decoders registered under the same name replace the built-in.
#[derive(Clone)]
pub(crate) struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn Decoder>>,
}

impl DecoderRegistry {
    pub(crate) fn new(custom: &[Arc<dyn Decoder>]) -> Self {
        let mut decoders: HashMap<String, Arc<dyn Decoder>> = HashMap::new();
        for builtin in Base64Decoder::ALL {
            decoders.insert(builtin.encoding().to_string(), Arc::new(builtin));
        }
        for decoder in custom {
            decoders.insert(decoder.encoding().to_string(), Arc::clone(decoder));
        }
        Self { decoders }
    }

    pub(crate) fn get(&self, encoding: &str) -> Option<Arc<dyn Decoder>> {
        self.decoders.get(encoding).cloned()
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new(&[])
    }
}
