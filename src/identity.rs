//! Node identity: deterministic RSA key generation and libp2p key encoding.
//!
//! Encoded keys are the libp2p wire format, base64 (standard alphabet):
//! ```text
//! message PrivateKey {
//!   required KeyType Type = 1;   // RSA = 0, Ed25519 = 1, Secp256k1 = 2, ECDSA = 3
//!   required bytes   Data = 2;   // RSA: PKCS#1 DER
//! }
//! ```
//! so keys printed here can be handed to any other libp2p implementation and
//! vice versa.
//!
//! Generation is seeded from [`Config::seed`] through ChaCha20, which makes
//! the same seed produce the same key on every machine. That is convenient
//! for development and unsafe for anything else.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use libp2p::identity::Keypair;
use prost::Message;
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use rsa::{
    RsaPrivateKey,
    pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey},
    pkcs8::EncodePrivateKey,
    traits::PublicKeyParts,
};
use tracing::debug;

use crate::{config::Config, error::AppError};

/// Size of generated keys. Also the smallest RSA key accepted on decode.
pub const RSA_KEY_BITS: usize = 2048;

/// Outcome of identity resolution.
#[derive(Debug)]
pub enum Launch {
    /// A key was generated and must be saved by the operator; nothing is started.
    Exit { encoded_key: String },
    /// Start the host with `keypair`. `generated_key` is set when the key was
    /// generated in this run and should still be shown to the operator.
    Start {
        keypair: Keypair,
        generated_key: Option<String>,
    },
}

/// Resolve the node identity from `config`.
///
/// Without `PRIVATE_KEY` a key is derived from the seed and, unless
/// `START_WITH_GENERATED_KEY` is set, the caller is told to exit.
pub fn resolve(config: &Config) -> Result<Launch, AppError> {
    if config.has_private_key() {
        let keypair = decode(&config.private_key)?;
        debug!(peer_id = %keypair.public().to_peer_id(), "private key decoded");
        return Ok(Launch::Start {
            keypair,
            generated_key: None,
        });
    }

    let key = generate_rsa(config.seed)?;
    let encoded_key = encode_rsa(&key)?;

    if config.start_with_generated_key {
        Ok(Launch::Start {
            keypair: keypair_from_rsa(&key)?,
            generated_key: Some(encoded_key),
        })
    } else {
        Ok(Launch::Exit { encoded_key })
    }
}

/// Generate an RSA key of [`RSA_KEY_BITS`] from a ChaCha20 stream seeded with `seed`.
pub fn generate_rsa(seed: i64) -> Result<RsaPrivateKey, AppError> {
    generate_rsa_with_bits(seed, RSA_KEY_BITS)
}

pub(crate) fn generate_rsa_with_bits(seed: i64, bits: usize) -> Result<RsaPrivateKey, AppError> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed as u64);
    RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| AppError::Identity(format!("cannot generate RSA key: {e}")))
}

/// Encode an RSA key as a base64 libp2p private key envelope.
pub fn encode_rsa(key: &RsaPrivateKey) -> Result<String, AppError> {
    let der = key
        .to_pkcs1_der()
        .map_err(|e| AppError::Identity(format!("cannot marshal RSA key: {e}")))?;
    let envelope = PrivateKeyEnvelope {
        key_type: KeyType::Rsa as i32,
        data: der.as_bytes().to_vec(),
    };
    Ok(STANDARD.encode(envelope.encode_to_vec()))
}

/// Convert an RSA key into a libp2p keypair.
pub fn keypair_from_rsa(key: &RsaPrivateKey) -> Result<Keypair, AppError> {
    if key.size() * 8 < RSA_KEY_BITS {
        return Err(AppError::Identity(format!(
            "RSA key is {} bits, at least {RSA_KEY_BITS} required",
            key.size() * 8
        )));
    }
    let pkcs8 = key
        .to_pkcs8_der()
        .map_err(|e| AppError::Identity(format!("cannot convert RSA key to PKCS#8: {e}")))?;
    let mut der = pkcs8.as_bytes().to_vec();
    Keypair::rsa_from_pkcs8(&mut der)
        .map_err(|e| AppError::Identity(format!("libp2p rejected RSA key: {e}")))
}

/// Decode a base64 libp2p private key of any supported type.
pub fn decode(encoded: &str) -> Result<Keypair, AppError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| AppError::Identity(format!("private key is not valid base64: {e}")))?;
    let envelope = PrivateKeyEnvelope::decode(bytes.as_slice())
        .map_err(|e| AppError::Identity(format!("private key is not a libp2p key: {e}")))?;
    let key_type = KeyType::try_from(envelope.key_type).map_err(|_| {
        AppError::Identity(format!("unknown private key type {}", envelope.key_type))
    })?;

    match key_type {
        KeyType::Rsa => {
            let key = RsaPrivateKey::from_pkcs1_der(&envelope.data)
                .map_err(|e| AppError::Identity(format!("malformed RSA private key: {e}")))?;
            keypair_from_rsa(&key)
        }
        // libp2p handles these natively; it only refuses RSA.
        KeyType::Ed25519 | KeyType::Secp256k1 | KeyType::Ecdsa => {
            Keypair::from_protobuf_encoding(&bytes).map_err(|e| {
                AppError::Identity(format!("malformed {key_type:?} private key: {e}"))
            })
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
enum KeyType {
    Rsa = 0,
    Ed25519 = 1,
    Secp256k1 = 2,
    Ecdsa = 3,
}

#[derive(Clone, PartialEq, prost::Message)]
struct PrivateKeyEnvelope {
    #[prost(enumeration = "KeyType", required, tag = "1")]
    key_type: i32,
    #[prost(bytes = "vec", required, tag = "2")]
    data: Vec<u8>,
}
