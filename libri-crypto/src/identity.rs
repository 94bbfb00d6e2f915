//! ECDSA P-256 node identities and the signed request envelope every peer RPC carries.

use std::time::{SystemTime, UNIX_EPOCH};

use p256::ecdsa::signature::{Signer as _, Verifier as _};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, Result};

/// Length of a compressed SEC1 P-256 public key point.
pub const PUBLIC_KEY_LEN: usize = 33;
/// Allowed clock skew for request timestamps, per spec C7.
pub const MAX_TIMESTAMP_SKEW_SECS: u64 = 5 * 60;
/// Length of a request ID.
pub const REQUEST_ID_LEN: usize = 32;

/// A node's ECDSA P-256 key pair. Node ID = SHA-256(compressed public key).
pub struct Identity {
    signing_key: SigningKey,
}

impl Identity {
    /// Generates a fresh identity from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Reconstructs an identity from a raw 32-byte scalar (e.g. loaded from a keystore).
    pub fn from_scalar_bytes(bytes: &[u8]) -> Result<Self> {
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|_| CryptoError::InvalidKeyLength { expected: 32, found: bytes.len() })?;
        Ok(Self { signing_key })
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        *self.signing_key.verifying_key()
    }

    /// The same scalar viewed as a `p256::SecretKey`, for ECDH key agreement (C7).
    pub fn secret_key(&self) -> p256::SecretKey {
        p256::SecretKey::from_bytes(&self.signing_key.to_bytes())
            .expect("signing key scalar is always a valid secret key")
    }

    /// Compressed SEC1 encoding of the public key, the canonical on-wire form (33 bytes).
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        let encoded = self.verifying_key().to_encoded_point(true);
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out.copy_from_slice(encoded.as_bytes());
        out
    }

    /// Node ID = SHA-256(compressed public key).
    pub fn node_id_bytes(&self) -> [u8; 32] {
        sha256_node_id(&self.public_key_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Builds a signed request token binding `request_id` and the current timestamp to
    /// `message` (the marshaled request body), per the C7 signed-context contract.
    pub fn sign_request(&self, message: &[u8]) -> SignedRequest {
        let mut request_id = [0u8; REQUEST_ID_LEN];
        OsRng.fill_bytes(&mut request_id);
        let timestamp = now_unix();
        let to_sign = signing_payload(&request_id, timestamp, message);
        let signature = self.signing_key.sign(&to_sign);
        SignedRequest {
            pub_key: self.public_key_bytes(),
            request_id,
            timestamp,
            signature: signature.to_bytes().to_vec(),
        }
    }
}

/// Node ID derivation, exposed standalone so the routing table and tests can derive IDs
/// from a peer-advertised public key without holding its private key.
pub fn sha256_node_id(compressed_pub_key: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(compressed_pub_key);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

fn signing_payload(request_id: &[u8], timestamp: u64, message: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(request_id.len() + 8 + message.len());
    buf.extend_from_slice(request_id);
    buf.extend_from_slice(&timestamp.to_be_bytes());
    buf.extend_from_slice(message);
    buf
}

/// The `{pub_key, request_id, timestamp, signature}` envelope every outbound RPC carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedRequest {
    #[serde(with = "BigArray")]
    pub pub_key: [u8; PUBLIC_KEY_LEN],
    pub request_id: [u8; REQUEST_ID_LEN],
    pub timestamp: u64,
    pub signature: Vec<u8>,
}

impl SignedRequest {
    /// Verifies the signature over `message`, the request-ID length, and timestamp freshness.
    /// This is the inbound-RPC gate every peer runs before any business logic (C7).
    pub fn verify(&self, message: &[u8]) -> Result<()> {
        if self.request_id.len() != REQUEST_ID_LEN {
            return Err(CryptoError::MalformedRequestId(self.request_id.len()));
        }
        let now = now_unix();
        let skew = now.abs_diff(self.timestamp);
        if skew > MAX_TIMESTAMP_SKEW_SECS {
            return Err(CryptoError::TimestampSkew);
        }
        let verifying_key = VerifyingKey::from_sec1_bytes(&self.pub_key)
            .map_err(|_| CryptoError::SignatureInvalid)?;
        let signature = Signature::from_slice(&self.signature)
            .map_err(|_| CryptoError::SignatureInvalid)?;
        let to_sign = signing_payload(&self.request_id, self.timestamp, message);
        verifying_key
            .verify(&to_sign, &signature)
            .map_err(|_| CryptoError::SignatureInvalid)
    }
}
