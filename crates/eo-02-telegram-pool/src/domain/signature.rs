//! secp256k1 signing hashes, recovery and signing for telegrams.
//!
//! ## Sender signature
//!
//! | `v` | Signing hash | Recovery ID |
//! |-----|--------------|-------------|
//! | 27, 28 | `keccak256(rlp([nonce, to, input]))` | `v - 27` |
//! | `>= 35` | `keccak256(rlp([nonce, to, input, chainId, 0, 0]))` | `(v - 35) % 2` |
//!
//! ## Provider signature
//!
//! Over `respHash`, with `respV` in `{0, 1, 27, 28}`.

use super::entities::{keccak256, EdgeResponse, Telegram};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rlp::RlpStream;
use shared_types::{Address, Hash};
use thiserror::Error;

/// Signature recovery errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u64),

    #[error("chain id mismatch: expected {expected}, got {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },

    #[error("malformed signature")]
    InvalidSignature,

    #[error("public key recovery failed")]
    RecoveryFailed,
}

fn append_unsigned_fields(stream: &mut RlpStream, tele: &Telegram) {
    stream.append(&tele.nonce);
    match &tele.to {
        Some(to) => stream.append(&to.to_vec()),
        None => stream.append_empty_data(),
    };
    stream.append(&tele.input);
}

/// Signing hash for a pre-EIP-155 (`v` = 27/28) sender signature.
pub fn legacy_signing_hash(tele: &Telegram) -> Hash {
    let mut stream = RlpStream::new_list(3);
    append_unsigned_fields(&mut stream, tele);
    keccak256(&stream.out())
}

/// Signing hash for an EIP-155 sender signature on `chain_id`.
pub fn signing_hash(tele: &Telegram, chain_id: u64) -> Hash {
    let mut stream = RlpStream::new_list(6);
    append_unsigned_fields(&mut stream, tele);
    stream.append(&chain_id);
    stream.append(&0u8);
    stream.append(&0u8);
    keccak256(&stream.out())
}

/// Address of a public key: last 20 bytes of keccak256 of the uncompressed
/// point without its 0x04 prefix.
pub fn public_key_to_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// Recover the signer address of `(r, s)` over `hash`.
pub fn recover_address(
    hash: &Hash,
    r: &[u8; 32],
    s: &[u8; 32],
    recovery_id: u8,
) -> Result<Address, SignerError> {
    let recovery_id = RecoveryId::from_byte(recovery_id)
        .ok_or(SignerError::InvalidRecoveryId(u64::from(recovery_id)))?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(r);
    sig_bytes[32..].copy_from_slice(s);
    let signature = Signature::from_slice(&sig_bytes).map_err(|_| SignerError::InvalidSignature)?;

    let key = VerifyingKey::recover_from_prehash(hash, &signature, recovery_id)
        .map_err(|_| SignerError::RecoveryFailed)?;
    Ok(public_key_to_address(&key))
}

/// Recover the sender of a telegram, checking EIP-155 `v` against `chain_id`.
pub fn recover_sender(tele: &Telegram, chain_id: u64) -> Result<Address, SignerError> {
    let (hash, recovery_id) = match tele.v {
        27 | 28 => (legacy_signing_hash(tele), tele.v - 27),
        v if v >= 35 => {
            let actual = (v - 35) / 2;
            if actual != chain_id {
                return Err(SignerError::ChainIdMismatch {
                    expected: chain_id,
                    actual,
                });
            }
            (signing_hash(tele, chain_id), (v - 35) % 2)
        }
        v => return Err(SignerError::InvalidRecoveryId(v)),
    };
    recover_address(&hash, &tele.r, &tele.s, recovery_id as u8)
}

/// Recover the provider that signed `resp_hash`.
pub fn recover_provider(tele: &Telegram) -> Result<Address, SignerError> {
    let recovery_id = match tele.resp_v {
        0 | 27 => 0,
        1 | 28 => 1,
        v => return Err(SignerError::InvalidRecoveryId(v)),
    };
    recover_address(&tele.resp_hash, &tele.resp_r, &tele.resp_s, recovery_id)
}

fn sign_prehash(hash: &Hash, key: &SigningKey) -> Result<([u8; 32], [u8; 32], u8), SignerError> {
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(hash)
        .map_err(|_| SignerError::InvalidSignature)?;
    let bytes = signature.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);
    Ok((r, s, recovery_id.to_byte()))
}

/// Sign a telegram as its sender with an EIP-155 signature and fill `from`.
pub fn sign_telegram(
    tele: &mut Telegram,
    key: &SigningKey,
    chain_id: u64,
) -> Result<(), SignerError> {
    let (r, s, recovery_id) = sign_prehash(&signing_hash(tele, chain_id), key)?;
    tele.r = r;
    tele.s = s;
    tele.v = u64::from(recovery_id) + 35 + 2 * chain_id;
    tele.from = public_key_to_address(key.verifying_key());
    Ok(())
}

/// Build a provider response over `resp_string`, signed by `key`.
pub fn sign_edge_response(
    resp_string: impl Into<String>,
    key: &SigningKey,
) -> Result<EdgeResponse, SignerError> {
    let resp_string = resp_string.into();
    let hash = keccak256(resp_string.as_bytes());
    let (r, s, recovery_id) = sign_prehash(&hash, key)?;
    Ok(EdgeResponse {
        resp_string,
        hash,
        from: public_key_to_address(key.verifying_key()),
        v: u64::from(recovery_id) + 27,
        r,
        s,
    })
}
