//! Telegram pool entities and their wire formats.
//!
//! ## Telegram RLP layout
//!
//! ```text
//! [nonce, to, input, v, r, s, from, respFrom, respHash, respV, respR, respS]
//! ```
//!
//! `to` is the empty string when unset. The length of this encoding is the
//! size checked against `max_telegram_size`.

use rlp::{DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use shared_types::{Address, Hash, ZERO_ADDRESS};

/// Reserved pseudo-address whose telegrams are dispatched as edge calls.
pub const EDGE_CALL_PRECOMPILE: Address = {
    let mut address = ZERO_ADDRESS;
    address[18] = 0x30;
    address[19] = 0x01;
    address
};

/// Keccak-256 of arbitrary bytes.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// A signed call record submitted to the pool.
///
/// `from` may be left as the zero address; validation fills it with the
/// recovered sender. The `resp_*` fields carry the provider's signature once
/// an edge call has been answered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Telegram {
    pub nonce: u64,
    pub to: Option<Address>,
    pub input: Vec<u8>,
    pub v: u64,
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub from: Address,
    pub resp_from: Address,
    pub resp_hash: Hash,
    pub resp_v: u64,
    pub resp_r: [u8; 32],
    pub resp_s: [u8; 32],
}

impl Telegram {
    /// A new unsigned telegram.
    pub fn new(nonce: u64, to: Option<Address>, input: impl Into<Vec<u8>>) -> Self {
        Self {
            nonce,
            to,
            input: input.into(),
            ..Default::default()
        }
    }

    /// True if this telegram targets the edge-call precompile.
    pub fn is_edge_call(&self) -> bool {
        self.to == Some(EDGE_CALL_PRECOMPILE)
    }

    /// The canonical RLP encoding.
    pub fn to_rlp(&self) -> Vec<u8> {
        rlp::encode(self).to_vec()
    }

    pub fn from_rlp(bytes: &[u8]) -> Result<Self, DecoderError> {
        rlp::decode(bytes)
    }

    /// Size of the canonical encoding in bytes.
    pub fn encoded_len(&self) -> usize {
        self.to_rlp().len()
    }

    /// Keccak-256 of the canonical encoding.
    pub fn hash(&self) -> Hash {
        keccak256(&self.to_rlp())
    }

    /// Copy the provider's signed answer onto this telegram.
    pub fn attach_response(&mut self, response: &EdgeResponse) {
        self.resp_from = response.from;
        self.resp_hash = response.hash;
        self.resp_v = response.v;
        self.resp_r = response.r;
        self.resp_s = response.s;
    }
}

fn append_optional_address(s: &mut RlpStream, address: &Option<Address>) {
    match address {
        Some(address) => s.append(&address.to_vec()),
        None => s.append_empty_data(),
    };
}

impl Encodable for Telegram {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(12);
        s.append(&self.nonce);
        append_optional_address(s, &self.to);
        s.append(&self.input);
        s.append(&self.v);
        s.append(&self.r.to_vec());
        s.append(&self.s.to_vec());
        s.append(&self.from.to_vec());
        s.append(&self.resp_from.to_vec());
        s.append(&self.resp_hash.to_vec());
        s.append(&self.resp_v);
        s.append(&self.resp_r.to_vec());
        s.append(&self.resp_s.to_vec());
    }
}

impl rlp::Decodable for Telegram {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 12 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let to = decode_bytes(rlp, 1)?;
        Ok(Self {
            nonce: rlp.val_at(0)?,
            to: if to.is_empty() {
                None
            } else {
                Some(fixed::<20>(&to)?)
            },
            input: decode_bytes(rlp, 2)?,
            v: rlp.val_at(3)?,
            r: fixed(&decode_bytes(rlp, 4)?)?,
            s: fixed(&decode_bytes(rlp, 5)?)?,
            from: fixed(&decode_bytes(rlp, 6)?)?,
            resp_from: fixed(&decode_bytes(rlp, 7)?)?,
            resp_hash: fixed(&decode_bytes(rlp, 8)?)?,
            resp_v: rlp.val_at(9)?,
            resp_r: fixed(&decode_bytes(rlp, 10)?)?,
            resp_s: fixed(&decode_bytes(rlp, 11)?)?,
        })
    }
}

fn decode_bytes(rlp: &Rlp, index: usize) -> Result<Vec<u8>, DecoderError> {
    rlp.at(index)?.as_val::<Vec<u8>>()
}

/// Left-pad `bytes` into a fixed-size array.
fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], DecoderError> {
    if bytes.len() > N {
        return Err(DecoderError::RlpIsTooBig);
    }
    let mut out = [0u8; N];
    out[N - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

/// Decoded `input` of an edge-call telegram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeCall {
    /// Node ID of the provider.
    pub peer_id: String,
    /// Path on the provider to call.
    pub endpoint: String,
    /// Request body passed to the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
}

impl EdgeCall {
    pub fn from_input(input: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(input)
    }
}

/// The provider's signed answer to an edge call.
///
/// RLP layout: `[respString, hash, from, v, r, s]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeResponse {
    pub resp_string: String,
    pub hash: Hash,
    pub from: Address,
    pub v: u64,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl EdgeResponse {
    pub fn to_rlp(&self) -> Vec<u8> {
        rlp::encode(self).to_vec()
    }

    pub fn from_rlp(bytes: &[u8]) -> Result<Self, DecoderError> {
        rlp::decode(bytes)
    }
}

impl Encodable for EdgeResponse {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(6);
        s.append(&self.resp_string.as_bytes().to_vec());
        s.append(&self.hash.to_vec());
        s.append(&self.from.to_vec());
        s.append(&self.v);
        s.append(&self.r.to_vec());
        s.append(&self.s.to_vec());
    }
}

impl rlp::Decodable for EdgeResponse {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 6 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let resp_string = String::from_utf8(decode_bytes(rlp, 0)?)
            .map_err(|_| DecoderError::Custom("response is not valid UTF-8"))?;
        Ok(Self {
            resp_string,
            hash: fixed(&decode_bytes(rlp, 1)?)?,
            from: fixed(&decode_bytes(rlp, 2)?)?,
            v: rlp.val_at(3)?,
            r: fixed(&decode_bytes(rlp, 4)?)?,
            s: fixed(&decode_bytes(rlp, 5)?)?,
        })
    }
}
