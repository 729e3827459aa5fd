//! Algorand addresses and payment transactions
//!
//! Transactions are encoded as canonical msgpack: map keys sorted, empty
//! values omitted. This is what wallets expect in the `txn` field of a
//! signing request.

use std::fmt;
use std::str::FromStr;

use rmp::encode;
use sha2::{Digest, Sha512_256};

use super::{ChainError, ChainResult, NetworkParams};

/// Longest note a transaction may carry
pub const MAX_NOTE_SIZE: usize = 1024;

const CHECKSUM_LEN: usize = 4;
const ADDRESS_LEN: usize = 58;
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// 32-byte public key shown as checksummed base32
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 32]);

impl Address {
    /// Wrap a public key
    pub fn new(public_key: [u8; 32]) -> Self {
        Address(public_key)
    }

    /// Raw public key
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn checksum(&self) -> [u8; CHECKSUM_LEN] {
        let digest = Sha512_256::digest(self.0);
        let mut out = [0u8; CHECKSUM_LEN];
        out.copy_from_slice(&digest[digest.len() - CHECKSUM_LEN..]);
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut raw = Vec::with_capacity(32 + CHECKSUM_LEN);
        raw.extend_from_slice(&self.0);
        raw.extend_from_slice(&self.checksum());
        f.write_str(&base32_encode(&raw))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = ChainError;

    fn from_str(s: &str) -> ChainResult<Self> {
        if s.len() != ADDRESS_LEN {
            return Err(ChainError::InvalidAddress(format!(
                "expected {} characters, got {}",
                ADDRESS_LEN,
                s.len()
            )));
        }

        let raw = base32_decode(s)
            .ok_or_else(|| ChainError::InvalidAddress("not base32".to_string()))?;
        if raw.len() != 32 + CHECKSUM_LEN {
            return Err(ChainError::InvalidAddress("wrong decoded length".to_string()));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&raw[..32]);
        let address = Address(key);

        if address.checksum()[..] != raw[32..] {
            return Err(ChainError::InvalidAddress("checksum mismatch".to_string()));
        }
        Ok(address)
    }
}

/// Unsigned payment transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentTxn {
    /// Paying account
    pub sender: Address,
    /// Receiving account
    pub receiver: Address,
    /// Amount in microAlgos
    pub amount: u64,
    /// Flat fee in microAlgos
    pub fee: u64,
    /// First valid round
    pub first_valid: u64,
    /// Last valid round
    pub last_valid: u64,
    /// Arbitrary note
    pub note: Vec<u8>,
    /// Genesis id
    pub genesis_id: String,
    /// Genesis hash
    pub genesis_hash: [u8; 32],
}

impl PaymentTxn {
    /// Zero-amount payment paying the minimum flat fee
    pub fn new(
        sender: Address,
        receiver: Address,
        params: &NetworkParams,
        note: &[u8],
    ) -> ChainResult<Self> {
        if note.len() > MAX_NOTE_SIZE {
            return Err(ChainError::InvalidTransaction(format!(
                "note is {} bytes, limit is {}",
                note.len(),
                MAX_NOTE_SIZE
            )));
        }

        Ok(PaymentTxn {
            sender,
            receiver,
            amount: 0,
            fee: params.min_fee,
            first_valid: params.first_valid,
            last_valid: params.last_valid,
            note: note.to_vec(),
            genesis_id: params.genesis_id.clone(),
            genesis_hash: params.genesis_hash,
        })
    }

    /// Set the amount
    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = amount;
        self
    }

    /// Canonical msgpack encoding
    pub fn encode(&self) -> ChainResult<Vec<u8>> {
        let mut fields: Vec<(&str, Field<'_>)> = vec![
            ("amt", Field::Uint(self.amount)),
            ("fee", Field::Uint(self.fee)),
            ("fv", Field::Uint(self.first_valid)),
            ("gen", Field::Str(&self.genesis_id)),
            ("gh", Field::Fixed(&self.genesis_hash)),
            ("lv", Field::Uint(self.last_valid)),
            ("note", Field::Bin(&self.note)),
            ("rcv", Field::Fixed(self.receiver.as_bytes())),
            ("snd", Field::Fixed(self.sender.as_bytes())),
            ("type", Field::Str("pay")),
        ];
        fields.retain(|(_, value)| !value.is_empty());

        let mut out = Vec::with_capacity(256);
        encode::write_map_len(&mut out, fields.len() as u32).map_err(encode_error)?;
        for (key, value) in fields {
            encode::write_str(&mut out, key).map_err(encode_error)?;
            match value {
                Field::Uint(v) => encode::write_uint(&mut out, v).map(drop),
                Field::Str(s) => encode::write_str(&mut out, s),
                Field::Bin(b) => encode::write_bin(&mut out, b),
                Field::Fixed(b) => encode::write_bin(&mut out, b),
            }
            .map_err(encode_error)?;
        }
        Ok(out)
    }
}

fn encode_error(e: encode::ValueWriteError) -> ChainError {
    ChainError::InvalidTransaction(format!("msgpack encoding failed: {}", e))
}

enum Field<'a> {
    Uint(u64),
    Str(&'a str),
    Bin(&'a [u8]),
    // Fixed-size byte arrays count as empty when all zero
    Fixed(&'a [u8; 32]),
}

impl Field<'_> {
    fn is_empty(&self) -> bool {
        match self {
            Field::Uint(v) => *v == 0,
            Field::Str(s) => s.is_empty(),
            Field::Bin(b) => b.is_empty(),
            Field::Fixed(b) => b.iter().all(|&x| x == 0),
        }
    }
}

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8).div_ceil(5));
    let mut buffer: u16 = 0;
    let mut bits = 0;

    for &byte in data {
        buffer = (buffer << 8) | byte as u16;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn base32_decode(s: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(s.len() * 5 / 8);
    let mut buffer: u16 = 0;
    let mut bits = 0;

    for c in s.bytes() {
        let value = BASE32_ALPHABET.iter().position(|&a| a == c)? as u16;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO_ADDRESS: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAY5HFKQ";

    fn params() -> NetworkParams {
        NetworkParams {
            fee: 0,
            min_fee: 1000,
            first_valid: 30_000_000,
            last_valid: 30_001_000,
            genesis_id: "mainnet-v1.0".to_string(),
            genesis_hash: [7u8; 32],
        }
    }

    #[test]
    fn test_zero_address() {
        let address = Address::new([0u8; 32]);
        assert_eq!(address.to_string(), ZERO_ADDRESS);
        assert_eq!(ZERO_ADDRESS.parse::<Address>().unwrap(), address);
    }

    #[test]
    fn test_address_roundtrip() {
        let mut key = [0u8; 32];
        for (i, b) in key.iter_mut().enumerate() {
            *b = i as u8;
        }
        let address = Address::new(key);
        let text = address.to_string();

        assert_eq!(text.len(), 58);
        assert_eq!(text.parse::<Address>().unwrap(), address);
    }

    #[test]
    fn test_address_rejects_bad_input() {
        // Flip one character: checksum no longer matches
        let mut tampered = ZERO_ADDRESS.to_string();
        tampered.replace_range(0..1, "B");
        assert!(matches!(
            tampered.parse::<Address>(),
            Err(ChainError::InvalidAddress(_))
        ));

        assert!("SHORT".parse::<Address>().is_err());
        assert!(ZERO_ADDRESS.to_lowercase().parse::<Address>().is_err());
    }

    #[test]
    fn test_payment_encoding_uses_smallest_uints() {
        let sender = Address::new([1u8; 32]);
        let mut params = params();
        params.first_valid = 200;
        params.last_valid = 30_000_000;
        let encoded = PaymentTxn::new(sender, sender, &params, b"")
            .unwrap()
            .encode()
            .unwrap();

        // Empty note dropped: eight fields
        assert_eq!(encoded[0], 0x88);
        let fv = [0xa2, b'f', b'v', 0xcc, 0xc8];
        assert!(encoded.windows(fv.len()).any(|w| w == fv));
        let lv = [0xa2, b'l', b'v', 0xce, 0x01, 0xc9, 0xc3, 0x80];
        assert!(encoded.windows(lv.len()).any(|w| w == lv));
        let gh = [0xa2, b'g', b'h', 0xc4, 0x20];
        assert!(encoded.windows(gh.len()).any(|w| w == gh));
    }

    #[test]
    fn test_payment_encoding() {
        let sender = Address::new([1u8; 32]);
        let txn = PaymentTxn::new(sender, sender, &params(), b"test transaction").unwrap();
        let encoded = txn.encode().unwrap();

        // Zero amount is omitted: nine fields
        assert_eq!(encoded[0], 0x89);
        // First key is "fee" with the flat minimum fee
        assert_eq!(&encoded[1..5], &[0xa3, b'f', b'e', b'e']);
        assert_eq!(&encoded[5..8], &[0xcd, 0x03, 0xe8]);
        // Last field is type = "pay"
        assert!(encoded.ends_with(&[0xa4, b't', b'y', b'p', b'e', 0xa3, b'p', b'a', b'y']));

        let with_amount = txn.with_amount(1).encode().unwrap();
        assert_eq!(with_amount[0], 0x8a);
        assert_eq!(&with_amount[1..6], &[0xa3, b'a', b'm', b't', 0x01]);
    }

    #[test]
    fn test_payment_note_limit() {
        let sender = Address::new([1u8; 32]);
        let note = vec![0u8; MAX_NOTE_SIZE + 1];
        assert!(matches!(
            PaymentTxn::new(sender, sender, &params(), &note),
            Err(ChainError::InvalidTransaction(_))
        ));
    }
}
