use std::fmt;

use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, Txid};

use crate::error::SubscriberError;

/// Publisher-side message counter carried in the last frame of every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceNumber(pub Option<u32>);

impl SequenceNumber {
    /// Decode a 4-byte little-endian frame. Any other length is unknown.
    pub fn decode(frame: &[u8]) -> Self {
        SequenceNumber(<[u8; 4]>::try_from(frame).ok().map(u32::from_le_bytes))
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(n) => write!(f, "{n}"),
            None => f.write_str("Unknown"),
        }
    }
}

/// Decoded body of a `sequence` topic message.
///
/// Layout: 32-byte hash in display order, one label byte, and for mempool
/// events an 8-byte little-endian mempool sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceEvent {
    BlockConnected(BlockHash),
    BlockDisconnected(BlockHash),
    TxAdded { txid: Txid, mempool_sequence: u64 },
    TxRemoved { txid: Txid, mempool_sequence: u64 },
}

impl SequenceEvent {
    pub fn parse(body: &[u8]) -> Result<Self, SubscriberError> {
        if body.len() < 33 {
            return Err(SubscriberError::SequenceBody(format!(
                "expected at least 33 bytes, got {}",
                body.len()
            )));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&body[..32]);
        hash.reverse();
        let label = body[32];

        let mempool_sequence = || -> Result<u64, SubscriberError> {
            let raw = <[u8; 8]>::try_from(&body[33..]).map_err(|_| {
                SubscriberError::SequenceBody(format!(
                    "mempool event `{}` must carry an 8-byte sequence, got {} bytes",
                    label as char,
                    body.len() - 33
                ))
            })?;
            Ok(u64::from_le_bytes(raw))
        };

        match label {
            b'C' => Ok(SequenceEvent::BlockConnected(BlockHash::from_byte_array(hash))),
            b'D' => Ok(SequenceEvent::BlockDisconnected(BlockHash::from_byte_array(hash))),
            b'A' => Ok(SequenceEvent::TxAdded {
                txid: Txid::from_byte_array(hash),
                mempool_sequence: mempool_sequence()?,
            }),
            b'R' => Ok(SequenceEvent::TxRemoved {
                txid: Txid::from_byte_array(hash),
                mempool_sequence: mempool_sequence()?,
            }),
            other => Err(SubscriberError::SequenceBody(format!(
                "unknown sequence label 0x{other:02x}"
            ))),
        }
    }
}
