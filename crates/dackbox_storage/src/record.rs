//! Batch record format for the file store log.
//!
//! ```text
//! record  := magic "DBXB" | payload_len u32 LE | payload | crc32(payload) u32 LE
//! payload := op*
//! op      := 1 | key_len u32 LE | key | value_len u32 LE | value   (set)
//!          | 2 | key_len u32 LE | key                              (delete)
//! ```

use crate::error::{StorageError, StorageResult};
use crate::snapshot::Batch;

/// Magic bytes opening every batch record.
pub const RECORD_MAGIC: [u8; 4] = *b"DBXB";

/// Size of the magic plus length header.
pub const HEADER_SIZE: usize = 8;

/// Size of the trailing checksum.
pub const CRC_SIZE: usize = 4;

/// Largest key or value a record can hold.
pub const MAX_ENTRY_SIZE: usize = u32::MAX as usize;

const OP_SET: u8 = 1;
const OP_DELETE: u8 = 2;

/// Outcome of decoding one record from a byte buffer.
#[derive(Debug)]
pub(crate) enum Decoded {
    /// A complete record and the number of bytes it occupied.
    Record(Batch, usize),
    /// The buffer ends in the middle of a record.
    Torn,
}

/// Encodes a batch into a complete record.
pub(crate) fn encode_batch(batch: &Batch) -> StorageResult<Vec<u8>> {
    let mut payload = Vec::new();
    for (key, value) in batch {
        match value {
            Some(value) => {
                payload.push(OP_SET);
                put_bytes(&mut payload, key)?;
                put_bytes(&mut payload, value)?;
            }
            None => {
                payload.push(OP_DELETE);
                put_bytes(&mut payload, key)?;
            }
        }
    }
    if payload.len() > MAX_ENTRY_SIZE {
        return Err(StorageError::EntryTooLarge {
            len: payload.len(),
            max: MAX_ENTRY_SIZE,
        });
    }

    let mut record = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    record.extend_from_slice(&RECORD_MAGIC);
    record.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    record.extend_from_slice(&payload);
    record.extend_from_slice(&compute_crc32(&payload).to_le_bytes());
    Ok(record)
}

/// Decodes the record starting at the beginning of `data`.
pub(crate) fn decode_record(data: &[u8]) -> StorageResult<Decoded> {
    if data.len() < HEADER_SIZE {
        return Ok(Decoded::Torn);
    }
    if data[0..4] != RECORD_MAGIC {
        return Err(StorageError::corrupted("bad record magic"));
    }
    let payload_len = read_u32(&data[4..8]) as usize;
    let total = HEADER_SIZE + payload_len + CRC_SIZE;
    if data.len() < total {
        return Ok(Decoded::Torn);
    }

    let payload = &data[HEADER_SIZE..HEADER_SIZE + payload_len];
    let stored_crc = read_u32(&data[HEADER_SIZE + payload_len..total]);
    let actual_crc = compute_crc32(payload);
    if stored_crc != actual_crc {
        return Err(StorageError::corrupted(format!(
            "checksum mismatch: expected {stored_crc:08x}, got {actual_crc:08x}"
        )));
    }

    Ok(Decoded::Record(decode_payload(payload)?, total))
}

fn decode_payload(payload: &[u8]) -> StorageResult<Batch> {
    let mut batch = Batch::new();
    let mut cursor = 0;
    while cursor < payload.len() {
        let op = payload[cursor];
        cursor += 1;
        let key = take_bytes(payload, &mut cursor)?;
        match op {
            OP_SET => {
                let value = take_bytes(payload, &mut cursor)?;
                batch.insert(key, Some(value));
            }
            OP_DELETE => {
                batch.insert(key, None);
            }
            other => {
                return Err(StorageError::corrupted(format!("unknown op code {other}")));
            }
        }
    }
    Ok(batch)
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> StorageResult<()> {
    if bytes.len() > MAX_ENTRY_SIZE {
        return Err(StorageError::EntryTooLarge {
            len: bytes.len(),
            max: MAX_ENTRY_SIZE,
        });
    }
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

fn take_bytes(payload: &[u8], cursor: &mut usize) -> StorageResult<Vec<u8>> {
    if *cursor + 4 > payload.len() {
        return Err(StorageError::corrupted("unexpected end of payload"));
    }
    let len = read_u32(&payload[*cursor..*cursor + 4]) as usize;
    *cursor += 4;
    if *cursor + len > payload.len() {
        return Err(StorageError::corrupted("entry extends past payload"));
    }
    let bytes = payload[*cursor..*cursor + len].to_vec();
    *cursor += len;
    Ok(bytes)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut arr = [0u8; 4];
    arr.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(arr)
}

/// Computes the IEEE CRC32 of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batch() -> Batch {
        let mut batch = Batch::new();
        batch.insert(b"graph\0a".to_vec(), Some(vec![0, 1, b'b']));
        batch.insert(b"gone".to_vec(), None);
        batch.insert(b"empty".to_vec(), Some(Vec::new()));
        batch
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn record_decodes_what_was_encoded() {
        let batch = sample_batch();
        let record = encode_batch(&batch).unwrap();

        match decode_record(&record).unwrap() {
            Decoded::Record(decoded, used) => {
                assert_eq!(decoded, batch);
                assert_eq!(used, record.len());
            }
            Decoded::Torn => panic!("expected a complete record"),
        }
    }

    #[test]
    fn truncated_record_is_torn() {
        let record = encode_batch(&sample_batch()).unwrap();
        for cut in [0, 3, HEADER_SIZE, record.len() - 1] {
            assert!(matches!(
                decode_record(&record[..cut]).unwrap(),
                Decoded::Torn
            ));
        }
    }

    #[test]
    fn flipped_payload_byte_fails_checksum() {
        let mut record = encode_batch(&sample_batch()).unwrap();
        record[HEADER_SIZE + 2] ^= 0xFF;
        assert!(matches!(
            decode_record(&record),
            Err(StorageError::Corrupted(_))
        ));
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut record = encode_batch(&sample_batch()).unwrap();
        record[0] = b'X';
        assert!(matches!(
            decode_record(&record),
            Err(StorageError::Corrupted(_))
        ));
    }
}
