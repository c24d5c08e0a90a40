//! Raw-frame file format (§6): a sequence of length-prefixed records,
//! each a raw AVLC frame plus its metadata. Used for offline replay
//! (`demos/raw-replay.rs`) and as the one external *input* format this
//! crate owns (output formatters remain out of scope).

use std::io::{self, Read, Write};

use crate::metadata::Vdl2MsgMetadata;

/// Records longer than this (including the 2-byte length prefix) are
/// rejected, per §6.
pub const MAX_RECORD_LEN: usize = 65_536;

/// One raw-frame file record: metadata plus the still-undecoded AVLC
/// frame bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAvlcFrame {
    /// Metadata captured by the burst decoder.
    pub metadata: Vdl2MsgMetadata,
    /// Raw AVLC frame octets (FCS included, matching what `burst::decode_burst` emits).
    pub data: Vec<u8>,
}

/// Write one record: a 16-bit big-endian length (counting itself) then
/// a JSON-serialized metadata length-prefixed by a 32-bit big-endian
/// count, then the raw frame bytes.
///
/// The on-wire layout is intentionally simple (JSON, not protobuf) since
/// this crate does not carry a protobuf codegen dependency; the field
/// set matches §6 exactly, so any protobuf-based tool can re-encode it.
pub fn write_record<W: Write>(w: &mut W, rec: &RawAvlcFrame) -> io::Result<()> {
    let meta_json = serde_json::to_vec(&rec.metadata)?;
    if meta_json.len() > u32::MAX as usize {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "metadata too large"));
    }
    let body_len = 4 + meta_json.len() + rec.data.len();
    let total_len = 2 + body_len;
    if total_len > MAX_RECORD_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "record exceeds MAX_RECORD_LEN"));
    }
    w.write_all(&(total_len as u16).to_be_bytes())?;
    w.write_all(&(meta_json.len() as u32).to_be_bytes())?;
    w.write_all(&meta_json)?;
    w.write_all(&rec.data)?;
    Ok(())
}

/// Read one record, or `Ok(None)` at clean end-of-stream.
pub fn read_record<R: Read>(r: &mut R) -> io::Result<Option<RawAvlcFrame>> {
    let mut len_buf = [0u8; 2];
    match r.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let total_len = u16::from_be_bytes(len_buf) as usize;
    if total_len < 2 || total_len > MAX_RECORD_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "record length out of range"));
    }
    let mut body = vec![0u8; total_len - 2];
    r.read_exact(&mut body)?;
    if body.len() < 4 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "record body truncated"));
    }
    let meta_len = u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as usize;
    if 4 + meta_len > body.len() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "metadata length out of range"));
    }
    let metadata: Vdl2MsgMetadata = serde_json::from_slice(&body[4..4 + meta_len])
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let data = body[4 + meta_len..].to_vec();
    Ok(Some(RawAvlcFrame { metadata, data }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrips_a_record() {
        let rec = RawAvlcFrame {
            metadata: Vdl2MsgMetadata::new("GND1", 136_975_000),
            data: vec![1, 2, 3, 4, 5],
        };
        let mut buf = Vec::new();
        write_record(&mut buf, &rec).unwrap();

        let mut cur = Cursor::new(buf);
        let got = read_record(&mut cur).unwrap().unwrap();
        assert_eq!(got, rec);
        assert!(read_record(&mut cur).unwrap().is_none());
    }

    #[test]
    fn two_records_in_sequence() {
        let rec1 = RawAvlcFrame { metadata: Vdl2MsgMetadata::new("GND1", 1), data: vec![0xaa] };
        let rec2 = RawAvlcFrame { metadata: Vdl2MsgMetadata::new("GND1", 2), data: vec![0xbb, 0xcc] };
        let mut buf = Vec::new();
        write_record(&mut buf, &rec1).unwrap();
        write_record(&mut buf, &rec2).unwrap();

        let mut cur = Cursor::new(buf);
        assert_eq!(read_record(&mut cur).unwrap().unwrap(), rec1);
        assert_eq!(read_record(&mut cur).unwrap().unwrap(), rec2);
        assert!(read_record(&mut cur).unwrap().is_none());
    }
}
