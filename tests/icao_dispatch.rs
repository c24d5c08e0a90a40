//! End-to-end coverage for an X.25 DATA PDU carrying ATN upper-layer
//! traffic straight to the ICAO APDU classifier (spec.md §8 scenario
//! 5: a CPDLC uplink reassembled off an X.25 DATA stream, with no
//! CLNP network-layer wrapper).

use vdl2::bitstream::BitWriter;
use vdl2::direction::MsgDir;
use vdl2::tree::FieldValue;
use vdl2::x25::{self, SessionTable};

fn generic_shape(tag: bool, body: &[u8]) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bit(tag);
    w.write_bits(0, 7);
    w.write_bits(body.len() as u32, 8);
    for b in body {
        w.write_bits(*b as u32, 8);
    }
    w.into_bytes()
}

/// A `Protected{Aircraft,Ground}PDUs` envelope: a generic shape whose
/// body is itself a valid generic shape.
fn protected_envelope(inner_body: &[u8]) -> Vec<u8> {
    let inner = generic_shape(false, inner_body);
    generic_shape(true, &inner)
}

/// An ACSE APDU (CHOICE tag + optional user-information octet string).
fn acse_bytes(tag: u32, user_info: Option<&[u8]>) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bits(tag, 3);
    w.write_bit(user_info.is_some());
    if let Some(info) = user_info {
        w.write_bits(0, 4);
        w.write_bits(info.len() as u32, 8);
        for b in info {
            w.write_bits(*b as u32, 8);
        }
    } else {
        w.write_bits(0, 4);
    }
    w.into_bytes()
}

/// A `Fully-encoded-data` buffer selecting the ACSE presentation
/// context, carrying `acse` as the inner ACSE APDU.
fn fully_encoded_acse(acse: &[u8]) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bits(1, 2); // presentation_context_id = ACSE_APDU
    w.write_bits(0, 6);
    w.write_bits(acse.len() as u32, 8);
    for b in acse {
        w.write_bits(*b as u32, 8);
    }
    w.into_bytes()
}

/// A single, unfragmented X.25 DATA packet whose SN-protocol id isn't
/// one of the four network-layer ones (spec.md §4.K), carrying
/// `payload` directly.
fn x25_data_packet(payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0x10u8, 0x00, 0x00]; // gfi=1, chan 0, DATA seq 0/0, more=0
    buf.push(0x00); // SN-protocol id outside CLNP/ES-IS/IDRP
    buf.extend_from_slice(payload);
    buf
}

fn icao_type_of(n: &vdl2::tree::Node) -> Option<String> {
    let fed = n.children.iter().find(|c| c.name == "fully_encoded_data")?;
    let acse = fed.children.iter().find(|c| c.name == "acse")?;
    let apdu = acse.children.iter().find(|c| c.name == "icao_apdu")?;
    match apdu.fields.iter().find(|(k, _)| k == "type")?.1.clone() {
        FieldValue::Text(s) => Some(s),
        _ => None,
    }
}

#[test]
fn x25_data_without_clnp_wrapper_reaches_icao_uplink_classifier() {
    let acse = acse_bytes(0, Some(&protected_envelope(b"climb and maintain FL350")));
    let apdu = fully_encoded_acse(&acse);
    let pkt_bytes = x25_data_packet(&apdu);
    let pkt = x25::parse(&pkt_bytes).expect("valid x25 DATA packet");

    let mut table = SessionTable::new(10);
    let n = x25::to_node_with_context(&pkt, &mut table, 136_975_000, 0, 60, MsgDir::Uplink);

    assert_eq!(icao_type_of(&n).as_deref(), Some("ATCUplinkMessage"));
}

#[test]
fn x25_data_without_clnp_wrapper_reaches_icao_downlink_classifier() {
    let acse = acse_bytes(0, Some(&protected_envelope(b"request climb FL370")));
    let apdu = fully_encoded_acse(&acse);
    let pkt_bytes = x25_data_packet(&apdu);
    let pkt = x25::parse(&pkt_bytes).expect("valid x25 DATA packet");

    let mut table = SessionTable::new(10);
    let n = x25::to_node_with_context(&pkt, &mut table, 136_975_000, 0, 60, MsgDir::Downlink);

    assert_eq!(icao_type_of(&n).as_deref(), Some("ATCDownlinkMessage"));
}
