// [libs/core/frame/src/frame.rs]
/*!
 * APARATO: FRAME BUILDER & PARSER
 * Ensamblado/analisis de tramas Ethernet de capa 2 para las cuatro
 * familias PROFINET. Todos los campos numericos
 * multi-byte en el cable son big-endian.
 */

use byteorder::{BigEndian, ByteOrder};
use crc::{Crc, CRC_32_ISO_HDLC};
use pnet::util::MacAddr;

use crate::counters::FrameDropCounters;
use crate::errors::FrameError;
use crate::wire::{FrameKind, ETHERTYPE_PROFINET, MAX_PAYLOAD_SIZE, MIN_FRAME_SIZE};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

const HEADER_LEN_NO_VLAN: usize = 6 + 6 + 2 + 2; // dst + src + ethertype + frame_id
const HEADER_LEN_VLAN: usize = HEADER_LEN_NO_VLAN + 4;
const FCS_LEN: usize = 4;

/// Vista sin copia sobre una trama reconocida.
#[derive(Debug, Clone, Copy)]
pub struct ParsedFrame<'a> {
    pub kind: FrameKind,
    pub view: &'a [u8],
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
}

/// Construye una trama Ethernet completa, con relleno al tamano minimo
/// y CRC calculado sobre cabecera+payload.
pub fn build_frame(kind: FrameKind, payload: &[u8], src: MacAddr, dst: MacAddr, vlan: Option<u16>) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FrameError::FrameTooLarge { size: payload.len(), max: MAX_PAYLOAD_SIZE });
    }

    let header_len = if vlan.is_some() { HEADER_LEN_VLAN } else { HEADER_LEN_NO_VLAN };
    let body_len = header_len + payload.len();
    let padded_len = body_len.max(MIN_FRAME_SIZE);

    let mut frame = Vec::with_capacity(padded_len + FCS_LEN);
    frame.extend_from_slice(&dst.octets());
    frame.extend_from_slice(&src.octets());

    if let Some(tag) = vlan {
        frame.extend_from_slice(&[0x81, 0x00]);
        let mut tci = [0u8; 2];
        BigEndian::write_u16(&mut tci, tag);
        frame.extend_from_slice(&tci);
    }

    let mut ethertype = [0u8; 2];
    BigEndian::write_u16(&mut ethertype, ETHERTYPE_PROFINET);
    frame.extend_from_slice(&ethertype);

    let mut frame_id = [0u8; 2];
    BigEndian::write_u16(&mut frame_id, kind.frame_id());
    frame.extend_from_slice(&frame_id);

    frame.extend_from_slice(payload);
    frame.resize(padded_len, 0);

    let checksum = CRC32.checksum(&frame);
    let mut crc_bytes = [0u8; 4];
    BigEndian::write_u32(&mut crc_bytes, checksum);
    frame.extend_from_slice(&crc_bytes);

    Ok(frame)
}

/// Analiza una trama recibida. Fallos de parseo nunca se propagan: se
/// cuentan y se devuelve `None`.
pub fn parse_frame<'a>(bytes: &'a [u8], counters: &FrameDropCounters) -> Option<ParsedFrame<'a>> {
    if bytes.len() < HEADER_LEN_NO_VLAN + FCS_LEN {
        counters.record_truncated();
        return None;
    }

    let (body, crc_field) = bytes.split_at(bytes.len() - FCS_LEN);
    let expected_crc = BigEndian::read_u32(crc_field);
    let actual_crc = CRC32.checksum(body);
    if expected_crc != actual_crc {
        counters.record_bad_crc();
        return None;
    }

    let dst_mac = MacAddr::new(body[0], body[1], body[2], body[3], body[4], body[5]);
    let src_mac = MacAddr::new(body[6], body[7], body[8], body[9], body[10], body[11]);

    let mut offset = 12;
    let mut ethertype = BigEndian::read_u16(&body[offset..offset + 2]);
    offset += 2;

    if ethertype == 0x8100 {
        if body.len() < offset + 2 + 4 {
            counters.record_truncated();
            return None;
        }
        offset += 2; // skip VLAN TCI
        ethertype = BigEndian::read_u16(&body[offset..offset + 2]);
        offset += 2;
    }

    if ethertype != ETHERTYPE_PROFINET {
        counters.record_unknown_kind();
        return None;
    }

    if body.len() < offset + 2 {
        counters.record_truncated();
        return None;
    }

    let frame_id = BigEndian::read_u16(&body[offset..offset + 2]);
    offset += 2;
    let kind = FrameKind::from_frame_id(frame_id);

    if matches!(kind, FrameKind::Unknown(_)) {
        counters.record_unknown_kind();
    }

    Some(ParsedFrame { kind, view: &body[offset..], src_mac, dst_mac })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::DcpServiceId;

    #[test]
    fn build_then_parse_roundtrips_kind_and_payload() {
        let src = MacAddr::new(0x00, 0x0e, 0xcf, 0x01, 0x02, 0x03);
        let dst = MacAddr::broadcast();
        let payload = vec![1, 2, 3, 4];
        let frame = build_frame(FrameKind::Dcp(DcpServiceId::Identify), &payload, src, dst, None).unwrap();

        let counters = FrameDropCounters::new();
        let parsed = parse_frame(&frame, &counters).expect("frame should parse");
        assert_eq!(parsed.kind, FrameKind::Dcp(DcpServiceId::Identify));
        assert_eq!(parsed.src_mac, src);
        assert!(parsed.view.starts_with(&payload));
    }

    #[test]
    fn corrupted_crc_is_dropped_not_propagated() {
        let src = MacAddr::new(0x00, 0x0e, 0xcf, 0x01, 0x02, 0x03);
        let dst = MacAddr::broadcast();
        let mut frame = build_frame(FrameKind::Rtc1, &[9, 9], src, dst, None).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;

        let counters = FrameDropCounters::new();
        assert!(parse_frame(&frame, &counters).is_none());
        assert_eq!(counters.snapshot().bad_crc, 1);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let src = MacAddr::new(0, 0, 0, 0, 0, 1);
        let dst = MacAddr::new(0, 0, 0, 0, 0, 2);
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        let err = build_frame(FrameKind::Rtc1, &payload, src, dst, None).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { .. }));
    }
}
