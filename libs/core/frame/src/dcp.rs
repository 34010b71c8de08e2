// [libs/core/frame/src/dcp.rs]
/*!
 * APARATO: DCP DISCOVERY ENGINE
 * Descubrimiento de dispositivos por capa 2.
 * El link-layer es una abstraccion inyectada: el simulador implementa
 * el mismo trait que el socket crudo real.
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

use byteorder::{BigEndian, ByteOrder};
use crossbeam_channel::{bounded, Receiver};
use pnet::util::MacAddr;
use tracing::debug;

use crate::counters::FrameDropCounters;
use crate::errors::FrameError;
use crate::frame::{build_frame, parse_frame};
use crate::wire::{DcpServiceId, FrameKind};

const OPTION_DEVICE_PROPERTIES: u8 = 0x02;
const SUBOPTION_NAME_OF_STATION: u8 = 0x01;
const SUBOPTION_DEVICE_ID: u8 = 0x03;

/// Abstraccion sobre el medio de transporte de capa 2. Implementada por
/// el socket crudo real y, de forma identica, por el simulador.
pub trait LinkLayer: Send + Sync {
    fn send_raw(&self, frame: &[u8]) -> Result<(), FrameError>;
    /// Devuelve `Ok(None)` si no llego nada dentro de `timeout` (no es un error).
    fn recv_raw(&self, timeout: Duration) -> Result<Option<Vec<u8>>, FrameError>;
    fn local_mac(&self) -> MacAddr;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DcpIdentifyReply {
    pub station_name: String,
    pub mac: MacAddr,
    pub vendor_id: u16,
    pub device_id: u16,
}

fn parse_identify_payload(view: &[u8], mac: MacAddr, counters: &FrameDropCounters) -> Option<DcpIdentifyReply> {
    let mut station_name = None;
    let mut vendor_id = None;
    let mut device_id = None;

    // El cuerpo DCP-Identify-Rsp abre con cabecera de servicio (xid, longitud);
    // omitimos esos campos fijos y procesamos el bloque TLV que sigue.
    if view.len() < 10 {
        counters.record_truncated();
        return None;
    }
    let mut offset = 10;

    while offset + 4 <= view.len() {
        let option = view[offset];
        let suboption = view[offset + 1];
        let block_len = BigEndian::read_u16(&view[offset + 2..offset + 4]) as usize;
        let value_start = offset + 4;

        if value_start + block_len > view.len() {
            counters.record_malformed_tlv();
            return None;
        }
        let value = &view[value_start..value_start + block_len];

        match (option, suboption) {
            (OPTION_DEVICE_PROPERTIES, SUBOPTION_NAME_OF_STATION) => {
                station_name = std::str::from_utf8(value).ok().map(|s| s.trim_end_matches('\0').to_string());
            }
            (OPTION_DEVICE_PROPERTIES, SUBOPTION_DEVICE_ID) if value.len() >= 4 => {
                vendor_id = Some(BigEndian::read_u16(&value[0..2]));
                device_id = Some(BigEndian::read_u16(&value[2..4]));
            }
            _ => {
                // bloque desconocido: se omite usando su propio prefijo de longitud.
                debug!(option, suboption, "dcp: skipping unknown TLV block");
            }
        }

        // bloques DCP se alinean a 2 bytes.
        offset = value_start + block_len + (block_len % 2);
    }

    Some(DcpIdentifyReply {
        station_name: station_name.unwrap_or_default(),
        mac,
        vendor_id: vendor_id.unwrap_or(0),
        device_id: device_id.unwrap_or(0),
    })
}

/// Emite un evento por cada dispositivo que responde dentro de `timeout`.
/// El canal se cierra deterministicamente al llegar al deadline.
pub fn dcp_discover(link: Arc<dyn LinkLayer>, timeout: Duration) -> Result<Receiver<DcpIdentifyReply>, FrameError> {
    let (tx, rx) = bounded(64);
    let local_mac = link.local_mac();

    let request = build_frame(FrameKind::Dcp(DcpServiceId::Identify), &[], local_mac, MacAddr::broadcast(), None)?;
    link.send_raw(&request)?;

    std::thread::Builder::new()
        .name("dcp-discover".into())
        .spawn(move || {
            let deadline = Instant::now() + timeout;
            let counters = FrameDropCounters::new();

            while Instant::now() < deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match link.recv_raw(remaining) {
                    Ok(Some(bytes)) => {
                        if let Some(parsed) = parse_frame(&bytes, &counters) {
                            if matches!(parsed.kind, FrameKind::Dcp(DcpServiceId::Identify)) {
                                if let Some(reply) = parse_identify_payload(parsed.view, parsed.src_mac, &counters) {
                                    let _ = tx.send(reply);
                                }
                            }
                        }
                    }
                    Ok(None) => continue,
                    Err(err) => {
                        debug!(error = %err, "dcp: recv_raw failed during discovery");
                        break;
                    }
                }
            }
            // `tx` se descarta aqui, cerrando el canal deterministicamente.
        })
        .expect("failed to spawn dcp-discover thread");

    Ok(rx)
}
