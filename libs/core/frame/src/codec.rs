// [libs/core/frame/src/codec.rs]
/*!
 * APARATO: CYCLIC PAYLOAD CODEC
 * Codificacion/decodificacion bit-exacta de los campos por canal dentro
 * del cuerpo de una trama RTC1 (spec.md S6): 5 bytes por sensor (f32
 * big-endian + byte de calidad), 2 bytes por actuador (comando + duty).
 * Unico punto del arbol que conoce el ancho de campo por canal; el
 * simulador y el puente ciclico del binario comparten estas funciones
 * para que ambos lados del enlace esten de acuerdo sobre el formato.
 */

use hydroscada_domain_models::Quality;

use crate::wire::{ACTUATOR_WIRE_WIDTH, SENSOR_WIRE_WIDTH};

/// Escribe el campo de 5 bytes de un sensor (f32 big-endian + calidad)
/// al final de `out`.
pub fn encode_sensor_field(out: &mut Vec<u8>, value: f32, quality: Quality) {
    out.extend_from_slice(&value.to_be_bytes());
    out.push(quality.to_wire_byte());
}

/// Decodifica el campo de 5 bytes en el offset `index` (0-based, en
/// unidades de canal) dentro de una vista de entrada ciclica. Devuelve
/// `None` si la vista es mas corta que lo declarado -- tratado como
/// `NotConnected` por el llamador, nunca como panico (spec.md S7:
/// una trama corta jamas debe interrumpir el ciclo).
pub fn decode_sensor_field(view: &[u8], index: usize) -> Option<(f32, Quality)> {
    let offset = index * SENSOR_WIRE_WIDTH;
    let field = view.get(offset..offset + SENSOR_WIRE_WIDTH)?;
    let raw = [field[0], field[1], field[2], field[3]];
    let value = f32::from_be_bytes(raw);
    let quality = Quality::from_wire_byte(field[4]);
    Some((value, quality))
}

/// Escribe el campo de 2 bytes de un actuador (comando + duty) al final
/// de `out`. `command` se trunca a 0/1 (discreto); `duty` es un
/// porcentaje 0-100 codificado en un byte.
pub fn encode_actuator_field(out: &mut Vec<u8>, command: u8, duty_percent: u8) {
    out.push(command);
    out.push(duty_percent);
}

/// Decodifica el campo de 2 bytes de un actuador en el offset `index`
/// dentro de una vista de salida ciclica.
pub fn decode_actuator_field(view: &[u8], index: usize) -> Option<(u8, u8)> {
    let offset = index * ACTUATOR_WIRE_WIDTH;
    let field = view.get(offset..offset + ACTUATOR_WIRE_WIDTH)?;
    Some((field[0], field[1]))
}

/// Longitud en bytes del campo de entrada ciclico declarado para
/// `sensor_count` sensores.
pub fn input_buffer_len(sensor_count: usize) -> usize {
    sensor_count * SENSOR_WIRE_WIDTH
}

/// Longitud en bytes del campo de salida ciclico declarado para
/// `control_count` controles.
pub fn output_buffer_len(control_count: usize) -> usize {
    control_count * ACTUATOR_WIRE_WIDTH
}

/// Codifica el cuerpo de una trama de alarma de enclavamiento: un byte
/// bandera (0 = liberado, distinto de 0 = activo) seguido del tag del
/// control afectado en UTF-8, sin terminador.
pub fn encode_interlock_alarm(tag: &str, active: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + tag.len());
    out.push(active as u8);
    out.extend_from_slice(tag.as_bytes());
    out
}

/// Decodifica el cuerpo de una trama de alarma de enclavamiento. `None`
/// ante un cuerpo vacio o un tag que no es UTF-8 valido -- tratado por
/// el llamador igual que cualquier otra trama malformada.
pub fn decode_interlock_alarm(payload: &[u8]) -> Option<(String, bool)> {
    let (&flag, tag_bytes) = payload.split_first()?;
    let tag = std::str::from_utf8(tag_bytes).ok()?.to_string();
    Some((tag, flag != 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_field_roundtrips() {
        let mut buf = Vec::new();
        encode_sensor_field(&mut buf, 42.5, Quality::Uncertain);
        encode_sensor_field(&mut buf, -3.25, Quality::Good);
        let (v0, q0) = decode_sensor_field(&buf, 0).unwrap();
        let (v1, q1) = decode_sensor_field(&buf, 1).unwrap();
        assert_eq!(v0, 42.5);
        assert_eq!(q0, Quality::Uncertain);
        assert_eq!(v1, -3.25);
        assert_eq!(q1, Quality::Good);
    }

    #[test]
    fn actuator_field_roundtrips() {
        let mut buf = Vec::new();
        encode_actuator_field(&mut buf, 1, 75);
        let (command, duty) = decode_actuator_field(&buf, 0).unwrap();
        assert_eq!(command, 1);
        assert_eq!(duty, 75);
    }

    #[test]
    fn short_view_decodes_to_none_rather_than_panicking() {
        let buf = vec![0u8; 3];
        assert!(decode_sensor_field(&buf, 0).is_none());
        assert!(decode_actuator_field(&buf, 5).is_none());
    }

    #[test]
    fn buffer_lengths_match_declared_channel_counts() {
        assert_eq!(input_buffer_len(3), 15);
        assert_eq!(output_buffer_len(2), 4);
    }

    #[test]
    fn interlock_alarm_roundtrips() {
        let payload = encode_interlock_alarm("PUMP_1", true);
        let (tag, active) = decode_interlock_alarm(&payload).unwrap();
        assert_eq!(tag, "PUMP_1");
        assert!(active);
    }

    #[test]
    fn empty_interlock_payload_decodes_to_none() {
        assert!(decode_interlock_alarm(&[]).is_none());
    }
}
