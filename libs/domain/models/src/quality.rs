// [libs/domain/models/src/quality.rs]
/*!
 * =================================================================
 * APARATO: QUALITY CODE (ESTRATO L0-DOMAIN)
 * RESPONSABILIDAD: REPRESENTACION SIMBOLICA DE LA CONFIANZA DE UNA MEDIDA
 *
 * Cada valor numerico almacenado en el nucleo viaja acompanado de un
 * codigo de calidad. Solo GOOD y UNCERTAIN representan una medida valida
 * para los motores de control y alarma; BAD y NOT_CONNECTED nunca deben
 * alimentar un lazo PID o una regla de alarma salvo la condicion de
 * "bad_quality" en si misma.
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Codigo de calidad de un valor medido u orden de control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    /// Medida fiable, utilizable por control y alarmas.
    Good,
    /// Medida fiable con reservas (ej. fuera de rango de calibracion).
    Uncertain,
    /// Medida no fiable; debe excluirse de control y agregaciones numericas.
    Bad,
    /// No existe enlace con el origen del dato.
    NotConnected,
}

impl Quality {
    /// Verdadero si el valor acompanante puede tratarse como una medida valida.
    pub fn is_usable(self) -> bool {
        matches!(self, Quality::Good | Quality::Uncertain)
    }

    /// Codificacion de un byte usada en las tramas ciclicas.
    pub fn to_wire_byte(self) -> u8 {
        match self {
            Quality::Good => 0x00,
            Quality::Uncertain => 0x40,
            Quality::Bad => 0x80,
            Quality::NotConnected => 0xC0,
        }
    }

    /// Decodifica el byte de calidad recibido en una trama RTC1.
    /// Valores no reconocidos se tratan conservadoramente como BAD.
    pub fn from_wire_byte(byte: u8) -> Self {
        match byte {
            0x00 => Quality::Good,
            0x40 => Quality::Uncertain,
            0xC0 => Quality::NotConnected,
            _ => Quality::Bad,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_roundtrip_is_exact_for_defined_codes() {
        for q in [Quality::Good, Quality::Uncertain, Quality::Bad, Quality::NotConnected] {
            assert_eq!(Quality::from_wire_byte(q.to_wire_byte()), q);
        }
    }

    #[test]
    fn unknown_wire_byte_is_conservatively_bad() {
        assert_eq!(Quality::from_wire_byte(0x11), Quality::Bad);
    }

    #[test]
    fn only_good_and_uncertain_are_usable() {
        assert!(Quality::Good.is_usable());
        assert!(Quality::Uncertain.is_usable());
        assert!(!Quality::Bad.is_usable());
        assert!(!Quality::NotConnected.is_usable());
    }
}
