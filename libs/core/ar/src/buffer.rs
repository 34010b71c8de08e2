// [libs/core/ar/src/buffer.rs]
/*!
 * APARATO: CYCLIC I/O BUFFER
 * Region de doble buffer por IOCR: el productor escribe un nuevo
 * arreglo inmutable y lo publica atomicamente; los lectores siempre ven
 * una version completa, nunca una mezcla a medio escribir.
 */

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;

use crate::errors::ArError;

/// Un buffer ciclico de ancho fijo, respaldado por publicacion atomica
/// de snapshots inmutables (equivalente del patron "back buffer + flip").
pub struct CyclicBuffer {
    data: ArcSwap<Vec<u8>>,
    declared_len: usize,
    last_write: ArcSwap<Option<Instant>>,
}

impl CyclicBuffer {
    pub fn new(declared_len: usize) -> Self {
        Self {
            data: ArcSwap::from_pointee(vec![0u8; declared_len]),
            declared_len,
            last_write: ArcSwap::from_pointee(None),
        }
    }

    pub fn declared_len(&self) -> usize {
        self.declared_len
    }

    /// Publica un nuevo contenido completo. Debe igualar `declared_len`
    /// exactamente (invariante 2: longitudes fijadas al entrar en RUN).
    pub fn write(&self, bytes: &[u8]) -> Result<(), ArError> {
        if bytes.len() != self.declared_len {
            return Err(ArError::OutputLengthMismatch { slot: 0, expected: self.declared_len, got: bytes.len() });
        }
        self.data.store(Arc::new(bytes.to_vec()));
        self.last_write.store(Arc::new(Some(Instant::now())));
        Ok(())
    }

    /// Devuelve el ultimo snapshot publicado, completo.
    pub fn read(&self) -> Arc<Vec<u8>> {
        self.data.load_full()
    }

    pub fn last_write_at(&self) -> Option<Instant> {
        *self.last_write.load_full()
    }

    pub fn age(&self) -> Option<std::time::Duration> {
        self.last_write_at().map(|t| t.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_observe_full_snapshots_never_torn() {
        let buffer = CyclicBuffer::new(4);
        buffer.write(&[1, 2, 3, 4]).unwrap();
        let snapshot = buffer.read();
        assert_eq!(*snapshot, vec![1, 2, 3, 4]);
    }

    #[test]
    fn mismatched_length_is_rejected() {
        let buffer = CyclicBuffer::new(4);
        assert!(buffer.write(&[1, 2]).is_err());
    }
}
