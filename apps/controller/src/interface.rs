// [apps/controller/src/interface.rs]
/*!
 * APARATO: REAL LINK LAYER
 * Implementacion de `LinkLayer` sobre una tarjeta de red fisica via
 * `pnet::datalink`. Vive en el binario, no en una libreria: es el unico
 * punto del arbol de composicion que toca una interfaz real, y su unica
 * responsabilidad es satisfacer el mismo contrato que
 * `hydroscada_infra_simulator::SimulatedLink` (spec.md S4.9) para que el
 * Frame Engine y el Controller no distingan el origen de los bytes.
 */

use std::sync::Mutex;
use std::time::Duration;

use hydroscada_core_frame::{FrameError, LinkLayer};
use pnet::datalink::{self, Channel, NetworkInterface};
use pnet::util::MacAddr;
use tracing::warn;

pub struct RealLink {
    local_mac: MacAddr,
    sender: Mutex<Box<dyn datalink::DataLinkSender>>,
    receiver: Mutex<Box<dyn datalink::DataLinkReceiver>>,
}

impl RealLink {
    /// Abre la interfaz fisica `name` con un socket de capa 2 crudo. El
    /// `read_timeout` se fija una sola vez al abrir el canal: `pnet` no
    /// admite un deadline distinto por llamada, asi que `recv_raw` hereda
    /// el tiempo de ciclo configurado como cota superior de espera.
    pub fn open(name: &str, read_timeout: Duration) -> Result<Self, FrameError> {
        let interface = find_interface(name).ok_or_else(|| FrameError::InterfaceUnavailable(format!("no such interface: {name}")))?;
        let local_mac = interface.mac.ok_or_else(|| FrameError::InterfaceUnavailable(format!("interface {name} has no MAC address")))?;

        let config = datalink::Config { read_timeout: Some(read_timeout), ..datalink::Config::default() };
        let channel = datalink::channel(&interface, config).map_err(|e| FrameError::InterfaceUnavailable(e.to_string()))?;

        let (tx, rx) = match channel {
            Channel::Ethernet(tx, rx) => (tx, rx),
            _ => return Err(FrameError::InterfaceUnavailable(format!("{name}: unsupported channel type"))),
        };

        Ok(Self { local_mac, sender: Mutex::new(tx), receiver: Mutex::new(rx) })
    }
}

impl LinkLayer for RealLink {
    fn send_raw(&self, frame: &[u8]) -> Result<(), FrameError> {
        let mut sender = self.sender.lock().expect("LOCK_POISONED");
        match sender.send_to(frame, None) {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(FrameError::SendFailed(e)),
            None => Err(FrameError::InterfaceUnavailable("send_to produced no result".into())),
        }
    }

    fn recv_raw(&self, _timeout: Duration) -> Result<Option<Vec<u8>>, FrameError> {
        let mut receiver = self.receiver.lock().expect("LOCK_POISONED");
        match receiver.next() {
            Ok(bytes) => Ok(Some(bytes.to_vec())),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut || e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => {
                warn!(error = %e, "interface: recv failed");
                Err(FrameError::InterfaceUnavailable(e.to_string()))
            }
        }
    }

    fn local_mac(&self) -> MacAddr {
        self.local_mac
    }
}

fn find_interface(name: &str) -> Option<NetworkInterface> {
    datalink::interfaces().into_iter().find(|i| i.name == name)
}
