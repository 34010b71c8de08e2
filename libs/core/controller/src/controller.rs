// [libs/core/controller/src/controller.rs]
/*!
 * APARATO: PROFINET CONTROLLER
 * Dueno de la interfaz de red, multiplexa recepcion entre todos los AR,
 * impulsa el reloj de envio ciclico, expone un unico pump `process()`.
 * Nunca bloquea en disco o base de datos.
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use hydroscada_core_ar::ArManager;
use hydroscada_core_frame::{parse_frame, FrameDropCounters, FrameKind, LinkLayer};
use pnet::util::MacAddr;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

use crate::errors::ControllerError;
use crate::stats::{CycleStats, CycleStatsSnapshot};

/// Capacidad acotada de la cola de tramas aciclicas (spec.md S5: todo
/// canal lleva un techo configurado). Desbordarla descarta la trama
/// nueva -- RPC/DCP/alarma ya viajan con reintento propio en su capa.
const ACYCLIC_QUEUE_CAPACITY: usize = 256;

/// Trama acyclica entregada fuera de banda al pool de trabajadores
/// (RPC, DCP, alarmas). El controlador solo la enruta; no la interpreta.
pub struct AcyclicFrame {
    pub kind: FrameKind,
    pub src_mac: MacAddr,
    pub payload: Vec<u8>,
}

pub struct ProfinetController {
    link: Arc<dyn LinkLayer>,
    ar_manager: Arc<ArManager>,
    frame_counters: FrameDropCounters,
    mac_to_station: RwLock<HashMap<MacAddr, String>>,
    cycle_time: Duration,
    stats: CycleStats,
    worker_pool: ThreadPool,
    acyclic_tx: Sender<AcyclicFrame>,
    degraded: AtomicBool,
    last_cycle_start: RwLock<Option<Instant>>,
}

impl ProfinetController {
    /// Construye el controlador junto con el extremo receptor del canal de
    /// tramas aciclicas; el consumidor (hilo de alarmas/RPC del binario)
    /// se queda con el `Receiver` devuelto.
    pub fn new(link: Arc<dyn LinkLayer>, ar_manager: Arc<ArManager>, cycle_time: Duration) -> (Self, Receiver<AcyclicFrame>) {
        let worker_pool = ThreadPoolBuilder::new()
            .num_threads(num_cpus::get())
            .thread_name(|i| format!("ar-worker-{i}"))
            .build()
            .expect("failed to build AR worker pool");

        let (acyclic_tx, acyclic_rx) = crossbeam_channel::bounded(ACYCLIC_QUEUE_CAPACITY);

        let controller = Self {
            link,
            ar_manager,
            frame_counters: FrameDropCounters::new(),
            mac_to_station: RwLock::new(HashMap::new()),
            cycle_time,
            stats: CycleStats::new(),
            worker_pool,
            acyclic_tx,
            degraded: AtomicBool::new(false),
            last_cycle_start: RwLock::new(None),
        };
        (controller, acyclic_rx)
    }

    pub fn bind_station(&self, mac: MacAddr, station_name: impl Into<String>) {
        self.mac_to_station.write().expect("LOCK_POISONED").insert(mac, station_name.into());
    }

    pub fn unbind_station(&self, mac: &MacAddr) {
        self.mac_to_station.write().expect("LOCK_POISONED").remove(mac);
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CycleStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn frame_drop_counters(&self) -> &FrameDropCounters {
        &self.frame_counters
    }

    /// Una sola iteracion del bucle principal: recibe (con deadline del
    /// ciclo), despacha, y registra estadisticas. Disenado para correrse
    /// en un tight loop desde un hilo dedicado.
    pub fn process(&self) -> Result<(), ControllerError> {
        let cycle_start = Instant::now();
        let previous_start = self.last_cycle_start.write().expect("LOCK_POISONED").replace(cycle_start);

        match self.link.recv_raw(self.cycle_time) {
            Ok(Some(bytes)) => self.dispatch(&bytes),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "controller: interface recv failed, marking degraded");
                self.degraded.store(true, Ordering::Relaxed);
                return Err(ControllerError::InterfaceUnavailable(err.to_string()));
            }
        }

        self.degraded.store(false, Ordering::Relaxed);

        if let Some(previous) = previous_start {
            self.stats.record(previous.elapsed(), self.cycle_time);
        }

        Ok(())
    }

    fn dispatch(&self, bytes: &[u8]) {
        let Some(parsed) = parse_frame(bytes, &self.frame_counters) else {
            return;
        };

        match parsed.kind {
            FrameKind::Rtc1 => {
                let station = self.mac_to_station.read().expect("LOCK_POISONED").get(&parsed.src_mac).cloned();
                if let Some(station) = station {
                    if let Err(err) = self.ar_manager.latch_input(&station, parsed.view) {
                        debug!(station, error = %err, "controller: failed to latch cyclic input");
                    }
                } else {
                    debug!(mac = %parsed.src_mac, "controller: cyclic frame from unbound station");
                }
            }
            FrameKind::Dcp(_) | FrameKind::RpcUdp | FrameKind::Alarm => {
                let payload = parsed.view.to_vec();
                let kind = parsed.kind;
                let src_mac = parsed.src_mac;
                let acyclic_tx = self.acyclic_tx.clone();
                // Acyclico: se despacha al pool para no bloquear el hilo de tiempo real.
                // La interpretacion semantica (RPC/alarma/DCP) vive en los
                // crates de dominio que consumen esta trama via el Receiver.
                self.worker_pool.spawn(move || {
                    let frame = AcyclicFrame { kind, src_mac, payload };
                    match acyclic_tx.try_send(frame) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => warn!(?kind, "controller: acyclic queue full, dropping frame"),
                        Err(TrySendError::Disconnected(_)) => debug!(?kind, "controller: acyclic consumer disconnected, dropping frame"),
                    }
                });
            }
            FrameKind::Unknown(_) => {}
        }
    }

    /// Emite la trama de salida ciclica declarada para `station`, usando
    /// el ultimo contenido publicado en su buffer de salida.
    pub fn send_cyclic_output(&self, station_mac: MacAddr, station_name: &str, local_mac: MacAddr) -> Result<(), ControllerError> {
        let output = self.ar_manager.read_output(station_name)?;
        let frame = hydroscada_core_frame::build_frame(FrameKind::Rtc1, &output, local_mac, station_mac, None)?;
        self.link.send_raw(&frame)?;
        Ok(())
    }
}
