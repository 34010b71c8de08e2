// [apps/controller/src/context.rs]
/*!
 * APARATO: RUNTIME CONTEXT
 * Fase de ignicion del arbol de composicion: construye cada subsistema
 * del nucleo y los enlaza entre si antes de que ningun hilo arranque.
 * Equivalente sincrono de `OrchestratorKernel::ignite` del orquestador:
 * todo lo que aqui se construye se mueve, ya listo, a `daemons::launch`.
 */

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crossbeam_channel::Receiver;
use hydroscada_core_ar::ArManager;
use hydroscada_core_controller::{AcyclicFrame, ProfinetController};
use hydroscada_core_frame::LinkLayer;
use hydroscada_domain_alarms::{AlarmEngine, EngineConfig as AlarmEngineConfig};
use hydroscada_domain_control::ControlEngine;
use hydroscada_domain_historian::HistorianManager;
use hydroscada_domain_registry::RtuRegistry;
use hydroscada_infra_coordination::{AuthorityManager, CircuitBreaker, Role};
use hydroscada_infra_ipc::{IpcServer, IpcServerConfig};
use hydroscada_infra_simulator::SimulatedLink;
use hydroscada_infra_store::{AlarmRepository, HistorianRepository, PidRepository, StoreClient};
use pnet::util::MacAddr;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::CoreError;
use crate::interface::RealLink;

/// Todos los subsistemas del nucleo, ya enlazados, listos para que
/// `daemons::launch` les de hilos propios.
pub struct RuntimeContext {
    pub config: Config,
    pub registry: Arc<RtuRegistry>,
    pub ar_manager: Arc<ArManager>,
    /// La misma referencia que `controller` posee internamente; se
    /// conserva aqui tambien porque el descubrimiento DCP (hilo PROFINET
    /// IO) necesita el `LinkLayer` directamente, fuera del pump
    /// `process()` del controlador.
    pub link: Arc<dyn LinkLayer>,
    pub controller: Arc<ProfinetController>,
    /// Extremo receptor de las tramas aciclicas (RPC/DCP/alarma) que el
    /// Controller enruta fuera del tight loop de tiempo real; drenado por
    /// el hilo de intake de alarmas (`daemons::spawn_acyclic_intake_thread`).
    pub acyclic_rx: Receiver<AcyclicFrame>,
    pub control_engine: Arc<ControlEngine>,
    pub alarm_engine: Arc<AlarmEngine>,
    pub historian: Arc<HistorianManager>,
    pub authority: Arc<AuthorityManager>,
    pub store_breaker: Arc<CircuitBreaker>,
    pub ipc_breaker: Arc<CircuitBreaker>,
    pub interface_breaker: Arc<CircuitBreaker>,
    pub store: Arc<StoreClient>,
    /// `publish_snapshot_tick` exige `&mut self` (el seqlock de
    /// `SnapshotRegion` escribe sobre el mmap propio); un solo hilo
    /// dedicado la toma prestada cada tick, asi que un mutex basta.
    pub ipc: Arc<Mutex<IpcServer>>,
    /// Ultimo MAC conocido por estacion, aprendido en el descubrimiento
    /// inicial. El Controller indexa por MAC; el resto del nucleo
    /// siempre piensa en nombres de estacion, asi que este mapa es el
    /// puente entre ambos mundos para el hilo PROFINET IO.
    pub station_macs: Arc<RwLock<HashMap<String, MacAddr>>>,
}

impl RuntimeContext {
    /// Construye el nucleo completo a partir de la configuracion
    /// resuelta. Solo `Fatal` (interfaz o memoria compartida
    /// inalcanzables) debe propagar fuera de aqui (spec.md S7); todo lo
    /// demas ya se degrada a estado observable dentro de cada subsistema.
    pub fn bootstrap(config: Config) -> Result<Self, CoreError> {
        let registry = Arc::new(RtuRegistry::new());

        let store = Arc::new(StoreClient::open(&config.database_url).map_err(|e| CoreError::PersistenceUnavailable(e.to_string()))?);
        hydrate_registry_from_store(&registry, &store);

        let historian_store = HistorianRepository::new(Arc::clone(&store));
        let historian = Arc::new(HistorianManager::new(Some(Arc::new(historian_store))));
        hydrate_historian_from_store(&historian, &store);

        let ar_manager = Arc::new(ArManager::new(config.base_reconnect_delay_ms, config.max_reconnect_delay_ms));

        let link: Arc<dyn LinkLayer> = if config.simulation_mode {
            info!("bootstrap: simulation_mode enabled, using in-memory link layer");
            build_simulated_link(&config)
        } else {
            Arc::new(RealLink::open(&config.interface, Duration::from_millis(config.cycle_time_ms)).map_err(|e| CoreError::InterfaceUnavailable(e.to_string()))?)
        };

        let (controller, acyclic_rx) = ProfinetController::new(Arc::clone(&link), Arc::clone(&ar_manager), Duration::from_millis(config.cycle_time_ms));
        let controller = Arc::new(controller);

        let control_engine = Arc::new(ControlEngine::new());
        hydrate_control_engine_from_store(&control_engine, &store);

        let alarm_engine = Arc::new(AlarmEngine::new(AlarmEngineConfig::default()));
        hydrate_alarm_engine_from_store(&alarm_engine, &store);

        let authority = Arc::new(AuthorityManager::new(Role::Primary, Duration::from_secs(config.force_claim_stall_secs)));

        let store_breaker = Arc::new(CircuitBreaker::new("store", config.breaker_failure_threshold, Duration::from_secs(config.breaker_cooldown_secs)));
        let ipc_breaker = Arc::new(CircuitBreaker::new("ipc", config.breaker_failure_threshold, Duration::from_secs(config.breaker_cooldown_secs)));
        let interface_breaker = Arc::new(CircuitBreaker::new("interface", config.breaker_failure_threshold, Duration::from_secs(config.breaker_cooldown_secs)));

        let snapshot_path = std::env::temp_dir().join(format!("{}.shm", config.ipc_name));
        let ipc = Arc::new(Mutex::new(
            IpcServer::open(IpcServerConfig { snapshot_path, ..IpcServerConfig::default() }, Arc::clone(&registry))
                .map_err(|e| CoreError::IpcInitFailed(e.to_string()))?,
        ));

        Ok(Self {
            config,
            registry,
            ar_manager,
            link,
            controller,
            acyclic_rx,
            control_engine,
            alarm_engine,
            historian,
            authority,
            store_breaker,
            ipc_breaker,
            interface_breaker,
            store,
            ipc,
            station_macs: Arc::new(RwLock::new(HashMap::new())),
        })
    }
}

fn build_simulated_link(config: &Config) -> Arc<dyn LinkLayer> {
    let link = SimulatedLink::new(pnet::util::MacAddr::new(0x02, 0, 0, 0, 0, 1));
    if let Some(scenario_path) = &config.simulation_scenario {
        match crate::scenario::load_scenario(scenario_path) {
            Ok(stations) => {
                for station in stations {
                    if let Err(e) = link.add_station(station) {
                        warn!(error = %e, "bootstrap: failed to register simulated station from scenario");
                    }
                }
            }
            Err(e) => warn!(error = %e, "bootstrap: failed to load simulation scenario, starting with no stations"),
        }
    }
    Arc::new(link)
}

/// Repuebla el Registry desde el almacen persistente al arrancar, para
/// que el proceso retome el inventario conocido tras un reinicio.
fn hydrate_registry_from_store(registry: &RtuRegistry, store: &StoreClient) {
    use hydroscada_infra_store::RtuRepository;

    let repo = RtuRepository::new(store);
    let devices = match repo.list_devices() {
        Ok(devices) => devices,
        Err(e) => {
            warn!(error = %e, "bootstrap: failed to hydrate device inventory from store, starting empty");
            return;
        }
    };

    for device in devices {
        let station_name = device.station_name.clone();
        if let Err(e) = registry.insert_device(device) {
            warn!(station = %station_name, error = %e, "bootstrap: failed to register hydrated device");
            continue;
        }
        let slots = repo.list_slots(&station_name).unwrap_or_default();
        if !slots.is_empty() {
            if let Err(e) = registry.lock_slot_layout(&station_name, slots) {
                warn!(station = %station_name, error = %e, "bootstrap: failed to restore slot layout");
            }
        }
        for (slot_number, sensor) in repo.list_sensors(&station_name).unwrap_or_default() {
            let _ = registry.insert_sensor(&station_name, slot_number, sensor);
        }
        for (slot_number, control) in repo.list_controls(&station_name).unwrap_or_default() {
            let _ = registry.insert_control(&station_name, slot_number, control);
        }
    }
}

/// Repuebla los lazos PID configurados desde el almacen persistente.
fn hydrate_control_engine_from_store(control_engine: &ControlEngine, store: &StoreClient) {
    let repo = PidRepository::new(store);
    match repo.list() {
        Ok(loops) => {
            for pid_loop in loops {
                let name = pid_loop.name.clone();
                if let Err(e) = control_engine.register_loop(pid_loop) {
                    warn!(pid_loop = %name, error = %e, "bootstrap: failed to register hydrated PID loop");
                }
            }
        }
        Err(e) => warn!(error = %e, "bootstrap: failed to hydrate PID loops from store, starting empty"),
    }
}

/// Repuebla las reglas de alarma configuradas desde el almacen persistente.
fn hydrate_alarm_engine_from_store(alarm_engine: &AlarmEngine, store: &StoreClient) {
    let repo = AlarmRepository::new(store);
    match repo.list_rules() {
        Ok(rules) => {
            for rule in rules {
                alarm_engine.create_rule(rule);
            }
        }
        Err(e) => warn!(error = %e, "bootstrap: failed to hydrate alarm rules from store, starting empty"),
    }
}

/// Repuebla la configuracion de tags del historiador desde el almacen persistente.
fn hydrate_historian_from_store(historian: &HistorianManager, store: &Arc<StoreClient>) {
    let repo = HistorianRepository::new(Arc::clone(store));
    match repo.list_tag_configs() {
        Ok(tags) => {
            for tag in tags {
                let source = tag.source.tag.clone();
                if let Err(e) = historian.register_tag(tag) {
                    warn!(tag = %source, error = %e, "bootstrap: failed to register hydrated historian tag");
                }
            }
        }
        Err(e) => warn!(error = %e, "bootstrap: failed to hydrate historian tag configs from store, starting empty"),
    }
}
