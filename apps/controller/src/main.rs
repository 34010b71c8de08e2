// [apps/controller/src/main.rs]
/*!
 * =================================================================
 * APARATO: CONTROLLER MAIN ENTRY POINT
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: BOOTSTRAP DEL NUCLEO E IGNICIÓN DE LOS HILOS DEDICADOS
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. SINCRONO POR DISEÑO: ningun hilo de este proceso corre un
 *    runtime async -- el ciclo PROFINET IO es un tight loop con
 *    deadlines de microsegundos, incompatible con la latencia de
 *    planificacion de un executor cooperativo.
 * 2. UN HILO POR RESPONSABILIDAD: PROFINET IO, Control Scan, Alarm
 *    Scan, Historian Flush, IPC Writer y Coordination corren cada uno
 *    en su propio hilo del sistema operativo, comunicados solo a
 *    traves de los subsistemas ya sincronizados del nucleo (nunca con
 *    canales ad-hoc entre hilos de esta capa).
 * 3. APAGADO ORDENADO: la bandera `running` se comparte entre todos los
 *    hilos; el orden de `join` deshace el orden de arranque para que
 *    ningun hilo dependa de un subsistema ya detenido.
 * =================================================================
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use hydroscada_controller::alarms_intake;
use hydroscada_controller::commands;
use hydroscada_controller::config::{Config, RawArgs};
use hydroscada_controller::context::RuntimeContext;
use hydroscada_controller::cyclic;
use hydroscada_controller::errors::ExitCode;
use hydroscada_domain_models::HistorianSample;
use tracing::{error, info, warn};

fn main() -> std::process::ExitCode {
    dotenvy::dotenv().ok();

    let args = RawArgs::parse();
    let config = match Config::resolve(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("[CORE_CONFIG_FAULT]: {err}");
            return to_process_exit_code(ExitCode::from(&err));
        }
    };

    hydroscada_shared_telemetry::init_tracing("hydroscada_controller");
    info!("controller: igniting, simulation_mode={}", config.simulation_mode);

    let context = match RuntimeContext::bootstrap(config) {
        Ok(context) => Arc::new(context),
        Err(err) => {
            error!(error = %err, "controller: bootstrap failed");
            return to_process_exit_code(ExitCode::from(&err));
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        if let Err(err) = ctrlc::set_handler(move || {
            info!("controller: shutdown signal received");
            running.store(false, Ordering::SeqCst);
        }) {
            warn!(error = %err, "controller: failed to install signal handler, ctrl-c will not stop the process gracefully");
        }
    }

    cyclic::discover_and_connect_known_devices(
        &context.link,
        &context.registry,
        &context.ar_manager,
        &context.controller,
        &context.station_macs,
        Duration::from_millis(500),
    );

    let profinet_io = spawn_profinet_io_thread(Arc::clone(&context), Arc::clone(&running));
    let acyclic_intake = spawn_acyclic_intake_thread(Arc::clone(&context), Arc::clone(&running));
    let control_scan = spawn_control_scan_thread(Arc::clone(&context), Arc::clone(&running));
    let alarm_scan = spawn_alarm_scan_thread(Arc::clone(&context), Arc::clone(&running));
    let historian_flush = spawn_historian_flush_thread(Arc::clone(&context), Arc::clone(&running));
    let ipc_writer = spawn_ipc_writer_thread(Arc::clone(&context), Arc::clone(&running));
    let coordination = spawn_coordination_thread(Arc::clone(&context), Arc::clone(&running));

    // Orden de apagado: inverso al de dependencia de arranque. Coordination
    // no alimenta a nadie, asi que se une primero; PROFINET IO es dueno de
    // la interfaz fisica y se une al final.
    let _ = coordination.join();
    let _ = control_scan.join();
    let _ = alarm_scan.join();
    let _ = historian_flush.join();
    let _ = ipc_writer.join();
    let _ = acyclic_intake.join();
    let _ = profinet_io.join();

    info!("controller: all threads joined, exiting");
    to_process_exit_code(ExitCode::Normal)
}

fn to_process_exit_code(code: ExitCode) -> std::process::ExitCode {
    std::process::ExitCode::from(code as i32 as u8)
}

/// Fija el hilo PROFINET IO al primer nucleo disponible para maximizar
/// la localidad de cache del tight loop ciclico (spec.md S5: prioridad
/// de tiempo real, SCHED_FIFO si esta disponible). La ausencia de
/// nucleos identificables (contenedor sin acceso a `sched_getaffinity`,
/// por ejemplo) no es fatal: el hilo sigue corriendo sin pinning.
fn pin_to_first_available_core() {
    match core_affinity::get_core_ids().and_then(|ids| ids.into_iter().next()) {
        Some(core_id) => {
            if !core_affinity::set_for_current(core_id) {
                warn!("profinet-io: failed to pin thread to core {:?}", core_id);
            }
        }
        None => warn!("profinet-io: no core ids available, running without affinity pinning"),
    }
}

/// Hilo PROFINET IO: el unico con deadline de tiempo real. Impulsa el
/// pump `process()` del controlador, decodifica/codifica los buffers
/// ciclicos de cada AR conocido, y revisa watchdogs.
fn spawn_profinet_io_thread(context: Arc<RuntimeContext>, running: Arc<AtomicBool>) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("profinet-io".into())
        .spawn(move || {
            pin_to_first_available_core();

            let local_mac = context.link.local_mac();
            let mut last_watchdog_check = std::time::Instant::now();
            let watchdog_interval = Duration::from_millis(context.config.cycle_time_ms * context.config.watchdog_factor as u64);

            while running.load(Ordering::Relaxed) {
                if let Err(err) = context.controller.process() {
                    warn!(error = %err, "profinet-io: cycle failed, interface degraded");
                }

                let stations: Vec<_> = context.station_macs.read().expect("LOCK_POISONED").clone().into_iter().collect();
                for (station_name, mac) in &stations {
                    cyclic::pump_input(&context.ar_manager, &context.registry, station_name);
                    cyclic::pump_output(&context.ar_manager, &context.registry, station_name);
                    if let Err(err) = context.controller.send_cyclic_output(*mac, station_name, local_mac) {
                        warn!(station = %station_name, error = %err, "profinet-io: failed to send cyclic output");
                    }
                }

                if last_watchdog_check.elapsed() >= watchdog_interval {
                    cyclic::service_watchdogs(&context.ar_manager, &context.registry, &context.station_macs, context.config.watchdog_factor, Duration::from_millis(context.config.cycle_time_ms));
                    last_watchdog_check = std::time::Instant::now();
                }
            }
        })
        .expect("failed to spawn profinet-io thread")
}

/// Hilo de intake aciclico: drena el `Receiver` de tramas RPC/DCP/alarma
/// que el Controller enruta fuera del tight loop de tiempo real y aplica
/// cada alarma de enclavamiento al motor de control (spec.md S4.3: un
/// segundo pool atiende RPC aciclico y alarmas).
fn spawn_acyclic_intake_thread(context: Arc<RuntimeContext>, running: Arc<AtomicBool>) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("acyclic-intake".into())
        .spawn(move || {
            let poll_interval = Duration::from_millis(context.config.cycle_time_ms);
            while running.load(Ordering::Relaxed) {
                alarms_intake::drain_acyclic_frames(&context.acyclic_rx, &context.registry, &context.control_engine);
                std::thread::sleep(poll_interval);
            }
        })
        .expect("failed to spawn acyclic-intake thread")
}

/// Hilo Control Scan: evalua todo lazo PID habilitado y avanza toda
/// secuencia activa, en cadencia de tiempo de ciclo.
fn spawn_control_scan_thread(context: Arc<RuntimeContext>, running: Arc<AtomicBool>) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("control-scan".into())
        .spawn(move || {
            let cycle_time = Duration::from_millis(context.config.cycle_time_ms);
            let dt_secs = cycle_time.as_secs_f64();
            while running.load(Ordering::Relaxed) {
                let report = context.control_engine.scan(&context.registry, dt_secs);
                if !report.sequences_faulted.is_empty() {
                    warn!(faulted = ?report.sequences_faulted, "control-scan: sequences faulted this cycle");
                }
                std::thread::sleep(cycle_time);
            }
        })
        .expect("failed to spawn control-scan thread")
}

/// Hilo Alarm Scan: evalua toda regla habilitada, siempre despues de
/// que el control engine computo sus salidas en el mismo periodo.
fn spawn_alarm_scan_thread(context: Arc<RuntimeContext>, running: Arc<AtomicBool>) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("alarm-scan".into())
        .spawn(move || {
            let cycle_time = Duration::from_millis(context.config.cycle_time_ms);
            while running.load(Ordering::Relaxed) {
                let report = context.alarm_engine.scan(&context.registry, Utc::now());
                if !report.rules_disabled.is_empty() {
                    info!(disabled = ?report.rules_disabled, "alarm-scan: rules auto-disabled by flood suppression");
                }
                std::thread::sleep(cycle_time);
            }
        })
        .expect("failed to spawn alarm-scan thread")
}

/// Hilo Historian Flush: muestrea cada tag configurado y lo ingesta; el
/// barrido de retencion es perezoso y se invoca en la misma cadencia
/// porque `sweep_retention` ya se autolimita a una vez cada 10 minutos.
fn spawn_historian_flush_thread(context: Arc<RuntimeContext>, running: Arc<AtomicBool>) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("historian-flush".into())
        .spawn(move || {
            let interval = Duration::from_millis(context.config.historian_flush_interval_ms);
            while running.load(Ordering::Relaxed) {
                for tag_name in context.historian.tag_names() {
                    match context.registry.sensor_by_tag(&tag_name) {
                        Ok(sensor) => {
                            if let Some(value) = sensor.usable_value() {
                                let sample = HistorianSample { timestamp: Utc::now(), value, quality: sensor.quality };
                                if let Err(err) = context.historian.ingest(&tag_name, sample) {
                                    warn!(tag = %tag_name, error = %err, "historian-flush: ingest failed");
                                }
                            }
                        }
                        Err(err) => warn!(tag = %tag_name, error = %err, "historian-flush: failed to resolve historized sensor"),
                    }
                }
                context.historian.sweep_retention(Utc::now());
                std::thread::sleep(interval);
            }
        })
        .expect("failed to spawn historian-flush thread")
}

/// Hilo IPC Writer: unico escritor del snapshot de memoria compartida y
/// unico drenador de la cola de comandos entrantes.
fn spawn_ipc_writer_thread(context: Arc<RuntimeContext>, running: Arc<AtomicBool>) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("ipc-writer".into())
        .spawn(move || {
            let cycle_time = Duration::from_millis(context.config.cycle_time_ms);
            while running.load(Ordering::Relaxed) {
                let mut ipc = context.ipc.lock().expect("LOCK_POISONED");
                if let Err(err) = ipc.publish_snapshot_tick() {
                    context.ipc_breaker.record_failure();
                    warn!(error = %err, "ipc-writer: failed to publish snapshot");
                } else {
                    context.ipc_breaker.record_success();
                }

                while let Some(mut command) = ipc.drain_next_command() {
                    let result = commands::dispatch(command.clone(), &context.registry, &context.control_engine, &context.alarm_engine, &context.authority);
                    command.result = Some(result);
                    info!(correlation_id = %command.correlation_id, result = ?command.result, "ipc-writer: command dispatched");
                }
                drop(ipc);

                std::thread::sleep(cycle_time);
            }
        })
        .expect("failed to spawn ipc-writer thread")
}

/// Hilo Coordination: supervisa el protocolo de handoff de autoridad y
/// el estado de los disyuntores de circuito de cada subsistema externo.
fn spawn_coordination_thread(context: Arc<RuntimeContext>, running: Arc<AtomicBool>) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("coordination".into())
        .spawn(move || {
            while running.load(Ordering::Relaxed) {
                if let Some(new_epoch) = context.authority.force_claim_if_stalled() {
                    warn!(new_epoch, "coordination: forced authority claim after stalled handoff");
                }
                // `allow_request` es la unica forma de que un disyuntor OPEN
                // transite a HALF_OPEN tras su enfriamiento; se consulta aqui
                // aunque nadie actue sobre el resultado en este hilo.
                for breaker in [&context.store_breaker, &context.ipc_breaker, &context.interface_breaker] {
                    let _ = breaker.allow_request();
                }
                std::thread::sleep(Duration::from_secs(1));
            }
        })
        .expect("failed to spawn coordination thread")
}
