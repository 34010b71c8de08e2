// INICIO DEL ARCHIVO [apps/controller/src/bin/migrator.rs]
/**
 * =================================================================
 * APARATO: DB MIGRATOR CLI (V2.6 - GOLD MASTER)
 * CLASIFICACIÓN: OPS INFRASTRUCTURE (ESTRATO L6)
 * RESPONSABILIDAD: EJECUCIÓN DE BOOTSTRAP Y NIVELACIÓN DEL ESQUEMA
 *
 * VISION HIPER-HOLÍSTICA:
 * Aplica el esquema sovereign (rtus, slots, sensores, controles,
 * reglas/eventos de alarma, lazos PID, historian, diagnostics) sobre
 * el almacen SQLite embebido. Sin runtime asincrono: el nucleo entero
 * opera sobre hilos del sistema operativo (spec.md S9), de modo que
 * este binario tampoco lo necesita.
 * =================================================================
 */

use dotenvy::dotenv;
use hydroscada_infra_store::StoreClient;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    // 1. CARGA DE ENTORNO OPERATIVO
    dotenv().ok();
    hydroscada_shared_telemetry::init_tracing("hydroscada_migrator");

    info!("🚀 [MIGRATOR]: Initiating structural audit of the persistent store...");

    // 2. ADQUISICIÓN DE CREDENCIALES ESTRATÉGICAS
    let database_url = std::env::var("HYDROSCADA_DATABASE_URL")
        .expect("CRITICAL_FAULT: HYDROSCADA_DATABASE_URL undefined in terminal context.");

    // 3. APERTURA + BOOTSTRAP DEL ESQUEMA (StoreClient::open aplica el
    // esquema completo en el mismo paso; no hay estrato de handshake
    // remoto que negociar, el archivo vive en el filesystem local).
    match StoreClient::open(&database_url) {
        Ok(_client) => {
            info!("✨ [MIGRATOR_SUCCESS]: Persistent store is now at gold master level.");
            Ok(())
        }
        Err(schema_fault) => {
            error!("💀 [SCHEMA_COLLAPSE]: Fatal structural error: {}", schema_fault);
            std::process::exit(1);
        }
    }
}
// FIN DEL ARCHIVO [apps/controller/src/bin/migrator.rs]
