// [libs/shared/telemetry/src/lib.rs]
/*!
 * Inicializacion de `tracing` para todo el nucleo: un unico subscriber
 * global (JSON en produccion, compacto en desarrollo) y un panic hook
 * que garantiza que un hilo que colapsa (control scan, alarm scan,
 * PROFINET IO) deja un rastro antes de desaparecer.
 */

use std::panic;

use tracing::{error, info, instrument};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Inicializa el subscriber global de tracing y el panic hook.
///
/// En desarrollo (`debug_assertions`) emite logs compactos legibles; en
/// release emite JSON estructurado. Entra en panico si ya existe un
/// subscriber global (solo debe llamarse una vez, al arranque).
#[instrument(skip_all)]
pub fn init_tracing(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if cfg!(debug_assertions) { "debug" } else { "info" };
        format!("{service_name}={level},warn").into()
    });

    if cfg!(debug_assertions) {
        tracing_subscriber::registry().with(filter).with(fmt::layer().compact().with_target(false)).init();
    } else {
        tracing_subscriber::registry().with(filter).with(fmt::layer().json().flatten_event(true)).init();
    }

    let service = service_name.to_string();
    panic::set_hook(Box::new(move |info| {
        let location = info.location().map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column())).unwrap_or_else(|| "unknown".to_string());
        let payload = info.payload().downcast_ref::<&str>().copied().or_else(|| info.payload().downcast_ref::<String>().map(|s| s.as_str())).unwrap_or("<no message>");
        error!(target: "panic", service = %service, location = %location, "thread panicked: {payload}");
    }));

    info!(service = %service_name, "telemetry initialized");
}
