use notify::RecursiveMode;
use notify_debouncer_full::{new_debouncer, DebounceEventResult};
use parking_lot::RwLock;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::Config;

/// Debounce para eventos del sistema de archivos
const DEBOUNCE_MS: u64 = 500;

/// Vigila el archivo de entorno y recarga la configuración en caliente
///
/// Solo se arranca en modo desarrollo. Al detectar un cambio se
/// reinyectan las variables del archivo y la nueva configuración
/// sustituye a la compartida; si no valida, se conserva la anterior.
pub fn spawn_config_watcher(config: Arc<RwLock<Config>>) -> anyhow::Result<()> {
    let path = config.read().env_file.clone();
    if !path.exists() {
        warn!(
            "♻️ {} no existe; la recarga en caliente queda apagada",
            path.display()
        );
        return Ok(());
    }

    let (tx, mut rx) = mpsc::channel::<()>(16);

    let mut debouncer = new_debouncer(
        Duration::from_millis(DEBOUNCE_MS),
        None,
        move |result: DebounceEventResult| match result {
            Ok(events) => {
                let relevant = events
                    .iter()
                    .any(|e| e.event.kind.is_modify() || e.event.kind.is_create());
                if relevant {
                    let _ = tx.blocking_send(());
                }
            }
            Err(errors) => {
                for e in errors {
                    warn!("Error del watcher: {:?}", e);
                }
            }
        },
    )?;

    debouncer.watch(&path, RecursiveMode::NonRecursive)?;
    info!("♻️ Recarga en caliente activada para {}", path.display());

    tokio::spawn(async move {
        // El debouncer vive dentro de la tarea; soltarlo pararía el watcher
        let _debouncer = debouncer;

        while rx.recv().await.is_some() {
            // dotenv normal no pisa variables ya presentes en el proceso
            if let Err(e) = dotenvy::from_path_override(&path) {
                warn!("No se pudo releer {}: {}", path.display(), e);
                continue;
            }

            match Config::load() {
                Ok(new_config) => {
                    *config.write() = new_config;
                    info!("♻️ Configuración recargada desde {}", path.display());
                }
                Err(e) => error!("❌ La configuración recargada no es válida: {:?}", e),
            }
        }
    });

    Ok(())
}
