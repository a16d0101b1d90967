//! services/scheduler.rs
//! Reconciliación periódica: un loop que revalida canales cuya última
//! validación quedó vieja, y un loop de limpieza que poda el historial.
//! Un mutex de barrido garantiza que nunca corran dos pasadas a la vez;
//! la pasada suprimida se registra y se descarta, no se encola.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::settings::{Settings, MAX_INTERVAL_SECS};
use crate::models::channel_config::ChannelConfig;
use crate::models::validation_history::ValidationType;
use crate::services::channel_store::ChannelStore;
use crate::services::channel_validator::ChannelValidator;
use crate::services::credentials::CredentialProvider;

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_seconds: u64,
    pub staleness_window_seconds: u64,
    pub next_run_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepEntry {
    pub account_id: i64,
    pub valid: bool,
    pub error: Option<String>,
    pub permissions_changed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub checked: usize,
    pub successful: usize,
    pub failed: usize,
    pub entries: Vec<SweepEntry>,
}

struct SchedulerInner<C> {
    store: ChannelStore,
    validator: ChannelValidator,
    credentials: C,
    interval_secs: AtomicU64,
    staleness_window_secs: u64,
    cleanup_interval_secs: u64,
    history_retention_days: i64,
    running: AtomicBool,
    next_run: Mutex<Option<DateTime<Utc>>>,
    // Despierta el loop de validación cuando cambia el intervalo
    interval_changed: Notify,
    // try_lock sobre este mutex es el guard anti-solapamiento
    sweep_guard: tokio::sync::Mutex<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Qué canales entran en un barrido.
enum SweepSelection {
    /// Ventana de staleness (loop periódico).
    Stale,
    /// Todo el inventario (barrido forzado).
    All,
    /// Un solo canal (revalidación forzada puntual).
    Account(i64),
}

pub struct ValidationScheduler<C> {
    inner: Arc<SchedulerInner<C>>,
}

impl<C> Clone for ValidationScheduler<C> {
    fn clone(&self) -> Self {
        ValidationScheduler {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: CredentialProvider> ValidationScheduler<C> {
    pub fn new(
        store: ChannelStore,
        validator: ChannelValidator,
        credentials: C,
        settings: &Settings,
    ) -> Self {
        ValidationScheduler {
            inner: Arc::new(SchedulerInner {
                store,
                validator,
                credentials,
                interval_secs: AtomicU64::new(settings.periodic_validation_interval_secs),
                staleness_window_secs: settings.staleness_window_secs,
                cleanup_interval_secs: settings.cleanup_interval_secs,
                history_retention_days: settings.history_retention_days,
                running: AtomicBool::new(false),
                next_run: Mutex::new(None),
                interval_changed: Notify::new(),
                sweep_guard: tokio::sync::Mutex::new(()),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Arranca el loop de validación y el de limpieza. Idempotente:
    /// si ya corre, no arranca un segundo par.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            log::warn!("(start) El scheduler ya estaba corriendo");
            return;
        }

        let validation_inner = Arc::clone(&self.inner);
        let validation_task = tokio::spawn(async move {
            loop {
                let interval = validation_inner.interval_secs.load(Ordering::SeqCst);
                if let Ok(mut next_run) = validation_inner.next_run.lock() {
                    *next_run = Some(Utc::now() + ChronoDuration::seconds(interval as i64));
                }

                // Un cambio de intervalo re-arma el sleep en curso en vez
                // de esperar a que venza el intervalo viejo
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
                    _ = validation_inner.interval_changed.notified() => continue,
                }

                match run_sweep(&validation_inner, SweepSelection::Stale).await {
                    Ok(Some(summary)) => log::info!(
                        "(scheduler) Barrido periódico: {} canales, {} ok, {} con falla",
                        summary.checked,
                        summary.successful,
                        summary.failed
                    ),
                    Ok(None) => {}
                    Err(e) => log::error!("(scheduler) Barrido periódico falló: {:#}", e),
                }
            }
        });

        let cleanup_inner = Arc::clone(&self.inner);
        let cleanup_task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(cleanup_inner.cleanup_interval_secs)).await;

                let cutoff =
                    Utc::now() - ChronoDuration::days(cleanup_inner.history_retention_days);
                match cleanup_inner.store.prune_history(cutoff).await {
                    Ok(removed) if removed > 0 => {
                        log::info!("(scheduler) Limpieza de historial: {} registros", removed)
                    }
                    Ok(_) => {}
                    Err(e) => log::error!("(scheduler) Limpieza de historial falló: {:#}", e),
                }
            }
        });

        if let Ok(mut tasks) = self.inner.tasks.lock() {
            tasks.push(validation_task);
            tasks.push(cleanup_task);
        }

        log::info!(
            "(start) Scheduler corriendo: validación cada {}s, limpieza cada {}s",
            self.inner.interval_secs.load(Ordering::SeqCst),
            self.inner.cleanup_interval_secs
        );
    }

    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Ok(mut tasks) = self.inner.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        if let Ok(mut next_run) = self.inner.next_run.lock() {
            *next_run = None;
        }

        log::info!("(stop) Scheduler detenido");
    }

    pub fn status(&self) -> SchedulerStatus {
        let next_run_at = self
            .inner
            .next_run
            .lock()
            .map(|next_run| *next_run)
            .unwrap_or(None);

        SchedulerStatus {
            running: self.inner.running.load(Ordering::SeqCst),
            interval_seconds: self.inner.interval_secs.load(Ordering::SeqCst),
            staleness_window_seconds: self.inner.staleness_window_secs,
            next_run_at,
        }
    }

    /// Cambia el intervalo del loop de validación. Aplica de inmediato:
    /// el sleep en curso se re-arma con el valor nuevo.
    pub fn set_interval(&self, interval_secs: u64) -> Result<()> {
        if interval_secs == 0 || interval_secs > MAX_INTERVAL_SECS {
            return Err(anyhow!(
                "El intervalo debe estar entre 1 y {} segundos",
                MAX_INTERVAL_SECS
            ));
        }

        let previous = self.inner.interval_secs.swap(interval_secs, Ordering::SeqCst);
        self.inner.interval_changed.notify_waiters();
        log::info!(
            "(set_interval) Intervalo de validación: {}s -> {}s",
            previous,
            interval_secs
        );
        Ok(())
    }

    /// Barrido forzado, ignorando la ventana de staleness: todos los
    /// canales, o sólo el de la cuenta indicada. Devuelve None si otro
    /// barrido ya estaba en curso.
    pub async fn trigger_sweep(&self, account_id: Option<i64>) -> Result<Option<SweepSummary>> {
        let selection = match account_id {
            Some(account_id) => SweepSelection::Account(account_id),
            None => SweepSelection::All,
        };
        run_sweep(&self.inner, selection).await
    }
}

/// Una pasada completa de reconciliación sobre la selección indicada.
async fn run_sweep<C: CredentialProvider>(
    inner: &Arc<SchedulerInner<C>>,
    selection: SweepSelection,
) -> Result<Option<SweepSummary>> {
    let _guard = match inner.sweep_guard.try_lock() {
        Ok(guard) => guard,
        Err(_) => {
            log::warn!("(run_sweep) Barrido suprimido: ya hay uno en curso");
            return Ok(None);
        }
    };

    let started_at = Utc::now();
    let configs = match selection {
        SweepSelection::Stale => {
            let cutoff = started_at - ChronoDuration::seconds(inner.staleness_window_secs as i64);
            inner.store.list_stale(cutoff).await?
        }
        SweepSelection::All => inner.store.list_all().await?,
        SweepSelection::Account(account_id) => inner
            .store
            .get_by_account_id(account_id)
            .await?
            .into_iter()
            .collect(),
    };

    let entries = validate_batch(inner, &configs).await;
    let successful = entries.iter().filter(|entry| entry.valid).count();

    Ok(Some(SweepSummary {
        started_at,
        finished_at: Utc::now(),
        checked: entries.len(),
        successful,
        failed: entries.len() - successful,
        entries,
    }))
}

/// Valida los canales en secuencia. Una falla en un canal se registra y
/// no corta el resto del lote.
async fn validate_batch<C: CredentialProvider>(
    inner: &Arc<SchedulerInner<C>>,
    configs: &[ChannelConfig],
) -> Vec<SweepEntry> {
    let mut entries = Vec::with_capacity(configs.len());

    for config in configs {
        let outcome = match inner.credentials.get_bot_credentials(config.account_id).await {
            Ok(credentials) => {
                inner
                    .validator
                    .validate(config, &credentials, ValidationType::Periodic)
                    .await
            }
            Err(credential_error) => {
                inner
                    .validator
                    .record_failure(
                        config,
                        credential_error.to_string(),
                        ValidationType::Periodic,
                    )
                    .await
            }
        };

        match outcome {
            Ok(outcome) => entries.push(SweepEntry {
                account_id: config.account_id,
                valid: outcome.valid,
                error: outcome.error,
                permissions_changed: outcome.permissions_changed,
            }),
            Err(e) => {
                // Falla de persistencia: el canal queda como estaba y se
                // reintenta entero en el próximo barrido
                log::error!(
                    "(validate_batch) No se pudo validar la cuenta {}: {:#}",
                    config.account_id,
                    e
                );
                entries.push(SweepEntry {
                    account_id: config.account_id,
                    valid: false,
                    error: Some(format!("{:#}", e)),
                    permissions_changed: false,
                });
            }
        }
    }

    entries
}
