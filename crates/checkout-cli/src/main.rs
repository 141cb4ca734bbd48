use c2d_checkout::{init_logging, open_engine, open_session_store, AppConfig, CoreError};
use checkout_adapters::{LedgerScript, ProviderScript, Scenario, ScenarioRig};
use checkout_core::credential::{spawn_expiry_ticker, CredentialQueue, SharedQueue, SystemClock};
use checkout_core::{CheckoutEngine, CheckoutEvent, CheckoutPhase, CheckoutRepository, InMemoryCheckoutRepository, VerificationDriver};
use checkout_domain::PriceSummary;
use checkout_persistence::{FileSessionStore, JsonlEventStore};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const USAGE: &str = "Uso:
  c2d-checkout quote <escenario.json>
  c2d-checkout run <escenario.json> [--event-log <ruta>] [--sessions <ruta>]
  c2d-checkout retry <escenario.json> --checkout <UUID> [--event-log <ruta>] [--sessions <ruta>] [--no-faults]
  c2d-checkout events [<log.jsonl>] [--checkout <UUID>]";

/// Argumentos posicionales y flags `--clave valor` (o `--clave` sola).
struct Args {
    positional: Vec<String>,
    flags: HashMap<String, Option<String>>,
}

impl Args {
    fn parse(raw: &[String]) -> Self {
        let mut positional = Vec::new();
        let mut flags = HashMap::new();
        let mut i = 0;
        while i < raw.len() {
            if let Some(name) = raw[i].strip_prefix("--") {
                let value = raw.get(i + 1).filter(|v| !v.starts_with("--")).cloned();
                if value.is_some() {
                    i += 1;
                }
                flags.insert(name.to_string(), value);
            } else {
                positional.push(raw[i].clone());
            }
            i += 1;
        }
        Self { positional, flags }
    }

    fn value(&self, name: &str) -> Option<&str> {
        self.flags.get(name).and_then(|v| v.as_deref())
    }

    fn has(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    fn path(&self, name: &str) -> Option<PathBuf> {
        self.value(name).map(PathBuf::from)
    }

    fn checkout(&self) -> Result<Option<Uuid>, CoreError> {
        self.value("checkout")
            .map(|raw| Uuid::parse_str(raw).map_err(|e| CoreError::Config(format!("--checkout {raw}: {e}"))))
            .transpose()
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let argv: Vec<String> = std::env::args().collect();
    let Some(command) = argv.get(1).cloned() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    let args = Args::parse(&argv[2..]);

    let result = match command.as_str() {
        "quote" => quote(&args).await,
        "run" => run(&args).await,
        "retry" => retry(&args).await,
        "events" => events(&args),
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };
    match result {
        Ok(code) => std::process::exit(code),
        Err(e @ (CoreError::Config(_) | CoreError::Scenario(_))) => {
            eprintln!("[c2d-checkout {command}] {e}");
            std::process::exit(3);
        }
        Err(e) => {
            eprintln!("[c2d-checkout {command}] error: {e}");
            std::process::exit(5);
        }
    }
}

fn scenario_arg(args: &Args) -> Result<PathBuf, CoreError> {
    args.positional
        .first()
        .map(PathBuf::from)
        .ok_or_else(|| CoreError::Config(format!("falta el escenario\n{USAGE}")))
}

fn load_rig(args: &Args, app: &AppConfig) -> Result<ScenarioRig, CoreError> {
    let path = scenario_arg(args)?;
    let scenario = Scenario::from_path(&path)?;
    log::info!("escenario '{}' cargado desde {}", scenario.name, path.display());
    Ok(scenario.build(&app.checkout)?)
}

fn print_summary(summary: &PriceSummary) {
    println!("{:<28} {:>10} {:>24} {:>24}", "concepto", "token", "precio", "fee");
    for line in &summary.lines {
        let note = if line.waived { " (ya pagado)" } else { "" };
        println!("{:<28} {:>10} {:>24} {:>24}{note}", line.label, line.token_symbol, line.base, line.fee);
    }
    println!("total:");
    for entry in &summary.entries {
        let note = if entry.is_informational() { " (sin cargo)" } else { "" };
        println!("  {} {}{note}", entry.amount, entry.token_symbol);
    }
}

async fn quote(args: &Args) -> Result<i32, CoreError> {
    let app = AppConfig::from_env()?;
    let rig = load_rig(args, &app)?;
    let engine = CheckoutEngine::in_memory(rig.ports()).config(app.checkout.clone()).build();
    let resolution = engine.quote(&rig.request, &CancellationToken::new()).await?;
    print_summary(&resolution.summary);
    println!("fingerprint: {}", resolution.fingerprint);
    Ok(0)
}

fn credential_queue(args: &Args, app: &AppConfig, rig: &ScenarioRig) -> Result<SharedQueue, CoreError> {
    let store = match args.path("sessions") {
        Some(path) => FileSessionStore::open(path)?,
        None => open_session_store(app)?,
    };
    let mut queue = CredentialQueue::new(Arc::new(store), Arc::new(SystemClock), app.checkout.credential_ttl);
    queue.init_queue(rig.verification_items());
    Ok(Arc::new(Mutex::new(queue)))
}

/// Verifica las credenciales pendientes. `false` si alguna falló.
async fn verify_credentials(app: &AppConfig, rig: &ScenarioRig, queue: &SharedQueue, cancel: &CancellationToken) -> Result<bool, CoreError> {
    let Some(start) = queue.lock().await.next_pending() else {
        return Ok(true);
    };
    let driver = VerificationDriver::new(queue.clone(), rig.verifier.clone(), app.checkout.auto_advance_debounce);
    let report = driver.run_from(start, cancel)
                       .await
                       .map_err(|e| CoreError::Internal(format!("cola de credenciales: {e}")))?;
    let q = queue.lock().await;
    for index in &report.verified {
        if let Some(item) = q.item(*index) {
            println!("credencial verificada: {}", item.display_name);
        }
    }
    if let Some(item) = report.failed.and_then(|i| q.item(i)) {
        eprintln!("verificación fallida para {} ({})", item.display_name, item.service);
        return Ok(false);
    }
    Ok(!report.cancelled)
}

async fn execute(args: &Args, app: &AppConfig, rig: &ScenarioRig, checkout_id: Option<Uuid>) -> Result<i32, CoreError> {
    let queue = credential_queue(args, app, rig)?;
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });
    let ticker = spawn_expiry_ticker(queue.clone(), app.checkout.expiry_tick, cancel.child_token());

    let mut engine = open_engine(app, rig.ports(), args.path("event-log").as_deref(), checkout_id)?;
    if checkout_id.is_some() {
        let inst = engine.instance()?;
        if inst.phase == CheckoutPhase::Failed {
            let attempt = engine.retry()?;
            println!("reintento {attempt} del checkout {}", engine.checkout_id());
        } else {
            // interrumpido: se reanuda el mismo intento con sus recibos
            println!("reanudando el intento {} del checkout {} ({} recibos)", inst.attempt, engine.checkout_id(), inst.receipts.len());
        }
    }

    let code = if !verify_credentials(app, rig, &queue, &cancel).await? {
        4
    } else {
        match engine.start_job(&rig.request, &queue, &cancel).await {
            Ok(submission) => {
                for receipt in &submission.receipts {
                    let reused = if receipt.reused { " (orden previa)" } else { "" };
                    println!("orden {} {}: {}{reused}", receipt.kind, receipt.service, receipt.transaction_id);
                }
                println!("job enviado: {} (checkout {})", submission.job_id, submission.checkout_id);
                0
            }
            Err(e) => {
                eprintln!("{}", e.user_message());
                if e.is_retryable() {
                    eprintln!("reintentar con: c2d-checkout retry <escenario> --checkout {}", engine.checkout_id());
                }
                4
            }
        }
    };
    cancel.cancel();
    let _ = ticker.await;
    Ok(code)
}

async fn run(args: &Args) -> Result<i32, CoreError> {
    let app = AppConfig::from_env()?;
    let rig = load_rig(args, &app)?;
    execute(args, &app, &rig, None).await
}

async fn retry(args: &Args) -> Result<i32, CoreError> {
    let app = AppConfig::from_env()?;
    let Some(checkout_id) = args.checkout()? else {
        eprintln!("{USAGE}");
        return Ok(2);
    };
    let rig = load_rig(args, &app)?;
    if args.has("no-faults") {
        rig.ledger.set_script(LedgerScript::default());
        rig.provider.set_script(ProviderScript::default());
    }
    execute(args, &app, &rig, Some(checkout_id)).await
}

fn events(args: &Args) -> Result<i32, CoreError> {
    let path = match args.positional.first() {
        Some(p) => PathBuf::from(p),
        None => AppConfig::from_env()?.store.event_log,
    };
    let filter = args.checkout()?;
    let all = JsonlEventStore::read_events(&path)?;
    let mut by_checkout: Vec<(Uuid, Vec<CheckoutEvent>)> = Vec::new();
    for ev in all.into_iter().filter(|e| filter.map_or(true, |id| id == e.checkout_id)) {
        match by_checkout.iter_mut().find(|(id, _)| *id == ev.checkout_id) {
            Some((_, list)) => list.push(ev),
            None => by_checkout.push((ev.checkout_id, vec![ev])),
        }
    }
    if by_checkout.is_empty() {
        eprintln!("sin eventos en {}", path.display());
        return Ok(4);
    }
    let repo = InMemoryCheckoutRepository::new();
    for (id, list) in &by_checkout {
        println!("checkout {id}");
        for ev in list {
            println!("  #{:<3} {} {}", ev.seq, ev.ts.to_rfc3339(), ev.kind.name());
        }
        let inst = repo.load(*id, list);
        let detail = serde_json::to_string(&inst).map_err(|e| CoreError::Internal(e.to_string()))?;
        println!("  fase: {} (intento {})", inst.phase, inst.attempt);
        log::debug!("instancia: {detail}");
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Args {
        Args::parse(&raw.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn flags_and_positionals_are_split() {
        let a = args(&["scenario.json", "--event-log", "/tmp/e.jsonl", "--no-faults"]);
        assert_eq!(a.positional, vec!["scenario.json"]);
        assert_eq!(a.path("event-log"), Some(PathBuf::from("/tmp/e.jsonl")));
        assert!(a.has("no-faults"));
        assert_eq!(a.value("no-faults"), None);
    }

    #[test]
    fn malformed_checkout_id_is_a_config_error() {
        assert!(matches!(args(&["--checkout", "nope"]).checkout(), Err(CoreError::Config(_))));
        let id = Uuid::new_v4();
        assert_eq!(args(&["--checkout", &id.to_string()]).checkout().unwrap(), Some(id));
    }
}
