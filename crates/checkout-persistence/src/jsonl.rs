//! `EventStore` append-only en JSON lines.
//!
//! Una línea por `CheckoutEvent`. Al abrir se lee el archivo completo para
//! reconstruir el índice por checkout (seq siguiente y orden de aparición);
//! cada `append_kind` escribe la línea y hace `sync_data` antes de devolver
//! el evento. Las lecturas salen del índice en memoria.
//!
//! El replay no necesita un repositorio propio: los eventos devueltos por
//! `list` se pasan tal cual a `InMemoryCheckoutRepository`.
use chrono::Utc;
use checkout_core::{CheckoutError, CheckoutEvent, CheckoutEventKind, EventStore};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::PersistenceError;

#[derive(Debug)]
pub struct JsonlEventStore {
    path: PathBuf,
    file: File,
    inner: HashMap<Uuid, Vec<CheckoutEvent>>,
    order: Vec<Uuid>,
}

impl JsonlEventStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let (inner, order) = if path.exists() { Self::read_all(&path)? } else { (HashMap::new(), Vec::new()) };
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        log::debug!("event log {} abierto: {} checkouts", path.display(), order.len());
        Ok(Self { path, file, inner, order })
    }

    /// Lee el log sin abrirlo para escritura.
    pub fn read_events(path: impl AsRef<Path>) -> Result<Vec<CheckoutEvent>, PersistenceError> {
        let (mut inner, order) = Self::read_all(path.as_ref())?;
        Ok(order.into_iter().flat_map(|id| inner.remove(&id).unwrap_or_default()).collect())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(path: &Path) -> Result<(HashMap<Uuid, Vec<CheckoutEvent>>, Vec<Uuid>), PersistenceError> {
        let reader = BufReader::new(File::open(path)?);
        let mut inner: HashMap<Uuid, Vec<CheckoutEvent>> = HashMap::new();
        let mut order = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let corrupt = |msg: String| PersistenceError::Corrupt { path: path.display().to_string(),
                                                                   line: i + 1,
                                                                   msg };
            let ev: CheckoutEvent = serde_json::from_str(&line).map_err(|e| corrupt(e.to_string()))?;
            let events = inner.entry(ev.checkout_id).or_default();
            if ev.seq != events.len() as u64 {
                return Err(corrupt(format!("seq {} fuera de orden (esperado {})", ev.seq, events.len())));
            }
            if events.is_empty() {
                order.push(ev.checkout_id);
            }
            events.push(ev);
        }
        Ok((inner, order))
    }

    fn write_line(&mut self, ev: &CheckoutEvent) -> Result<(), PersistenceError> {
        let mut line = serde_json::to_vec(ev)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.sync_data()?;
        Ok(())
    }
}

impl EventStore for JsonlEventStore {
    fn append_kind(&mut self, checkout_id: Uuid, kind: CheckoutEventKind) -> Result<CheckoutEvent, CheckoutError> {
        let seq = self.inner.get(&checkout_id).map_or(0, |v| v.len() as u64);
        let ev = CheckoutEvent { seq,
                                 checkout_id,
                                 kind,
                                 ts: Utc::now() };
        self.write_line(&ev)?;
        if seq == 0 {
            self.order.push(checkout_id);
        }
        self.inner.entry(checkout_id).or_default().push(ev.clone());
        Ok(ev)
    }

    fn list(&self, checkout_id: Uuid) -> Result<Vec<CheckoutEvent>, CheckoutError> {
        Ok(self.inner.get(&checkout_id).cloned().unwrap_or_default())
    }

    fn checkouts(&self) -> Result<Vec<Uuid>, CheckoutError> {
        Ok(self.order.clone())
    }
}
