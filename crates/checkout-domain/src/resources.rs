//! ResourceConfigurator: traduce un entorno de cómputo y la entrada del
//! usuario a una selección de recursos validada y a su precio.
//!
//! Mantiene una selección por (entorno, tier). Cambiar de entorno no borra
//! las selecciones anteriores: quedan reemplazadas por la del entorno nuevo
//! y se recuperan si el usuario vuelve a él.
//!
//! Reglas de validación:
//! - la entrada debe ser numérica y no vacía;
//! - un valor fuera de `[min, max]` se rechaza y se conserva el anterior;
//! - RAM y disco se redondean a 1 decimal, CPU y duración a enteros.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::environment::{ComputeEnvironment, FeeSchedule};
use crate::{DomainError, TokenAmount};

/// Decimales del precio de recursos.
pub const RESOURCE_PRICE_DECIMALS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceId {
    Cpu,
    Ram,
    Disk,
    JobDuration,
}

impl ResourceId {
    /// Recursos con unidades que se piden al proveedor.
    pub const REQUESTABLE: [ResourceId; 3] = [ResourceId::Cpu, ResourceId::Ram, ResourceId::Disk];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceId::Cpu => "cpu",
            ResourceId::Ram => "ram",
            ResourceId::Disk => "disk",
            ResourceId::JobDuration => "jobDuration",
        }
    }

    fn decimals(self) -> i32 {
        match self {
            ResourceId::Ram | ResourceId::Disk => 1,
            ResourceId::Cpu | ResourceId::JobDuration => 0,
        }
    }

    fn step(self) -> f64 {
        match self {
            ResourceId::Ram | ResourceId::Disk => 0.1,
            ResourceId::Cpu | ResourceId::JobDuration => 1.0,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ResourceLimits {
    /// Límites de un recurso o entorno ausente.
    pub const NONE: ResourceLimits = ResourceLimits { min: 0.0, max: 0.0, step: 0.0 };

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSelection {
    pub env_id: String,
    pub tier: Tier,
    pub cpu: f64,
    pub ram: f64,
    pub disk: f64,
    pub job_duration_minutes: f64,
    pub price: TokenAmount,
}

impl ResourceSelection {
    pub fn get(&self, resource: ResourceId) -> f64 {
        match resource {
            ResourceId::Cpu => self.cpu,
            ResourceId::Ram => self.ram,
            ResourceId::Disk => self.disk,
            ResourceId::JobDuration => self.job_duration_minutes,
        }
    }

    fn set(&mut self, resource: ResourceId, value: f64) {
        match resource {
            ResourceId::Cpu => self.cpu = value,
            ResourceId::Ram => self.ram = value,
            ResourceId::Disk => self.disk = value,
            ResourceId::JobDuration => self.job_duration_minutes = value,
        }
    }

    /// Unidades de un recurso por id de tabla de precios. Recursos que no se
    /// seleccionan (p.ej. `gpu`) cuentan como 0.
    fn units_for(&self, price_id: &str) -> f64 {
        ResourceId::REQUESTABLE.iter()
                               .find(|r| r.as_str() == price_id)
                               .map(|r| self.get(*r))
                               .unwrap_or(0.0)
    }
}

/// Precio de una selección: 0 en el tier gratuito; en el de pago
/// `Σ unidades × precio unitario × duración (min)`, redondeado a 2 decimales.
pub fn calculate_price(tier: Tier, selection: &ResourceSelection, fees: Option<&FeeSchedule>) -> Result<TokenAmount, DomainError> {
    if tier == Tier::Free {
        return Ok(TokenAmount::ZERO);
    }
    let fees = fees.ok_or_else(|| DomainError::MissingPrice(format!("sin tabla de precios para el entorno {}", selection.env_id)))?;
    let mut per_minute = TokenAmount::ZERO;
    for unit in &fees.prices {
        let units = TokenAmount::from_f64(selection.units_for(&unit.id))?;
        per_minute = per_minute.checked_add(units.checked_mul(unit.price)?)?;
    }
    let duration = TokenAmount::from_f64(selection.job_duration_minutes)?;
    Ok(per_minute.checked_mul(duration)?.round_dp(RESOURCE_PRICE_DECIMALS))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub struct ResourceConfigurator {
    chain_id: u64,
    environment: Option<ComputeEnvironment>,
    selections: HashMap<(String, Tier), ResourceSelection>,
    messages: HashMap<(Tier, ResourceId), String>,
}

impl ResourceConfigurator {
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id,
               environment: None,
               selections: HashMap::new(),
               messages: HashMap::new() }
    }

    pub fn environment(&self) -> Option<&ComputeEnvironment> {
        self.environment.as_ref()
    }

    /// Tabla de precios del entorno actual para la cadena del usuario.
    pub fn fee_schedule(&self) -> Option<&FeeSchedule> {
        self.environment.as_ref().and_then(|e| e.fee_schedule(self.chain_id))
    }

    /// Selecciona un entorno. La primera vez que se ve un entorno se siembran
    /// ambas selecciones con los mínimos anunciados; duración 1 min en el tier
    /// gratuito y la duración máxima en el de pago.
    pub fn select_environment(&mut self, env: ComputeEnvironment) {
        self.messages.clear();
        let env_id = env.id.clone();
        self.environment = Some(env);
        for tier in [Tier::Free, Tier::Paid] {
            let key = (env_id.clone(), tier);
            if !self.tier_available(tier) {
                self.selections.remove(&key);
                continue;
            }
            if self.selections.contains_key(&key) {
                continue;
            }
            if let Some(seed) = self.seed_selection(tier) {
                self.selections.insert(key, seed);
            }
        }
    }

    /// El tier gratuito deja de estar disponible cuando la capacidad libre de
    /// algún recurso (`max - in_use`) cae por debajo de su mínimo.
    pub fn tier_available(&self, tier: Tier) -> bool {
        let Some(env) = self.environment.as_ref() else {
            return false;
        };
        match tier {
            Tier::Paid => true,
            Tier::Free => env.free
                             .as_ref()
                             .is_some_and(|free| free.resources.iter().all(|b| b.max - b.in_use >= b.min)),
        }
    }

    /// Selección del tier, o `TierUnavailable` si el entorno no lo ofrece.
    pub fn require_selection(&self, tier: Tier) -> Result<&ResourceSelection, DomainError> {
        let env = self.environment.as_ref().ok_or(DomainError::NoEnvironment)?;
        self.selection(tier).ok_or_else(|| DomainError::TierUnavailable { env_id: env.id.clone(), tier })
    }

    fn seed_selection(&self, tier: Tier) -> Option<ResourceSelection> {
        let env = self.environment.as_ref()?;
        let min_of = |id: ResourceId| -> f64 {
            let bound = match tier {
                Tier::Free => env.free_resource(id.as_str()),
                Tier::Paid => env.resource(id.as_str()),
            };
            bound.map(|b| b.min).unwrap_or(0.0)
        };
        let job_duration_minutes = match tier {
            Tier::Free => 1.0,
            Tier::Paid => (env.max_job_duration_secs / 60) as f64,
        };
        let mut selection = ResourceSelection { env_id: env.id.clone(),
                                                tier,
                                                cpu: min_of(ResourceId::Cpu),
                                                ram: min_of(ResourceId::Ram),
                                                disk: min_of(ResourceId::Disk),
                                                job_duration_minutes,
                                                price: TokenAmount::ZERO };
        selection.price = calculate_price(tier, &selection, self.fee_schedule()).unwrap_or(TokenAmount::ZERO);
        Some(selection)
    }

    /// Límites `{min, max, step}` de un recurso en un tier.
    pub fn limits(&self, resource: ResourceId, tier: Tier) -> ResourceLimits {
        let Some(env) = self.environment.as_ref() else {
            return ResourceLimits::NONE;
        };
        if resource == ResourceId::JobDuration {
            let max_secs = match tier {
                Tier::Free => match env.free.as_ref() {
                    Some(free) => free.max_job_duration_secs,
                    None => return ResourceLimits::NONE,
                },
                Tier::Paid => env.max_job_duration_secs,
            };
            let max = (max_secs / 60) as f64;
            if max <= 0.0 {
                return ResourceLimits::NONE;
            }
            return ResourceLimits { min: 1.0, max, step: resource.step() };
        }
        let bound = match tier {
            Tier::Free => env.free_resource(resource.as_str()),
            Tier::Paid => env.resource(resource.as_str()),
        };
        match bound {
            None => ResourceLimits::NONE,
            Some(b) => {
                let max = match tier {
                    Tier::Free => b.max - b.in_use,
                    Tier::Paid => b.max,
                };
                if max < b.min {
                    return ResourceLimits::NONE;
                }
                ResourceLimits { min: b.min,
                                 max,
                                 step: resource.step() }
            }
        }
    }

    /// Selección vigente (entorno actual) para un tier.
    pub fn selection(&self, tier: Tier) -> Option<&ResourceSelection> {
        let env = self.environment.as_ref()?;
        self.selections.get(&(env.id.clone(), tier))
    }

    /// Mensaje de validación pendiente para un recurso (UI).
    pub fn validation_message(&self, tier: Tier, resource: ResourceId) -> Option<&str> {
        self.messages.get(&(tier, resource)).map(String::as_str)
    }

    /// Aplica una entrada del usuario. Si la entrada es inválida se
    /// conserva el valor previo y se registra un mensaje visible.
    pub fn update_resource(&mut self, resource: ResourceId, raw: &str, tier: Tier) -> Result<f64, DomainError> {
        let env_id = self.environment.as_ref().map(|e| e.id.clone()).ok_or(DomainError::NoEnvironment)?;
        match self.validate(resource, raw, tier) {
            Ok(value) => {
                let fees = self.fee_schedule().cloned();
                let selection = self.selections.get_mut(&(env_id, tier)).ok_or(DomainError::NoEnvironment)?;
                let mut candidate = selection.clone();
                candidate.set(resource, value);
                // Sin tabla de precios el checkout falla al agregar, no aquí.
                candidate.price = match (tier, fees.as_ref()) {
                    (Tier::Paid, None) => TokenAmount::ZERO,
                    (_, fees) => calculate_price(tier, &candidate, fees)?,
                };
                *selection = candidate;
                self.messages.remove(&(tier, resource));
                Ok(value)
            }
            Err(e) => {
                self.messages.insert((tier, resource), e.to_string());
                Err(e)
            }
        }
    }

    fn validate(&self, resource: ResourceId, raw: &str, tier: Tier) -> Result<f64, DomainError> {
        let trimmed = raw.trim();
        let value: f64 = trimmed.parse().map_err(|_| DomainError::InvalidInput { resource })?;
        if trimmed.is_empty() || !value.is_finite() {
            return Err(DomainError::InvalidInput { resource });
        }
        let limits = self.limits(resource, tier);
        if !limits.contains(value) {
            return Err(DomainError::OutOfRange { resource,
                                                 value: trimmed.to_string(),
                                                 min: limits.min.to_string(),
                                                 max: limits.max.to_string() });
        }
        Ok(round_to(value, resource.decimals()).clamp(limits.min, limits.max))
    }
}
