//! Agregador de precios multi-token.
//!
//! Combina el precio de los datasets, del algoritmo y de los recursos (más
//! comisiones de mercado y del proveedor) en una lista mínima de
//! `PriceEntry`, una por símbolo de token. Invariantes:
//! - nunca hay dos entradas con el mismo `token_symbol`;
//! - un activo ya pagado (orden previa válida o token de acceso en cartera)
//!   aporta exactamente 0, sin comisión, pero sigue en el desglose;
//! - la suma de las entradas es igual a la suma de las líneas (precio +
//!   comisión), sin redondeos intermedios.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{DomainError, TokenAmount};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Dataset,
    Algorithm,
    Resource,
    ProviderFee,
}

/// Precio de un componente del checkout antes de comisiones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedItem {
    pub label: String,
    pub amount: TokenAmount,
    pub token_symbol: String,
    #[serde(default)]
    pub already_paid: bool,
}

impl PricedItem {
    pub fn new(label: impl Into<String>, amount: TokenAmount, token_symbol: impl Into<String>) -> Self {
        Self { label: label.into(),
               amount,
               token_symbol: token_symbol.into(),
               already_paid: false }
    }

    pub fn already_paid(mut self, paid: bool) -> Self {
        self.already_paid = paid;
        self
    }
}

/// Comisión adicional del proveedor, sin comisión de mercado encima.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeItem {
    pub label: String,
    pub amount: TokenAmount,
    pub token_symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceInput {
    pub datasets: Vec<PricedItem>,
    pub algorithm: PricedItem,
    pub resource: PricedItem,
    /// Porcentaje de comisión (`1` = 1%).
    pub fee_rate_percent: TokenAmount,
    #[serde(default)]
    pub extra_fees: Vec<FeeItem>,
}

/// Línea del desglose itemizado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLine {
    pub label: String,
    pub kind: LineKind,
    pub token_symbol: String,
    pub base: TokenAmount,
    pub fee: TokenAmount,
    /// Precio anulado porque el activo ya estaba pagado.
    pub waived: bool,
}

impl PriceLine {
    pub fn total(&self) -> Result<TokenAmount, DomainError> {
        self.base.checked_add(self.fee)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub token_symbol: String,
    pub amount: TokenAmount,
}

impl PriceEntry {
    /// Un valor `0` es sólo informativo.
    pub fn is_informational(&self) -> bool {
        self.amount.is_zero()
    }
}

/// Resultado del árbol de decisión por igualdad de símbolos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolGrouping {
    /// recurso == algoritmo == dataset
    AllShared,
    /// recurso == algoritmo, dataset aparte
    ResourceWithAlgorithm,
    /// dataset == recurso, algoritmo aparte
    DatasetWithResource,
    /// dataset == algoritmo, recurso aparte
    DatasetWithAlgorithm,
    AllDistinct,
}

/// Evalúa las igualdades en orden de precedencia: recurso/algoritmo,
/// dataset/recurso y dataset/algoritmo.
pub fn classify(dataset: Option<&str>, algorithm: &str, resource: &str) -> SymbolGrouping {
    if resource == algorithm {
        if dataset == Some(resource) {
            SymbolGrouping::AllShared
        } else {
            SymbolGrouping::ResourceWithAlgorithm
        }
    } else if dataset == Some(resource) {
        SymbolGrouping::DatasetWithResource
    } else if dataset == Some(algorithm) {
        SymbolGrouping::DatasetWithAlgorithm
    } else {
        SymbolGrouping::AllDistinct
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSummary {
    pub lines: Vec<PriceLine>,
    pub entries: Vec<PriceEntry>,
    pub grouping: SymbolGrouping,
}

impl PriceSummary {
    pub fn entry(&self, token_symbol: &str) -> Option<&PriceEntry> {
        self.entries.iter().find(|e| e.token_symbol == token_symbol)
    }

    /// Entradas que el usuario efectivamente paga (excluye valores `0`).
    pub fn headline(&self) -> Vec<&PriceEntry> {
        self.entries.iter().filter(|e| !e.is_informational()).collect()
    }

    /// Total nominal: suma de todas las entradas, redondeada una sola vez.
    pub fn grand_total(&self, precision: u32) -> Result<TokenAmount, DomainError> {
        Ok(TokenAmount::sum(self.entries.iter().map(|e| e.amount))?.round_dp(precision))
    }
}

fn priced_line(item: &PricedItem, kind: LineKind, fee_rate_percent: TokenAmount) -> Result<PriceLine, DomainError> {
    let (base, fee) = if item.already_paid {
        (TokenAmount::ZERO, TokenAmount::ZERO)
    } else {
        (item.amount, item.amount.percent(fee_rate_percent)?)
    };
    Ok(PriceLine { label: item.label.clone(),
                   kind,
                   token_symbol: item.token_symbol.clone(),
                   base,
                   fee,
                   waived: item.already_paid })
}

/// Construye el resumen de precios.
pub fn aggregate(input: &PriceInput) -> Result<PriceSummary, DomainError> {
    let dataset_symbol = input.datasets.first().map(|d| d.token_symbol.as_str());
    let algo_symbol = input.algorithm.token_symbol.as_str();
    let resource_symbol = input.resource.token_symbol.as_str();
    let grouping = classify(dataset_symbol, algo_symbol, resource_symbol);

    // El orden de las entradas sigue la decisión: primero el grupo fusionado.
    let mut order: Vec<&str> = match grouping {
        SymbolGrouping::AllShared => vec![resource_symbol],
        SymbolGrouping::ResourceWithAlgorithm => vec![resource_symbol],
        SymbolGrouping::DatasetWithResource => vec![resource_symbol, algo_symbol],
        SymbolGrouping::DatasetWithAlgorithm => vec![algo_symbol, resource_symbol],
        SymbolGrouping::AllDistinct => vec![algo_symbol, resource_symbol],
    };
    if let Some(ds) = dataset_symbol {
        match grouping {
            SymbolGrouping::ResourceWithAlgorithm => order.push(ds),
            SymbolGrouping::AllDistinct => order.insert(0, ds),
            _ => {}
        }
    }

    let mut totals: IndexMap<String, TokenAmount> = IndexMap::new();
    for symbol in order {
        totals.entry(symbol.to_string()).or_insert(TokenAmount::ZERO);
    }

    let mut lines = Vec::with_capacity(input.datasets.len() + 2 + input.extra_fees.len());
    for ds in &input.datasets {
        lines.push(priced_line(ds, LineKind::Dataset, input.fee_rate_percent)?);
    }
    lines.push(priced_line(&input.algorithm, LineKind::Algorithm, input.fee_rate_percent)?);
    lines.push(priced_line(&input.resource, LineKind::Resource, input.fee_rate_percent)?);
    for fee in &input.extra_fees {
        lines.push(PriceLine { label: fee.label.clone(),
                               kind: LineKind::ProviderFee,
                               token_symbol: fee.token_symbol.clone(),
                               base: fee.amount,
                               fee: TokenAmount::ZERO,
                               waived: false });
    }

    for line in &lines {
        let slot = totals.entry(line.token_symbol.clone()).or_insert(TokenAmount::ZERO);
        *slot = slot.checked_add(line.total()?)?;
    }

    let entries = totals.into_iter()
                        .map(|(token_symbol, amount)| PriceEntry { token_symbol, amount })
                        .collect();
    Ok(PriceSummary { lines, entries, grouping })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(s: &str) -> TokenAmount {
        TokenAmount::parse(s).unwrap()
    }

    #[test]
    fn decision_tree_precedence() {
        assert_eq!(classify(Some("A"), "A", "A"), SymbolGrouping::AllShared);
        assert_eq!(classify(Some("B"), "A", "A"), SymbolGrouping::ResourceWithAlgorithm);
        assert_eq!(classify(Some("A"), "B", "A"), SymbolGrouping::DatasetWithResource);
        assert_eq!(classify(Some("A"), "A", "B"), SymbolGrouping::DatasetWithAlgorithm);
        assert_eq!(classify(Some("A"), "B", "C"), SymbolGrouping::AllDistinct);
    }

    #[test]
    fn merged_group_comes_first() {
        let input = PriceInput { datasets: vec![PricedItem::new("ds", amt("1"), "A")],
                                 algorithm: PricedItem::new("algo", amt("1"), "B"),
                                 resource: PricedItem::new("res", amt("1"), "A"),
                                 fee_rate_percent: TokenAmount::ZERO,
                                 extra_fees: vec![] };
        let summary = aggregate(&input).unwrap();
        let symbols: Vec<_> = summary.entries.iter().map(|e| e.token_symbol.as_str()).collect();
        assert_eq!(symbols, vec!["A", "B"]);
        assert_eq!(summary.entry("A").unwrap().amount, amt("2"));
    }

    #[test]
    fn extra_fees_fold_into_existing_symbol() {
        let input = PriceInput { datasets: vec![PricedItem::new("ds", amt("1"), "OCEAN")],
                                 algorithm: PricedItem::new("algo", amt("1"), "OCEAN"),
                                 resource: PricedItem::new("res", amt("1"), "OCEAN"),
                                 fee_rate_percent: TokenAmount::ZERO,
                                 extra_fees: vec![FeeItem { label: "provider".into(), amount: amt("0.1"), token_symbol: "OCEAN".into() },
                                                  FeeItem { label: "provider".into(), amount: amt("0.2"), token_symbol: "USDC".into() }] };
        let summary = aggregate(&input).unwrap();
        assert_eq!(summary.entries.len(), 2);
        assert_eq!(summary.entry("OCEAN").unwrap().amount, amt("3.1"));
        assert_eq!(summary.entry("USDC").unwrap().amount, amt("0.2"));
    }

    #[test]
    fn zero_entries_stay_out_of_headline() {
        let input = PriceInput { datasets: vec![PricedItem::new("ds", amt("5"), "OCEAN").already_paid(true)],
                                 algorithm: PricedItem::new("algo", amt("0"), "mOCEAN"),
                                 resource: PricedItem::new("res", amt("1"), "OCEAN"),
                                 fee_rate_percent: amt("1"),
                                 extra_fees: vec![] };
        let summary = aggregate(&input).unwrap();
        assert_eq!(summary.entries.len(), 2);
        assert_eq!(summary.headline().len(), 1);
        assert_eq!(summary.grand_total(18).unwrap(), amt("1.01"));
        let ds_line = &summary.lines[0];
        assert!(ds_line.waived);
        assert_eq!(ds_line.total().unwrap(), TokenAmount::ZERO);
    }
}
