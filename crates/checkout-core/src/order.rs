//! Órdenes on-chain de los activos del checkout.
//!
//! El algoritmo se ordena primero; después los datasets de uno en uno. El
//! primer fallo detiene la secuencia; el llamador decide si los recibos
//! parciales se descartan (intento fallido) o se conservan (interrupción).
use checkout_domain::{AccessDetails, AssetKind, ServiceRef};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::CheckoutError;
use crate::ports::{OrderQuote, OrderRequest, OrderService, TxId};

/// Recibo inmutable de la orden de un activo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub service: ServiceRef,
    pub kind: AssetKind,
    pub transaction_id: TxId,
    /// Orden previa todavía válida, sin transacción nueva.
    #[serde(default)]
    pub reused: bool,
}

/// Un activo listo para ordenar: servicio, detalles de acceso y cotización.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTarget {
    pub service: ServiceRef,
    pub kind: AssetKind,
    pub access: AccessDetails,
    pub quote: OrderQuote,
    pub session_id: Option<String>,
}

impl OrderTarget {
    /// Reutiliza el recibo de una ejecución interrumpida del mismo intento.
    pub fn resume_from(mut self, kept: Option<&OrderReceipt>) -> Self {
        if let Some(receipt) = kept {
            self.access.valid_order_tx = Some(receipt.transaction_id.clone());
        }
        self
    }
}

pub struct OrderOrchestrator {
    orders: Arc<dyn OrderService>,
    payer: String,
    consumer_address: String,
}

impl OrderOrchestrator {
    pub fn new(orders: Arc<dyn OrderService>, payer: impl Into<String>, consumer_address: impl Into<String>) -> Self {
        Self { orders,
               payer: payer.into(),
               consumer_address: consumer_address.into() }
    }

    /// Comprueba que cada dataset admite el algoritmo. Se ejecuta antes de
    /// cualquier transacción.
    pub async fn precheck(&self, algorithm: &ServiceRef, datasets: &[ServiceRef]) -> Result<(), CheckoutError> {
        for dataset in datasets {
            if !self.orders.is_orderable(dataset, algorithm).await? {
                return Err(CheckoutError::NotOrderable { asset_id: dataset.asset_id.clone(),
                                                         service_id: dataset.service_id.clone() });
            }
        }
        Ok(())
    }

    pub async fn order_algorithm(&self, target: &OrderTarget) -> Result<OrderReceipt, CheckoutError> {
        self.order_one(target).await
    }

    /// Ordena los datasets en secuencia. `on_receipt` se invoca tras cada
    /// orden confirmada, antes de pasar a la siguiente.
    pub async fn order_datasets<F>(&self, targets: &[OrderTarget], mut on_receipt: F) -> Result<Vec<OrderReceipt>, CheckoutError>
        where F: FnMut(&OrderReceipt) -> Result<(), CheckoutError>
    {
        let mut receipts = Vec::with_capacity(targets.len());
        for target in targets {
            let receipt = self.order_one(target).await?;
            on_receipt(&receipt)?;
            receipts.push(receipt);
        }
        Ok(receipts)
    }

    async fn order_one(&self, target: &OrderTarget) -> Result<OrderReceipt, CheckoutError> {
        if let Some(tx) = &target.access.valid_order_tx {
            debug!("orden previa válida para {}: {tx}", target.service);
            return Ok(OrderReceipt { service: target.service.clone(),
                                     kind: target.kind,
                                     transaction_id: tx.clone(),
                                     reused: true });
        }
        let request = OrderRequest { service: target.service.clone(),
                                     kind: target.kind,
                                     quote: target.quote.clone(),
                                     payer: self.payer.clone(),
                                     consumer_address: self.consumer_address.clone(),
                                     session_id: target.session_id.clone() };
        let tx = self.orders
                     .order(&request)
                     .await?
                     .ok_or_else(|| CheckoutError::TransactionFailed(format!("la orden de {} no devolvió transacción", target.service)))?;
        info!("{} {} ordenado: {tx}", target.kind, target.service);
        Ok(OrderReceipt { service: target.service.clone(),
                          kind: target.kind,
                          transaction_id: tx,
                          reused: false })
    }
}
