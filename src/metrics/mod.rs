//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Transaction assembly and gas estimation
//! - Submissions per signing path
//! - Delegation fallbacks and resends
//! - Certificate signing

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec,
    TextEncoder,
};

lazy_static! {
    // Transaction metrics
    pub static ref TX_BUILT: CounterVec = register_counter_vec!(
        "thor_driver_transactions_built_total",
        "Total transaction bodies assembled",
        &[]
    ).unwrap();

    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "thor_driver_transactions_submitted_total",
        "Total transactions submitted by signing path",
        &["path"]
    ).unwrap();

    pub static ref TX_RESENT: CounterVec = register_counter_vec!(
        "thor_driver_transactions_resent_total",
        "Total resends of already-signed transactions",
        &[]
    ).unwrap();

    pub static ref DELEGATION_FALLBACKS: CounterVec = register_counter_vec!(
        "thor_driver_delegation_fallbacks_total",
        "Total sponsored transactions that fell back to self-signing",
        &[]
    ).unwrap();

    pub static ref GAS_ESTIMATED: HistogramVec = register_histogram_vec!(
        "thor_driver_estimated_gas",
        "Estimated gas limit per transaction",
        &[],
        vec![21_000.0, 50_000.0, 100_000.0, 250_000.0, 500_000.0, 1_000_000.0, 5_000_000.0]
    ).unwrap();

    // Certificate metrics
    pub static ref CERTS_SIGNED: CounterVec = register_counter_vec!(
        "thor_driver_certificates_signed_total",
        "Total certificates signed",
        &[]
    ).unwrap();
}

/// Render all registered metrics in the text exposition format
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

// Helper functions to record metrics

pub fn record_tx_built() {
    TX_BUILT.with_label_values(&[]).inc();
}

pub fn record_tx_submitted(path: &str) {
    TX_SUBMITTED.with_label_values(&[path]).inc();
}

pub fn record_tx_resent() {
    TX_RESENT.with_label_values(&[]).inc();
}

pub fn record_delegation_fallback() {
    DELEGATION_FALLBACKS.with_label_values(&[]).inc();
}

pub fn record_gas_estimated(gas: u64) {
    GAS_ESTIMATED.with_label_values(&[]).observe(gas as f64);
}

pub fn record_cert_signed() {
    CERTS_SIGNED.with_label_values(&[]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_contains_recorded_metrics() {
        record_tx_submitted("plain");
        record_cert_signed();
        let text = gather_text();
        assert!(text.contains("thor_driver_transactions_submitted_total"));
        assert!(text.contains("thor_driver_certificates_signed_total"));
    }
}
