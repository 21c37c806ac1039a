use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{labels, register_gauge, Gauge};
use tracing::debug;

use crate::validator::ValidationResult;

lazy_static! {
    static ref CERTCHECK_DAYS_BEFORE_EXPIRED: Gauge =
        register_gauge!("certcheck_days_before_expired", "days before expiration").unwrap();
    static ref CERTCHECK_VALID_FOR_DOMAIN: Gauge = register_gauge!(
        "certcheck_valid_for_domain",
        "1 if the certificate names the requested domain, 0 otherwise"
    )
    .unwrap();
}

/// Pushes one group of gauges per validated domain.
///
/// Stops at the first push that fails.
///
/// # Arguments
/// * `results` - successful validations to report
/// * `prometheus_address` - push gateway base address
/// * `now` - instant the remaining days are measured from
pub fn push_metrics(
    results: &[ValidationResult],
    prometheus_address: &str,
    now: DateTime<Utc>,
) -> prometheus::Result<()> {
    for result in results {
        CERTCHECK_DAYS_BEFORE_EXPIRED.set(result.days_remaining(now) as f64);
        CERTCHECK_VALID_FOR_DOMAIN.set(if result.valid_for_domain { 1.0 } else { 0.0 });

        let metric_families = prometheus::gather();
        prometheus::push_metrics(
            "certcheck",
            labels! {
                "instance".to_owned() => "certcheck".to_owned(),
                "domain".to_owned() => result.domain.to_owned(),
                "issuer".to_owned() => result.issuer_details.organization().unwrap_or("None").to_owned(),
                "status".to_owned() => result.validity_status.to_string(),
            },
            prometheus_address,
            metric_families,
            None,
        )?;
        debug!(domain = %result.domain, "pushed metrics");
    }
    Ok(())
}
