//! Conversions between probability, rate and logit scales.
//!
//! Every conversion rejects out-of-domain input with
//! `SimError::NumericDomain` instead of producing NaN or infinity.
//! All rates and probabilities here are per month.

use crate::error::{SimError, SimResult};

/// Tolerance used when checking that a configured distribution sums to 1.
pub const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

fn check_finite(operation: &'static str, value: f64) -> SimResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimError::NumericDomain { operation, value })
    }
}

/// `rate = -ln(1 - p)`. Requires `0 <= p < 1`.
pub fn prob_to_rate(p: f64) -> SimResult<f64> {
    check_finite("prob_to_rate", p)?;
    if !(0.0..1.0).contains(&p) {
        return Err(SimError::NumericDomain {
            operation: "prob_to_rate",
            value: p,
        });
    }
    Ok(-(-p).ln_1p())
}

/// `p = 1 - exp(-rate)`. Requires `rate >= 0`.
pub fn rate_to_prob(rate: f64) -> SimResult<f64> {
    if rate.is_nan() || rate < 0.0 {
        return Err(SimError::NumericDomain {
            operation: "rate_to_prob",
            value: rate,
        });
    }
    Ok(-(-rate).exp_m1())
}

/// `logit(p) = ln(p / (1 - p))`. Requires `0 < p < 1`.
pub fn prob_to_logit(p: f64) -> SimResult<f64> {
    check_finite("prob_to_logit", p)?;
    if p <= 0.0 || p >= 1.0 {
        return Err(SimError::NumericDomain {
            operation: "prob_to_logit",
            value: p,
        });
    }
    Ok((p / (1.0 - p)).ln())
}

/// Inverse logit. Any finite logit maps into `(0, 1)`.
pub fn logit_to_prob(logit: f64) -> SimResult<f64> {
    check_finite("logit_to_prob", logit)?;
    Ok(1.0 / (1.0 + (-logit).exp()))
}

/// Apply a rate ratio to a monthly probability: convert to a rate, scale,
/// convert back. A zero probability stays zero for any ratio; a certain
/// event stays certain for any positive ratio.
pub fn rate_ratio_to_prob(p: f64, ratio: f64) -> SimResult<f64> {
    if ratio.is_nan() || ratio < 0.0 {
        return Err(SimError::NumericDomain {
            operation: "rate_ratio_to_prob",
            value: ratio,
        });
    }
    if p == 1.0 {
        return Ok(if ratio > 0.0 { 1.0 } else { 0.0 });
    }
    let rate = prob_to_rate(p)?;
    rate_to_prob(rate * ratio)
}

/// Shift a probability on the logit scale. Probabilities of exactly 0 or 1
/// are absorbing and returned unchanged.
pub fn adjust_on_logit(p: f64, shift: f64) -> SimResult<f64> {
    check_finite("adjust_on_logit", shift)?;
    if p == 0.0 || p == 1.0 {
        return Ok(p);
    }
    logit_to_prob(prob_to_logit(p)? + shift)
}

/// Normalise non-negative competing-risk weights into shares.
///
/// A zero total yields all-zero shares rather than NaN. Negative or
/// non-finite weights are rejected.
pub fn normalize_weights(weights: &[f64]) -> SimResult<Vec<f64>> {
    for &w in weights {
        if !w.is_finite() || w < 0.0 {
            return Err(SimError::NumericDomain {
                operation: "normalize_weights",
                value: w,
            });
        }
    }
    let total: f64 = weights.iter().sum();
    if total == 0.0 {
        return Ok(vec![0.0; weights.len()]);
    }
    Ok(weights.iter().map(|w| w / total).collect())
}

/// Check that `probs` is a proper distribution (non-negative, sums to 1).
pub fn check_distribution(name: &str, probs: &[f64], context: &str) -> SimResult<()> {
    if let Some(&bad) = probs.iter().find(|p| !p.is_finite() || **p < 0.0) {
        return Err(SimError::DistributionSum {
            distribution: name.to_string(),
            sum: bad,
            context: format!("{context}: entry is negative or not finite"),
        });
    }
    let sum: f64 = probs.iter().sum();
    if (sum - 1.0).abs() > DISTRIBUTION_TOLERANCE {
        return Err(SimError::DistributionSum {
            distribution: name.to_string(),
            sum,
            context: context.to_string(),
        });
    }
    Ok(())
}

/// Select the outcome whose cumulative interval contains `draw`.
///
/// `probs` must be a proper distribution; a draw that falls past the last
/// interval (sum below 1) is reported instead of silently defaulting.
pub fn select_outcome(name: &str, probs: &[f64], draw: f64, context: &str) -> SimResult<usize> {
    check_distribution(name, probs, context)?;
    let mut cumulative = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        cumulative += p;
        if draw < cumulative {
            return Ok(i);
        }
    }
    // Rounding within tolerance: the last non-zero outcome owns the remainder.
    probs
        .iter()
        .rposition(|&p| p > 0.0)
        .ok_or_else(|| SimError::DistributionSum {
            distribution: name.to_string(),
            sum: 0.0,
            context: context.to_string(),
        })
}

/// Select among competing events with independent-looking probabilities
/// where at most one event can occur; `None` means no event.
///
/// Fails when the event probabilities sum above 1.
pub fn select_competing(
    name: &str,
    probs: &[f64],
    draw: f64,
    context: &str,
) -> SimResult<Option<usize>> {
    let total: f64 = probs.iter().sum();
    if !total.is_finite() || total > 1.0 + DISTRIBUTION_TOLERANCE {
        return Err(SimError::DistributionSum {
            distribution: name.to_string(),
            sum: total,
            context: context.to_string(),
        });
    }
    let mut cumulative = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        if p < 0.0 {
            return Err(SimError::NumericDomain {
                operation: "select_competing",
                value: p,
            });
        }
        cumulative += p;
        if draw < cumulative {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_and_prob_are_inverse() {
        for &p in &[1e-9, 0.001, 0.25, 0.5, 0.9, 0.999_999] {
            let back = rate_to_prob(prob_to_rate(p).unwrap()).unwrap();
            assert!((back - p).abs() < 1e-12, "p={p} back={back}");
        }
    }

    #[test]
    fn logit_round_trip() {
        for &p in &[1e-6, 0.1, 0.5, 0.73, 0.999] {
            let back = logit_to_prob(prob_to_logit(p).unwrap()).unwrap();
            assert!((back - p).abs() < 1e-12);
        }
    }

    #[test]
    fn out_of_domain_inputs_fail() {
        assert!(prob_to_logit(0.0).is_err());
        assert!(prob_to_logit(1.0).is_err());
        assert!(prob_to_logit(-0.2).is_err());
        assert!(prob_to_logit(f64::NAN).is_err());
        assert!(rate_to_prob(-1e-3).is_err());
        assert!(prob_to_rate(-0.1).is_err());
        assert!(prob_to_rate(1.0).is_err());
        assert!(rate_ratio_to_prob(0.1, -2.0).is_err());
    }

    #[test]
    fn zero_weight_total_gives_zero_shares() {
        let shares = normalize_weights(&[0.0, 0.0, 0.0]).unwrap();
        assert_eq!(shares, vec![0.0, 0.0, 0.0]);
        assert!(normalize_weights(&[0.5, -0.1]).is_err());
    }

    #[test]
    fn select_outcome_rejects_bad_sums() {
        assert!(select_outcome("hvl", &[0.5, 0.4], 0.95, "cd4=0").is_err());
        assert_eq!(select_outcome("hvl", &[0.5, 0.5], 0.75, "cd4=0").unwrap(), 1);
        assert_eq!(select_outcome("hvl", &[0.0, 1.0, 0.0], 0.0, "cd4=0").unwrap(), 1);
    }

    #[test]
    fn select_competing_allows_no_event() {
        assert_eq!(select_competing("oi", &[0.1, 0.2], 0.5, "").unwrap(), None);
        assert_eq!(select_competing("oi", &[0.1, 0.2], 0.15, "").unwrap(), Some(1));
        assert!(select_competing("oi", &[0.7, 0.6], 0.1, "").is_err());
    }
}
