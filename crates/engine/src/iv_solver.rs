//! Implied volatility solver.
//!
//! Inverts Black-Scholes with Newton-Raphson (closed-form vega as the
//! derivative), falling back to bisection and then to an empirical
//! moneyness-based estimate. The solver never fails: invalid input or
//! non-convergence yields a low-confidence value instead of an error.

use std::f64::consts::{PI, SQRT_2};

use condor_core::{IvConfidence, OptionRight};
use parking_lot::Mutex;
use serde::Serialize;
use statrs::function::erf::erfc;

/// Annualised risk-free rate used when none is configured.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.045;

/// IV returned for inputs that cannot be solved at all.
const FALLBACK_IV: f64 = 0.20;

/// Newton steps abandoned below this vega.
const MIN_VEGA: f64 = 1e-10;

/// Convergence on the volatility update itself.
const IV_STEP_TOLERANCE: f64 = 1e-8;

/// Newton convergence within this many iterations is HIGH confidence.
const HIGH_CONFIDENCE_ITERATIONS: u32 = 10;

fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Inputs to a Black-Scholes valuation.
#[derive(Debug, Clone, Copy)]
pub struct BlackScholes {
    pub spot: f64,
    pub strike: f64,
    /// Years to expiry.
    pub time: f64,
    pub rate: f64,
    pub right: OptionRight,
}

impl BlackScholes {
    #[must_use]
    pub fn new(spot: f64, strike: f64, time: f64, rate: f64, right: OptionRight) -> Self {
        Self {
            spot,
            strike,
            time,
            rate,
            right,
        }
    }

    fn d1(&self, sigma: f64) -> f64 {
        ((self.spot / self.strike).ln() + (self.rate + 0.5 * sigma * sigma) * self.time)
            / (sigma * self.time.sqrt())
    }

    /// Theoretical price at volatility `sigma`.
    #[must_use]
    pub fn price(&self, sigma: f64) -> f64 {
        let d1 = self.d1(sigma);
        let d2 = d1 - sigma * self.time.sqrt();
        let discount = (-self.rate * self.time).exp();
        match self.right {
            OptionRight::Call => self.spot * norm_cdf(d1) - self.strike * discount * norm_cdf(d2),
            OptionRight::Put => self.strike * discount * norm_cdf(-d2) - self.spot * norm_cdf(-d1),
        }
    }

    /// dPrice/dSigma, per 1.00 of volatility.
    #[must_use]
    pub fn vega(&self, sigma: f64) -> f64 {
        self.spot * norm_pdf(self.d1(sigma)) * self.time.sqrt()
    }

    #[must_use]
    pub fn intrinsic(&self) -> f64 {
        match self.right {
            OptionRight::Call => (self.spot - self.strike).max(0.0),
            OptionRight::Put => (self.strike - self.spot).max(0.0),
        }
    }
}

/// Solver tuning.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Absolute price tolerance for convergence.
    pub tolerance: f64,
    pub max_iterations: u32,
    pub risk_free_rate: f64,
    /// Newton iterates are clamped to `[min_iv, max_iv]`.
    pub min_iv: f64,
    pub max_iv: f64,
    /// Bisection bracket.
    pub bisection_low: f64,
    pub bisection_high: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 100,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            min_iv: 0.01,
            max_iv: 5.0,
            bisection_low: 0.01,
            bisection_high: 3.0,
        }
    }
}

/// Path that produced an [`IvResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveMethod {
    NewtonRaphson,
    Bisection,
    /// Both numeric methods failed; moneyness-based estimate.
    Empirical,
    /// Inputs rejected before solving.
    Fallback,
}

impl SolveMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewtonRaphson => "newton_raphson",
            Self::Bisection => "bisection",
            Self::Empirical => "empirical",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for SolveMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IvResult {
    pub iv: f64,
    pub converged: bool,
    pub iterations: u32,
    /// `|model price - observed price|` at the returned IV.
    pub price_error: f64,
    pub method: SolveMethod,
    pub confidence: IvConfidence,
}

impl IvResult {
    fn fallback() -> Self {
        Self {
            iv: FALLBACK_IV,
            converged: false,
            iterations: 0,
            price_error: f64::NAN,
            method: SolveMethod::Fallback,
            confidence: IvConfidence::Low,
        }
    }
}

/// Lifetime call counters for one solver instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SolverStats {
    pub total_calls: u64,
    pub newton_successes: u64,
    pub bisection_successes: u64,
    pub empirical_fallbacks: u64,
    pub invalid_inputs: u64,
}

impl SolverStats {
    /// Fraction of calls solved numerically.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        (self.newton_successes + self.bisection_successes) as f64 / self.total_calls as f64
    }
}

/// Implied-volatility solver. Owns its statistics; share by reference.
#[derive(Debug, Default)]
pub struct IvSolver {
    config: SolverConfig,
    stats: Mutex<SolverStats>,
}

impl IvSolver {
    #[must_use]
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            stats: Mutex::new(SolverStats::default()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Snapshot of the lifetime counters.
    #[must_use]
    pub fn stats(&self) -> SolverStats {
        *self.stats.lock()
    }

    /// Solves for the volatility that reprices `option_price`.
    ///
    /// Never fails; see [`IvResult::confidence`] for how far to trust the answer.
    pub fn solve(
        &self,
        option_price: f64,
        spot: f64,
        strike: f64,
        time_to_expiry_years: f64,
        right: OptionRight,
    ) -> IvResult {
        self.stats.lock().total_calls += 1;

        let inputs = [option_price, spot, strike, time_to_expiry_years];
        if inputs.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            self.stats.lock().invalid_inputs += 1;
            tracing::debug!(option_price, spot, strike, time_to_expiry_years, "IV input rejected");
            return IvResult::fallback();
        }

        let model = BlackScholes::new(
            spot,
            strike,
            time_to_expiry_years,
            self.config.risk_free_rate,
            right,
        );
        if option_price < model.intrinsic() * 0.99 {
            self.stats.lock().invalid_inputs += 1;
            tracing::debug!(
                option_price,
                intrinsic = model.intrinsic(),
                "IV input below intrinsic value"
            );
            return IvResult::fallback();
        }

        let newton = self.newton_raphson(&model, option_price);
        if newton.converged {
            self.stats.lock().newton_successes += 1;
            return newton;
        }

        let bisection = self.bisection(&model, option_price);
        if bisection.converged {
            self.stats.lock().bisection_successes += 1;
            return bisection;
        }

        self.stats.lock().empirical_fallbacks += 1;
        let iv = empirical_estimate(spot, strike, time_to_expiry_years, right);
        tracing::debug!(
            option_price,
            spot,
            strike,
            iv,
            "IV solver did not converge, using empirical estimate"
        );
        IvResult {
            iv,
            converged: false,
            iterations: newton.iterations + bisection.iterations,
            price_error: (model.price(iv) - option_price).abs(),
            method: SolveMethod::Empirical,
            confidence: IvConfidence::Low,
        }
    }

    fn newton_raphson(&self, model: &BlackScholes, target: f64) -> IvResult {
        let cfg = &self.config;
        let mut sigma = initial_guess(model, target).clamp(cfg.min_iv, cfg.max_iv);
        let mut price_error = f64::INFINITY;

        let converged = |iv: f64, iterations: u32, price_error: f64| IvResult {
            iv,
            converged: true,
            iterations,
            price_error,
            method: SolveMethod::NewtonRaphson,
            confidence: if iterations <= HIGH_CONFIDENCE_ITERATIONS {
                IvConfidence::High
            } else {
                IvConfidence::Medium
            },
        };
        let unconverged = |iv: f64, iterations: u32, price_error: f64| IvResult {
            iv,
            converged: false,
            iterations,
            price_error,
            method: SolveMethod::NewtonRaphson,
            confidence: IvConfidence::Low,
        };

        for iteration in 1..=cfg.max_iterations {
            let diff = model.price(sigma) - target;
            price_error = diff.abs();
            if price_error < cfg.tolerance {
                return converged(sigma, iteration, price_error);
            }

            let vega = model.vega(sigma);
            if vega.abs() < MIN_VEGA {
                return unconverged(sigma, iteration, price_error);
            }

            let next = (sigma - diff / vega).clamp(cfg.min_iv, cfg.max_iv);
            if (next - sigma).abs() < IV_STEP_TOLERANCE {
                // Pinned at a clamp bound: the root is outside the search range.
                if next <= cfg.min_iv || next >= cfg.max_iv {
                    return unconverged(next, iteration, price_error);
                }
                let final_error = (model.price(next) - target).abs();
                return converged(next, iteration, final_error);
            }
            sigma = next;
        }

        unconverged(sigma, cfg.max_iterations, price_error)
    }

    fn bisection(&self, model: &BlackScholes, target: f64) -> IvResult {
        let cfg = &self.config;
        let (mut low, mut high) = (cfg.bisection_low, cfg.bisection_high);
        let mut f_low = model.price(low) - target;
        let f_high = model.price(high) - target;

        let result = |iv: f64, converged: bool, iterations: u32, price_error: f64| IvResult {
            iv,
            converged,
            iterations,
            price_error,
            method: SolveMethod::Bisection,
            confidence: if converged {
                IvConfidence::Medium
            } else {
                IvConfidence::Low
            },
        };

        if f_low * f_high > 0.0 {
            let (iv, err) = if f_low.abs() < f_high.abs() {
                (low, f_low.abs())
            } else {
                (high, f_high.abs())
            };
            return result(iv, err < cfg.tolerance, 0, err);
        }

        let mut mid = 0.5 * (low + high);
        let mut f_mid = model.price(mid) - target;
        for iteration in 1..=cfg.max_iterations {
            mid = 0.5 * (low + high);
            f_mid = model.price(mid) - target;
            if f_mid.abs() < cfg.tolerance || 0.5 * (high - low) < IV_STEP_TOLERANCE {
                return result(mid, true, iteration, f_mid.abs());
            }
            if f_mid * f_low < 0.0 {
                high = mid;
            } else {
                low = mid;
                f_low = f_mid;
            }
        }

        result(mid, false, cfg.max_iterations, f_mid.abs())
    }
}

/// Brenner-Subrahmanyam ATM estimate, raised to the Manaster-Koehler point
/// `sqrt(2|ln(F/K)| / T)` for options away from the money.
fn initial_guess(model: &BlackScholes, price: f64) -> f64 {
    let atm = (2.0 * PI / model.time).sqrt() * price / model.spot;
    let log_moneyness = ((model.spot / model.strike).ln() + model.rate * model.time).abs();
    let moneyness_point = (2.0 * log_moneyness / model.time).sqrt();
    atm.max(moneyness_point)
}

/// Heuristic IV from moneyness and tenor, for when no numeric solve succeeds.
#[must_use]
pub fn empirical_estimate(spot: f64, strike: f64, time_to_expiry_years: f64, right: OptionRight) -> f64 {
    const BASE: f64 = 0.18;

    let moneyness = strike / spot;
    // OTM puts carry the steeper skew.
    let skew = match right {
        OptionRight::Put if moneyness < 1.0 => (1.0 - moneyness) * 2.0,
        OptionRight::Call if moneyness > 1.0 => (moneyness - 1.0) * 0.5,
        _ => 0.0,
    };
    let days = time_to_expiry_years * 365.0;
    let time_adjustment = if days < 7.0 {
        0.05
    } else if days < 30.0 {
        0.02
    } else if days > 180.0 {
        -0.02
    } else {
        0.0
    };

    (BASE + skew + time_adjustment).clamp(0.10, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solver() -> IvSolver {
        IvSolver::default()
    }

    #[test]
    fn put_call_parity_holds() {
        let call = BlackScholes::new(100.0, 95.0, 0.5, 0.03, OptionRight::Call);
        let put = BlackScholes::new(100.0, 95.0, 0.5, 0.03, OptionRight::Put);
        let sigma = 0.25;
        let parity = call.price(sigma) - put.price(sigma);
        let expected = 100.0 - 95.0 * (-0.03_f64 * 0.5).exp();
        assert!((parity - expected).abs() < 1e-9);
    }

    #[test]
    fn vega_matches_finite_difference() {
        let model = BlackScholes::new(5800.0, 5750.0, 45.0 / 365.0, 0.045, OptionRight::Put);
        let h = 1e-5;
        let numeric = (model.price(0.15 + h) - model.price(0.15 - h)) / (2.0 * h);
        assert!((model.vega(0.15) - numeric).abs() / numeric < 1e-5);
    }

    #[test]
    fn round_trip_recovers_volatility() {
        let s = solver();
        let cases = [
            (100.0, 100.0, 0.25, 0.20, OptionRight::Call),
            (100.0, 90.0, 0.5, 0.35, OptionRight::Put),
            (100.0, 110.0, 1.0, 0.60, OptionRight::Call),
            (450.0, 440.0, 30.0 / 365.0, 0.15, OptionRight::Put),
            (100.0, 100.0, 2.0, 1.50, OptionRight::Put),
        ];
        for (spot, strike, t, iv, right) in cases {
            let price = BlackScholes::new(spot, strike, t, DEFAULT_RISK_FREE_RATE, right).price(iv);
            let result = s.solve(price, spot, strike, t, right);
            assert!(result.converged, "did not converge for {spot}/{strike}/{t}/{iv}");
            assert!(
                (result.iv - iv).abs() < 1e-4,
                "recovered {} expected {iv}",
                result.iv
            );
        }
    }

    #[test]
    fn spx_put_reprices_within_a_cent() {
        let s = solver();
        let t = 45.0 / 365.0;
        let result = s.solve(50.0, 5800.0, 5750.0, t, OptionRight::Put);
        assert!(result.converged);
        let repriced =
            BlackScholes::new(5800.0, 5750.0, t, DEFAULT_RISK_FREE_RATE, OptionRight::Put)
                .price(result.iv);
        assert!((repriced - 50.0).abs() < 0.01);
        assert!(matches!(
            result.method,
            SolveMethod::NewtonRaphson | SolveMethod::Bisection
        ));
    }

    #[test]
    fn invalid_inputs_short_circuit_to_fallback() {
        let s = solver();
        for (price, spot, strike, t) in [
            (0.0, 100.0, 100.0, 0.5),
            (5.0, -1.0, 100.0, 0.5),
            (5.0, 100.0, 0.0, 0.5),
            (5.0, 100.0, 100.0, 0.0),
            (f64::NAN, 100.0, 100.0, 0.5),
        ] {
            let result = s.solve(price, spot, strike, t, OptionRight::Call);
            assert_eq!(result.method, SolveMethod::Fallback);
            assert!(!result.converged);
            assert!((result.iv - 0.20).abs() < f64::EPSILON);
            assert_eq!(result.confidence, IvConfidence::Low);
        }
        assert_eq!(s.stats().invalid_inputs, 5);
    }

    #[test]
    fn price_below_intrinsic_is_rejected() {
        let s = solver();
        // Call 20 ITM priced at 10.
        let result = s.solve(10.0, 120.0, 100.0, 0.5, OptionRight::Call);
        assert_eq!(result.method, SolveMethod::Fallback);
    }

    #[test]
    fn price_within_intrinsic_tolerance_is_solved() {
        let s = solver();
        let model = BlackScholes::new(120.0, 100.0, 0.1, DEFAULT_RISK_FREE_RATE, OptionRight::Call);
        let price = model.price(0.30);
        let result = s.solve(price, 120.0, 100.0, 0.1, OptionRight::Call);
        assert_ne!(result.method, SolveMethod::Fallback);
    }

    #[test]
    fn unsolvable_price_uses_empirical_estimate() {
        let s = solver();
        // A call can never be worth more than the underlying.
        let result = s.solve(150.0, 100.0, 100.0, 0.5, OptionRight::Call);
        assert!(!result.converged);
        assert_eq!(result.method, SolveMethod::Empirical);
        assert_eq!(result.confidence, IvConfidence::Low);
        assert!((0.10..=1.0).contains(&result.iv));
        assert_eq!(s.stats().empirical_fallbacks, 1);
    }

    #[test]
    fn fast_newton_convergence_is_high_confidence() {
        let s = solver();
        let model = BlackScholes::new(100.0, 100.0, 0.5, DEFAULT_RISK_FREE_RATE, OptionRight::Call);
        let result = s.solve(model.price(0.25), 100.0, 100.0, 0.5, OptionRight::Call);
        assert_eq!(result.method, SolveMethod::NewtonRaphson);
        assert!(result.iterations <= 10);
        assert_eq!(result.confidence, IvConfidence::High);
    }

    #[test]
    fn stats_accumulate_per_instance() {
        let a = solver();
        let b = solver();
        let model = BlackScholes::new(100.0, 100.0, 0.5, DEFAULT_RISK_FREE_RATE, OptionRight::Call);
        a.solve(model.price(0.3), 100.0, 100.0, 0.5, OptionRight::Call);
        a.solve(model.price(0.4), 100.0, 100.0, 0.5, OptionRight::Call);

        assert_eq!(a.stats().total_calls, 2);
        assert_eq!(a.stats().newton_successes, 2);
        assert!((a.stats().success_rate() - 1.0).abs() < f64::EPSILON);
        assert_eq!(b.stats(), SolverStats::default());
    }

    #[test]
    fn empirical_estimate_is_clamped_and_skewed() {
        let otm_put = empirical_estimate(100.0, 80.0, 0.25, OptionRight::Put);
        let atm_put = empirical_estimate(100.0, 100.0, 0.25, OptionRight::Put);
        assert!(otm_put > atm_put);
        let extreme = empirical_estimate(100.0, 1.0, 0.001, OptionRight::Put);
        assert!((extreme - 1.0).abs() < f64::EPSILON);
        let long_dated = empirical_estimate(100.0, 100.0, 1.0, OptionRight::Call);
        assert!(long_dated >= 0.10);
    }
}
