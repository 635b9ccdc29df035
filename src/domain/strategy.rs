//! Rebalancing strategy parameters and trigger rules.
//!
//! All ratios are percentages in `[0, 100]`; fee rates are non-negative
//! percentages (0.015 means 0.015%).

use super::error::KrxError;

/// Condition that decides, bar by bar, which way the portfolio leans.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerRule {
    /// Compare close with the previous close. A fall of at least
    /// `threshold_pct` buys main / sells inverse; a rise of at least
    /// `threshold_pct` sells main / buys inverse.
    PriceMove { threshold_pct: f64 },
    /// Compare the main asset's weight with a target band. Overweight sells
    /// main / buys inverse; underweight buys main / sells inverse.
    Drift {
        target_main_weight_pct: f64,
        band_pct: f64,
    },
}

impl Default for TriggerRule {
    fn default() -> Self {
        TriggerRule::PriceMove { threshold_pct: 0.0 }
    }
}

/// How the inverse leg is priced on each bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InversePricing {
    /// Inverse shares trade and are valued at the bar's close.
    #[default]
    BarClose,
    /// -1x daily proxy: starts at the first close and moves by the negated
    /// close-to-close return of each bar, floored at zero.
    NegatedReturn,
}

impl InversePricing {
    /// Inverse price for a bar, given the previous inverse price and the
    /// close-to-close `change` (`None` on the first bar).
    pub fn price(&self, close: f64, previous: f64, change: Option<f64>) -> f64 {
        match (self, change) {
            (InversePricing::BarClose, _) | (InversePricing::NegatedReturn, None) => close,
            (InversePricing::NegatedReturn, Some(change)) => (previous * (1.0 - change)).max(0.0),
        }
    }
}

impl std::str::FromStr for InversePricing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "close" => Ok(InversePricing::BarClose),
            "proxy" => Ok(InversePricing::NegatedReturn),
            other => Err(format!(
                "unknown inverse pricing '{}' (expected close or proxy)",
                other
            )),
        }
    }
}

/// Direction a trigger fired in on one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Main asset is cheap (or underweight): buy main, sell inverse.
    LeanMain,
    /// Main asset is rich (or overweight): sell main, buy inverse.
    LeanInverse,
    Hold,
}

impl TriggerRule {
    /// Evaluate the rule for one bar.
    ///
    /// `change` is the close-to-close return as a fraction; `main_weight` is
    /// the main asset's share of portfolio value (0..=1) at the bar's close.
    pub fn evaluate(&self, change: f64, main_weight: f64) -> Signal {
        match *self {
            TriggerRule::PriceMove { threshold_pct } => {
                let threshold = threshold_pct / 100.0;
                if change < 0.0 && -change >= threshold {
                    Signal::LeanMain
                } else if change > 0.0 && change >= threshold {
                    Signal::LeanInverse
                } else {
                    Signal::Hold
                }
            }
            TriggerRule::Drift {
                target_main_weight_pct,
                band_pct,
            } => {
                let weight_pct = main_weight * 100.0;
                if weight_pct > target_main_weight_pct + band_pct {
                    Signal::LeanInverse
                } else if weight_pct < target_main_weight_pct - band_pct {
                    Signal::LeanMain
                } else {
                    Signal::Hold
                }
            }
        }
    }

    fn validate(&self) -> Result<(), KrxError> {
        match *self {
            TriggerRule::PriceMove { threshold_pct } => {
                check_non_negative("trigger_threshold", threshold_pct)
            }
            TriggerRule::Drift {
                target_main_weight_pct,
                band_pct,
            } => {
                check_ratio("target_main_weight", target_main_weight_pct)?;
                check_ratio("drift_band", band_pct)
            }
        }
    }
}

/// Named, validated strategy parameters for one backtest run.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub initial_capital: f64,
    pub initial_entry_ratio: f64,
    pub main_buy_ratio: f64,
    pub main_sell_ratio: f64,
    pub inverse_buy_ratio: f64,
    pub inverse_sell_ratio: f64,
    pub buy_fee_rate: f64,
    pub sell_fee_rate: f64,
    pub use_initial_entry: bool,
    pub trigger: TriggerRule,
    pub inverse_pricing: InversePricing,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            initial_capital: 100_000_000.0,
            initial_entry_ratio: 20.0,
            main_buy_ratio: 20.0,
            main_sell_ratio: 20.0,
            inverse_buy_ratio: 20.0,
            inverse_sell_ratio: 20.0,
            buy_fee_rate: 0.015,
            sell_fee_rate: 0.2,
            use_initial_entry: true,
            trigger: TriggerRule::default(),
            inverse_pricing: InversePricing::default(),
        }
    }
}

impl StrategyConfig {
    /// Build a config and validate it. `use_initial_entry` follows
    /// `initial_entry_ratio > 0`; override the field afterwards if needed.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        initial_capital: f64,
        initial_entry_ratio: f64,
        main_buy_ratio: f64,
        main_sell_ratio: f64,
        inverse_buy_ratio: f64,
        inverse_sell_ratio: f64,
        buy_fee_rate: f64,
        sell_fee_rate: f64,
    ) -> Result<Self, KrxError> {
        let config = StrategyConfig {
            initial_capital,
            initial_entry_ratio,
            main_buy_ratio,
            main_sell_ratio,
            inverse_buy_ratio,
            inverse_sell_ratio,
            buy_fee_rate,
            sell_fee_rate,
            use_initial_entry: initial_entry_ratio > 0.0,
            trigger: TriggerRule::default(),
            inverse_pricing: InversePricing::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_trigger(mut self, trigger: TriggerRule) -> Result<Self, KrxError> {
        self.trigger = trigger;
        self.validate()?;
        Ok(self)
    }

    pub fn with_inverse_pricing(mut self, pricing: InversePricing) -> Self {
        self.inverse_pricing = pricing;
        self
    }

    pub fn validate(&self) -> Result<(), KrxError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(KrxError::invalid_config(
                "initial_capital",
                "must be a positive number",
            ));
        }
        check_ratio("initial_entry_ratio", self.initial_entry_ratio)?;
        check_ratio("main_buy_ratio", self.main_buy_ratio)?;
        check_ratio("main_sell_ratio", self.main_sell_ratio)?;
        check_ratio("inverse_buy_ratio", self.inverse_buy_ratio)?;
        check_ratio("inverse_sell_ratio", self.inverse_sell_ratio)?;
        check_non_negative("buy_fee_rate", self.buy_fee_rate)?;
        check_non_negative("sell_fee_rate", self.sell_fee_rate)?;
        self.trigger.validate()
    }
}

fn check_ratio(field: &str, value: f64) -> Result<(), KrxError> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(KrxError::invalid_config(field, "must be within [0, 100]"));
    }
    Ok(())
}

fn check_non_negative(field: &str, value: f64) -> Result<(), KrxError> {
    if !value.is_finite() || value < 0.0 {
        return Err(KrxError::invalid_config(field, "must be non-negative"));
    }
    Ok(())
}
