//! Dual-asset holdings owned by one engine run.

/// Which leg of the pair a trade touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Asset {
    Main,
    Inverse,
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Asset::Main => f.write_str("main"),
            Asset::Inverse => f.write_str("inverse"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub cash: f64,
    pub main_shares: f64,
    pub inverse_shares: f64,
}

impl Position {
    pub fn new(cash: f64) -> Self {
        Position {
            cash,
            main_shares: 0.0,
            inverse_shares: 0.0,
        }
    }

    pub fn shares(&self, asset: Asset) -> f64 {
        match asset {
            Asset::Main => self.main_shares,
            Asset::Inverse => self.inverse_shares,
        }
    }

    pub(crate) fn shares_mut(&mut self, asset: Asset) -> &mut f64 {
        match asset {
            Asset::Main => &mut self.main_shares,
            Asset::Inverse => &mut self.inverse_shares,
        }
    }

    pub fn market_value(&self, main_price: f64, inverse_price: f64) -> f64 {
        self.cash + self.main_shares * main_price + self.inverse_shares * inverse_price
    }

    /// Main asset's share of total value, 0 when the portfolio is worthless.
    pub fn main_weight(&self, main_price: f64, inverse_price: f64) -> f64 {
        let total = self.market_value(main_price, inverse_price);
        if total > 0.0 {
            self.main_shares * main_price / total
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Position {
        Position {
            cash: 500.0,
            main_shares: 10.0,
            inverse_shares: 5.0,
        }
    }

    #[test]
    fn new_position_is_all_cash() {
        let pos = Position::new(1_000.0);
        assert_eq!(pos.cash, 1_000.0);
        assert_eq!(pos.shares(Asset::Main), 0.0);
        assert_eq!(pos.shares(Asset::Inverse), 0.0);
    }

    #[test]
    fn market_value_prices_each_leg() {
        let pos = sample();
        assert!((pos.market_value(20.0, 40.0) - 900.0).abs() < f64::EPSILON);
    }

    #[test]
    fn main_weight() {
        let pos = sample();
        // 200 / 900
        assert!((pos.main_weight(20.0, 40.0) - 200.0 / 900.0).abs() < 1e-12);
        assert_eq!(Position::new(0.0).main_weight(10.0, 10.0), 0.0);
    }

    #[test]
    fn shares_mut_targets_leg() {
        let mut pos = sample();
        *pos.shares_mut(Asset::Inverse) += 1.0;
        assert_eq!(pos.inverse_shares, 6.0);
        assert_eq!(pos.main_shares, 10.0);
    }
}
