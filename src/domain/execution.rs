//! Trade execution with percentage fees and feasibility clipping.
//!
//! Buys are sized by a cash budget that already includes the fee; sells are
//! sized by share count and pay the fee out of the proceeds. A trade larger
//! than what the position can fund is clipped to the feasible maximum.

use super::position::{Asset, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => f.write_str("buy"),
            Side::Sell => f.write_str("sell"),
        }
    }
}

/// One executed fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trade {
    pub asset: Asset,
    pub side: Side,
    pub shares: f64,
    pub price: f64,
    /// shares * price
    pub gross: f64,
    pub fee: f64,
    /// The requested size exceeded what the position could fund.
    pub clipped: bool,
}

impl Trade {
    /// Signed cash impact: negative for buys, positive for sells.
    pub fn cash_flow(&self) -> f64 {
        match self.side {
            Side::Buy => -(self.gross + self.fee),
            Side::Sell => self.gross - self.fee,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExecutionResult {
    Filled(Trade),
    /// Nothing to trade: zero budget, zero holding or a non-positive price.
    Skipped,
}

/// fee = amount * rate_pct / 100
pub fn calculate_fee(amount: f64, fee_rate_pct: f64) -> f64 {
    amount * fee_rate_pct / 100.0
}

/// Spend up to `budget` cash (fee included) on `asset` at `price`.
pub fn buy(
    position: &mut Position,
    asset: Asset,
    price: f64,
    budget: f64,
    fee_rate_pct: f64,
) -> ExecutionResult {
    if price <= 0.0 || budget <= 0.0 || position.cash <= 0.0 {
        return ExecutionResult::Skipped;
    }

    let clipped = budget > position.cash;
    let spend = budget.min(position.cash);

    let shares = spend / (price * (1.0 + fee_rate_pct / 100.0));
    let gross = shares * price;
    let fee = spend - gross;

    position.cash = (position.cash - spend).max(0.0);
    *position.shares_mut(asset) += shares;

    ExecutionResult::Filled(Trade {
        asset,
        side: Side::Buy,
        shares,
        price,
        gross,
        fee,
        clipped,
    })
}

/// Sell up to `shares` of `asset` at `price`; proceeds net of fee go to cash.
pub fn sell(
    position: &mut Position,
    asset: Asset,
    price: f64,
    shares: f64,
    fee_rate_pct: f64,
) -> ExecutionResult {
    let held = position.shares(asset);
    if price <= 0.0 || shares <= 0.0 || held <= 0.0 {
        return ExecutionResult::Skipped;
    }

    let clipped = shares > held;
    let quantity = shares.min(held);

    let gross = quantity * price;
    let fee = calculate_fee(gross, fee_rate_pct);

    let remaining = position.shares_mut(asset);
    *remaining = (*remaining - quantity).max(0.0);
    position.cash += gross - fee;

    ExecutionResult::Filled(Trade {
        asset,
        side: Side::Sell,
        shares: quantity,
        price,
        gross,
        fee,
        clipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn filled(result: ExecutionResult) -> Trade {
        match result {
            ExecutionResult::Filled(trade) => trade,
            ExecutionResult::Skipped => panic!("expected a fill"),
        }
    }

    #[test]
    fn calculate_fee_basic() {
        assert_relative_eq!(calculate_fee(200_000.0, 0.015), 30.0);
        assert_eq!(calculate_fee(200_000.0, 0.0), 0.0);
    }

    #[test]
    fn buy_spends_budget_including_fee() {
        let mut pos = Position::new(1_000_000.0);
        let trade = filled(buy(&mut pos, Asset::Main, 100.0, 200_000.0, 0.015));

        assert_relative_eq!(trade.shares, 200_000.0 / 100.015, max_relative = 1e-12);
        assert_relative_eq!(trade.gross + trade.fee, 200_000.0, max_relative = 1e-12);
        assert_relative_eq!(trade.fee, trade.gross * 0.00015, max_relative = 1e-9);
        assert!(!trade.clipped);
        assert_relative_eq!(pos.cash, 800_000.0);
        assert_relative_eq!(pos.main_shares, trade.shares);
        assert_eq!(pos.inverse_shares, 0.0);
    }

    #[test]
    fn buy_without_fee() {
        let mut pos = Position::new(1_000.0);
        let trade = filled(buy(&mut pos, Asset::Inverse, 50.0, 500.0, 0.0));
        assert_relative_eq!(trade.shares, 10.0);
        assert_eq!(trade.fee, 0.0);
        assert_relative_eq!(pos.inverse_shares, 10.0);
    }

    #[test]
    fn buy_clips_to_available_cash() {
        let mut pos = Position::new(300.0);
        let trade = filled(buy(&mut pos, Asset::Main, 10.0, 500.0, 0.0));
        assert!(trade.clipped);
        assert_relative_eq!(trade.shares, 30.0);
        assert_eq!(pos.cash, 0.0);
    }

    #[test]
    fn buy_with_no_cash_is_skipped() {
        let mut pos = Position::new(0.0);
        assert_eq!(
            buy(&mut pos, Asset::Main, 10.0, 100.0, 0.0),
            ExecutionResult::Skipped
        );
    }

    #[test]
    fn buy_with_zero_budget_or_price_is_skipped() {
        let mut pos = Position::new(100.0);
        assert_eq!(
            buy(&mut pos, Asset::Main, 10.0, 0.0, 0.0),
            ExecutionResult::Skipped
        );
        assert_eq!(
            buy(&mut pos, Asset::Main, 0.0, 50.0, 0.0),
            ExecutionResult::Skipped
        );
        assert_eq!(pos.cash, 100.0);
    }

    #[test]
    fn sell_pays_fee_from_proceeds() {
        let mut pos = Position {
            cash: 0.0,
            main_shares: 100.0,
            inverse_shares: 0.0,
        };
        let trade = filled(sell(&mut pos, Asset::Main, 50.0, 20.0, 0.2));
        assert_relative_eq!(trade.gross, 1_000.0);
        assert_relative_eq!(trade.fee, 2.0);
        assert_relative_eq!(trade.cash_flow(), 998.0);
        assert_relative_eq!(pos.cash, 998.0);
        assert_relative_eq!(pos.main_shares, 80.0);
    }

    #[test]
    fn sell_clips_to_holding() {
        let mut pos = Position {
            cash: 0.0,
            main_shares: 0.0,
            inverse_shares: 5.0,
        };
        let trade = filled(sell(&mut pos, Asset::Inverse, 10.0, 8.0, 0.0));
        assert!(trade.clipped);
        assert_relative_eq!(trade.shares, 5.0);
        assert_eq!(pos.inverse_shares, 0.0);
        assert_relative_eq!(pos.cash, 50.0);
    }

    #[test]
    fn sell_without_holding_is_skipped() {
        let mut pos = Position::new(100.0);
        assert_eq!(
            sell(&mut pos, Asset::Main, 10.0, 1.0, 0.0),
            ExecutionResult::Skipped
        );
    }

    #[test]
    fn buy_cash_flow_is_negative_budget() {
        let mut pos = Position::new(1_000.0);
        let trade = filled(buy(&mut pos, Asset::Main, 10.0, 400.0, 0.5));
        assert_relative_eq!(trade.cash_flow(), -400.0, max_relative = 1e-12);
    }
}
