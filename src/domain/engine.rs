//! Value-averaging engine.
//!
//! A [`ValueAveraging`] owns the ledger state of one asset and turns each
//! incoming [`Bar`] into exactly one [`Record`]:
//!
//! 1. compute the record from the bar and the carried totals,
//! 2. append it to the [`RecordStore`],
//! 3. only then advance the interval and replace the carried totals.
//!
//! A failure at any step leaves the ledger untouched, so the same bar can be
//! retried at the same interval.
//!
//! The first interval (bootstrap) targets the principal itself. Every later
//! interval (steady state) targets [`schedule::target`] and trades the gap
//! between that target and the market value of the carried position.

use crate::domain::asset::AssetId;
use crate::domain::config::StrategyConfig;
use crate::domain::error::VatraderError;
use crate::domain::record::{Bar, Record};
use crate::domain::rounding::round;
use crate::domain::schedule;
use crate::ports::record_port::RecordStore;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Which transition the next bar will take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Bootstrap,
    SteadyState,
}

/// Carried ledger state. Only ever replaced wholesale from a persisted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerState {
    /// Interval the next record will carry.
    pub interval: u32,
    pub total_order_size: Decimal,
    pub total_trade_amount: Decimal,
    /// Timestamp of the last persisted record.
    pub last_date: Option<DateTime<Utc>>,
}

impl LedgerState {
    fn fresh(starting_interval: u32, config: &StrategyConfig) -> Self {
        Self {
            interval: starting_interval,
            total_order_size: round(Decimal::ZERO, config.base_precision),
            total_trade_amount: round(Decimal::ZERO, config.quote_precision),
            last_date: None,
        }
    }

    fn after(record: &Record) -> Result<Self, VatraderError> {
        let interval = record.interval.checked_add(1).ok_or_else(|| VatraderError::LedgerState {
            reason: "interval counter exhausted".into(),
        })?;
        Ok(Self {
            interval,
            total_order_size: record.total_order_size,
            total_trade_amount: record.total_trade_amount,
            last_date: Some(record.date),
        })
    }
}

pub struct ValueAveraging<'a> {
    asset: AssetId,
    config: StrategyConfig,
    state: LedgerState,
    store: &'a dyn RecordStore,
}

impl<'a> ValueAveraging<'a> {
    /// Start a fresh ledger at `config.starting_interval` with no holdings.
    ///
    /// The principal is held at quote precision from here on.
    pub fn initialize(
        asset: AssetId,
        config: StrategyConfig,
        store: &'a dyn RecordStore,
    ) -> Result<Self, VatraderError> {
        config.validate()?;
        let config = StrategyConfig {
            principal_amount: round(config.principal_amount, config.quote_precision),
            ..config
        };
        let state = LedgerState::fresh(config.starting_interval, &config);
        tracing::debug!(
            asset = %asset,
            principal = %config.principal_amount,
            rate = %config.interest_rate,
            frequency = config.frequency,
            "initialized ledger"
        );
        Ok(Self {
            asset,
            config,
            state,
            store,
        })
    }

    /// Rebuild the ledger from the latest record in `store`, or start fresh if
    /// the asset has no history.
    pub fn resume(
        asset: AssetId,
        config: StrategyConfig,
        store: &'a dyn RecordStore,
    ) -> Result<Self, VatraderError> {
        let mut engine = Self::initialize(asset, config, store)?;
        if let Some(last) = store.latest(&engine.asset)? {
            engine.state = LedgerState::after(&last)?;
            tracing::info!(
                asset = %engine.asset,
                interval = engine.state.interval,
                total_order_size = %engine.state.total_order_size,
                total_trade_amount = %engine.state.total_trade_amount,
                "resumed ledger from store"
            );
        }
        Ok(engine)
    }

    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn interval(&self) -> u32 {
        self.state.interval
    }

    pub fn next_transition(&self) -> Transition {
        if self.state.interval == 1 {
            Transition::Bootstrap
        } else {
            Transition::SteadyState
        }
    }

    /// Target amount for `interval`, rounded to quote precision. Interval 1
    /// is the principal.
    pub fn get_target(&self, interval: u32) -> Result<Decimal, VatraderError> {
        let amount = if interval <= 1 {
            self.config.principal_amount
        } else {
            schedule::target(
                interval,
                self.config.principal_amount,
                self.config.interest_rate,
                self.config.frequency,
            )?
        };
        Ok(round(amount, self.config.quote_precision))
    }

    /// The record the next bar would produce. Pure: nothing is persisted and
    /// the ledger does not move.
    pub fn compute(&self, price: Decimal, timestamp: DateTime<Utc>) -> Result<Record, VatraderError> {
        if price <= Decimal::ZERO {
            return Err(VatraderError::arithmetic(format!(
                "market price must be positive, got {price}"
            )));
        }

        let quote = self.config.quote_precision;
        let base = self.config.base_precision;

        let market_price = round(price, quote);
        if market_price.is_zero() {
            return Err(VatraderError::arithmetic(format!(
                "market price {price} rounds to zero at {quote} decimal places"
            )));
        }

        let interval = self.state.interval;
        let current_target = self.get_target(interval)?;
        let current_value = round(
            checked(market_price.checked_mul(self.state.total_order_size), "current value")?,
            quote,
        );
        let trade_amount = round(
            checked(current_target.checked_sub(current_value), "trade amount")?,
            quote,
        );
        let order_size = round(
            checked(trade_amount.checked_div(market_price), "order size")?,
            base,
        );
        let total_order_size = round(
            checked(self.state.total_order_size.checked_add(order_size), "total order size")?,
            base,
        );
        let total_trade_amount = round(
            checked(
                self.state.total_trade_amount.checked_add(trade_amount),
                "total trade amount",
            )?,
            quote,
        );

        Ok(Record {
            exchange: self.config.exchange.clone(),
            date: timestamp,
            market_price,
            current_target,
            current_value,
            trade_amount,
            total_trade_amount,
            order_size,
            total_order_size,
            interval,
        })
    }

    /// First-interval transition. Fails once the ledger is past interval 1.
    pub fn bootstrap(&mut self, bar: &Bar) -> Result<Record, VatraderError> {
        if self.next_transition() != Transition::Bootstrap {
            return Err(VatraderError::LedgerState {
                reason: format!(
                    "ledger for {} is already at interval {}",
                    self.asset, self.state.interval
                ),
            });
        }
        self.commit(bar)
    }

    /// Steady-state transition. Fails on a ledger still awaiting bootstrap.
    pub fn step(&mut self, bar: &Bar) -> Result<Record, VatraderError> {
        if self.next_transition() != Transition::SteadyState {
            return Err(VatraderError::LedgerState {
                reason: format!("ledger for {} has not been bootstrapped", self.asset),
            });
        }
        self.commit(bar)
    }

    /// Take whichever transition the ledger is due for.
    pub fn process_bar(&mut self, bar: &Bar) -> Result<Record, VatraderError> {
        match self.next_transition() {
            Transition::Bootstrap => self.bootstrap(bar),
            Transition::SteadyState => self.step(bar),
        }
    }

    fn commit(&mut self, bar: &Bar) -> Result<Record, VatraderError> {
        let record = self.compute(bar.price, bar.timestamp)?;
        let next = LedgerState::after(&record)?;

        if let Err(e) = self.store.append(&self.asset, &record) {
            tracing::error!(
                asset = %self.asset,
                interval = record.interval,
                error = %e,
                "failed to save record"
            );
            return Err(VatraderError::Persistence {
                interval: record.interval,
                reason: e.to_string(),
            });
        }

        tracing::info!(
            asset = %self.asset,
            interval = record.interval,
            price = %record.market_price,
            trade_amount = %record.trade_amount,
            order_size = %record.order_size,
            "saved record"
        );
        self.state = next;
        Ok(record)
    }
}

fn checked(value: Option<Decimal>, what: &str) -> Result<Decimal, VatraderError> {
    value.ok_or_else(|| VatraderError::arithmetic(format!("{what} overflowed")))
}
