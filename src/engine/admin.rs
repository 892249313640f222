//! Controller operations: symbol lifecycle, parameters, protocol fee.

use super::core::Pool;
use super::pricing::quote_symbol;
use super::results::PoolError;
use crate::events::{
    CloseOnlyToggledEvent, EventPayload, ProtocolFeeCollectedEvent, SymbolAddedEvent, SymbolParametersUpdatedEvent,
    SymbolRemovedEvent,
};
use crate::symbol::{SymbolParams, SymbolSpec};
use crate::types::{AccountId, BTokenId, SymbolId};
use rust_decimal::Decimal;

impl Pool {
    /// Registers a symbol priced from the oracle at its future id. Vacated ids are reused.
    pub fn add_symbol(&mut self, caller: AccountId, spec: SymbolSpec) -> Result<SymbolId, PoolError> {
        self.check("add_symbol", self.ensure_controller(caller, "add_symbol"))?;
        self.check("add_symbol", spec.validate())?;

        let symbol_id = self.state.symbols.next_id();
        let quote = self.check(
            "add_symbol",
            quote_symbol(&self.collaborators, symbol_id, spec.kind).map_err(PoolError::from),
        )?;

        self.transact("add_symbol", |s| {
            let reused_slot = s.state.symbols.has_vacancy();
            let name = spec.name.clone();
            let id = s.state.symbols.add(spec, quote, s.now)?;
            s.emit(EventPayload::SymbolAdded(SymbolAddedEvent {
                symbol_id: id,
                name,
                price: quote.mark,
                reused_slot,
            }));
            Ok(id)
        })
    }

    pub fn remove_symbol(&mut self, caller: AccountId, symbol_id: SymbolId) -> Result<(), PoolError> {
        self.check("remove_symbol", self.ensure_controller(caller, "remove_symbol"))?;

        self.transact("remove_symbol", |s| {
            let symbol = s.state.symbols.remove(symbol_id)?;
            s.emit(EventPayload::SymbolRemoved(SymbolRemovedEvent {
                symbol_id,
                name: symbol.name,
            }));
            Ok(())
        })
    }

    /// Flips close-only and returns the new flag.
    pub fn toggle_close_only(&mut self, caller: AccountId, symbol_id: SymbolId) -> Result<bool, PoolError> {
        self.check("toggle_close_only", self.ensure_controller(caller, "toggle_close_only"))?;

        self.transact("toggle_close_only", |s| {
            let symbol = s.state.symbols.get_mut(symbol_id)?;
            symbol.close_only = !symbol.close_only;
            let close_only = symbol.close_only;
            s.emit(EventPayload::CloseOnlyToggled(CloseOnlyToggledEvent {
                symbol_id,
                close_only,
            }));
            Ok(close_only)
        })
    }

    /// New fee and funding parameters. funding up to now accrues under the old ones.
    pub fn set_symbol_parameters(
        &mut self,
        caller: AccountId,
        symbol_id: SymbolId,
        params: SymbolParams,
    ) -> Result<(), PoolError> {
        self.check("set_symbol_parameters", self.ensure_controller(caller, "set_symbol_parameters"))?;

        self.transact_quoted("set_symbol_parameters", |s| {
            params.validate()?;
            s.state.symbols.get_mut(symbol_id)?.apply_params(params);
            s.emit(EventPayload::SymbolParametersUpdated(SymbolParametersUpdatedEvent {
                symbol_id,
                fee_ratio: params.fee_ratio,
                funding_coefficient: params.funding_coefficient,
                premium_funding_coefficient: params.premium_funding_coefficient,
            }));
            Ok(())
        })
    }

    /// Pays uncollected protocol fees to the configured collector, as far as the base
    /// vault backs them. The rest stays uncollected.
    pub fn collect_protocol_fee(&mut self) -> Result<Decimal, PoolError> {
        let collector = self.protocol_fee_collector;

        self.transact("collect_protocol_fee", |s| {
            let amount = s
                .state
                .protocol_fee
                .uncollected
                .min(s.state.vault.balance(BTokenId::BASE))
                .max(Decimal::ZERO);
            if amount > Decimal::ZERO {
                s.state.vault.withdraw(BTokenId::BASE, amount)?;
            }
            s.state.protocol_fee.collected += amount;
            s.state.protocol_fee.uncollected -= amount;

            s.emit(EventPayload::ProtocolFeeCollected(ProtocolFeeCollectedEvent {
                collector,
                amount,
                total_collected: s.state.protocol_fee.collected,
            }));
            Ok(amount)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CollaboratorError;
    use crate::engine::testing::{Fixture, BTCUSD, CONTROLLER, TRADER, USDT};
    use rust_decimal_macros::dec;

    fn ethusd() -> SymbolSpec {
        SymbolSpec::futures("ETHUSD", dec!(0.001), dec!(0.0002), dec!(0.00002))
    }

    #[test]
    fn symbol_ids_reused_after_removal() {
        let mut fx = Fixture::new();
        fx.set_price(SymbolId(1), dec!(2000));
        let eth = fx.pool.add_symbol(CONTROLLER, ethusd()).unwrap();
        assert_eq!(eth, SymbolId(1));

        fx.pool.remove_symbol(CONTROLLER, BTCUSD).unwrap();
        assert_eq!(fx.pool.get_symbol(BTCUSD), Err(PoolError::InvalidSymbolId(BTCUSD)));

        fx.set_price(SymbolId(0), dec!(150));
        let sol = fx
            .pool
            .add_symbol(CONTROLLER, SymbolSpec::futures("SOLUSD", dec!(0.1), dec!(0.0002), dec!(0.00002)))
            .unwrap();
        assert_eq!(sol, SymbolId(0));
        assert_eq!(fx.pool.get_symbol(sol).unwrap().name, "SOLUSD");
        assert!(matches!(
            &fx.pool.events().last().unwrap().payload,
            EventPayload::SymbolAdded(SymbolAddedEvent { reused_slot: true, .. })
        ));
    }

    #[test]
    fn cannot_remove_held_symbol() {
        let mut fx = Fixture::new();
        fx.fund_trader_base(dec!(1000));
        fx.pool.trade(TRADER, BTCUSD, dec!(10)).unwrap();
        assert_eq!(
            fx.pool.remove_symbol(CONTROLLER, BTCUSD),
            Err(PoolError::PositionHoldersExist {
                symbol_id: BTCUSD,
                holders: 1,
            })
        );
        assert_eq!(
            fx.pool.remove_symbol(CONTROLLER, SymbolId(5)),
            Err(PoolError::InvalidSymbolId(SymbolId(5)))
        );
    }

    #[test]
    fn admin_requires_controller() {
        let mut fx = Fixture::new();
        assert!(matches!(
            fx.pool.toggle_close_only(TRADER, BTCUSD),
            Err(PoolError::Unauthorized { action: "toggle_close_only", .. })
        ));
        assert!(fx.pool.remove_symbol(TRADER, BTCUSD).is_err());
        assert!(fx.pool.add_symbol(TRADER, ethusd()).is_err());
        assert!(fx.pool.toggle_close_only(CONTROLLER, BTCUSD).unwrap());
        assert!(!fx.pool.toggle_close_only(CONTROLLER, BTCUSD).unwrap());
    }

    #[test]
    fn add_symbol_needs_a_price() {
        let mut fx = Fixture::new();
        let err = fx.pool.add_symbol(CONTROLLER, ethusd()).unwrap_err();
        assert_eq!(err, PoolError::Collaborator(CollaboratorError::PriceUnavailable(SymbolId(1))));
        assert_eq!(fx.pool.state().symbols.len(), 1);
    }

    #[test]
    fn option_symbol_priced_with_time_value() {
        let mut fx = Fixture::new();
        fx.set_price(SymbolId(1), dec!(2100));
        fx.vols.set_volatility(SymbolId(1), dec!(0.8));
        let spec = SymbolSpec::option("ETH-2000-C", dec!(2000), true, dec!(0.01), dec!(0.0005), dec!(0.0001), dec!(0.01));
        let id = fx.pool.add_symbol(CONTROLLER, spec).unwrap();

        let symbol = fx.pool.get_symbol(id).unwrap();
        assert!(symbol.is_option());
        assert_eq!(symbol.intrinsic_value, dec!(100));
        assert_eq!(symbol.price, dec!(184));
        assert_eq!(symbol.premium(), dec!(84));
    }

    #[test]
    fn parameters_update() {
        let mut fx = Fixture::new();
        let params = SymbolParams {
            fee_ratio: dec!(0.0005),
            funding_coefficient: dec!(0.00002),
            premium_funding_coefficient: Decimal::ZERO,
        };
        fx.pool.set_symbol_parameters(CONTROLLER, BTCUSD, params).unwrap();
        assert_eq!(fx.pool.get_symbol(BTCUSD).unwrap().fee_ratio, dec!(0.0005));

        let bad = SymbolParams { fee_ratio: dec!(1), ..params };
        assert!(matches!(
            fx.pool.set_symbol_parameters(CONTROLLER, BTCUSD, bad),
            Err(PoolError::InvalidAmount { what: "fee ratio", .. })
        ));
    }

    #[test]
    fn protocol_fee_collection() {
        let mut fx = Fixture::new();
        fx.fund_trader_base(dec!(1000));
        fx.pool.trade(TRADER, BTCUSD, dec!(100)).unwrap();
        let vault = fx.pool.state().vault.balance(USDT);

        assert_eq!(fx.pool.collect_protocol_fee().unwrap(), dec!(0.06));
        let accrued = fx.pool.get_protocol_fee_accrued();
        assert_eq!(accrued.collected, dec!(0.06));
        assert_eq!(accrued.uncollected, Decimal::ZERO);
        assert_eq!(fx.pool.state().vault.balance(USDT), vault - dec!(0.06));

        assert_eq!(fx.pool.collect_protocol_fee().unwrap(), Decimal::ZERO);
        assert_eq!(fx.pool.get_protocol_fee_accrued().collected, dec!(0.06));
    }
}
