//! The exchange-rate oracle collaborator interface.

/// Supplies the EC/FCT exchange rate at a given height. The pricing
/// mechanism itself lives outside the core.
pub trait ExchangeRateOracle {
    /// Entry credits granted per factoid kilo-unit at `height`.
    fn ec_exchange_rate(&self, height: u32) -> u64;
}

/// A constant-rate oracle for tests and local networks.
#[derive(Debug, Clone, Copy)]
pub struct FixedRateOracle(pub u64);

impl ExchangeRateOracle for FixedRateOracle {
    fn ec_exchange_rate(&self, _height: u32) -> u64 {
        self.0
    }
}
