//! Bar source port trait.

use crate::domain::error::VatraderError;
use crate::domain::feed::RawBar;

pub trait BarSource {
    /// Raw bars for `symbol` in feed order. Individual bars may be malformed;
    /// only a failure to read the source as a whole is an error.
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<RawBar>, VatraderError>;
}
