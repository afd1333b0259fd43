//! Record store port trait.

use crate::domain::asset::AssetId;
use crate::domain::error::VatraderError;
use crate::domain::record::Record;

/// Durable, append-only storage of ledger records keyed by asset.
///
/// Implementations take `&self`; a store is shared by reference between the
/// engine that writes to it and the callers that read from it.
pub trait RecordStore {
    /// Persist one record. Must fail if `(asset, record.interval)` already exists.
    fn append(&self, asset: &AssetId, record: &Record) -> Result<(), VatraderError>;

    /// The record with the highest interval for `asset`, if any.
    fn latest(&self, asset: &AssetId) -> Result<Option<Record>, VatraderError>;

    /// All records for `asset` in interval order.
    fn history(&self, asset: &AssetId) -> Result<Vec<Record>, VatraderError>;

    /// Assets with at least one record, sorted.
    fn assets(&self) -> Result<Vec<AssetId>, VatraderError>;
}
