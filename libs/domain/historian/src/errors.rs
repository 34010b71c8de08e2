// [libs/domain/historian/src/errors.rs]
/*!
 * APARATO: HISTORIAN ERROR CATALOG
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistorianError {
    #[error("[HIST_TAG_FAULT]: UNKNOWN_TAG -> {0}")]
    UnknownTag(String),

    #[error("[HIST_TAG_FAULT]: DUPLICATE_TAG -> {0} already registered")]
    DuplicateTag(String),

    #[error("[HIST_RANGE_FAULT]: INVALID_RANGE -> from must precede to")]
    InvalidRange,

    #[error("[HIST_STORE_FAULT]: {0}")]
    StoreUnavailable(String),
}
