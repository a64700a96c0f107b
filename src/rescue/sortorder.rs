//! Sort-order guard for the positional rescue pass (spec §4.5, §8 property 8).

use crate::config::CmpKey;
use crate::error::{Error, Result};

/// Fails immediately, before any record is read, if the BAM header's declared `@HD SO:` value
/// does not match the configured [`CmpKey`]'s required literal.
pub fn check_sort_order(declared: &str, expected: CmpKey) -> Result<()> {
    let want = expected.sort_order_tag();
    if declared == want {
        Ok(())
    } else {
        Err(Error::SortOrder {
            declared: declared.to_string(),
            expected: want.to_string(),
        })
    }
}
