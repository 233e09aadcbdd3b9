//! Commission split calculation.
//!
//! Pure and table-driven: the direct, pool and platform shares are fixed
//! percentages per track, the override share is a flat amount per sale.

use serde::Serialize;

use crate::{entity::Track, prelude::*};

/// Flat override commission paid to the second-level referrer.
///
/// Sized as 10% of the $7 product and NOT scaled with the sale amount;
/// revisit it if product pricing changes.
pub const OVERRIDE_COMMISSION_CENTS: i64 = 70;

/// Platform fee for tracks without their own fee, in percent.
pub const BASE_PLATFORM_FEE_PERCENT: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rates {
  pub direct_percent: i64,
  pub pool_percent: i64,
  pub platform_fee_percent: i64,
}

impl Rates {
  pub const fn of(track: Track) -> Rates {
    match track {
      Track::CommunityBuilder => Rates {
        direct_percent: 30,
        pool_percent: 40,
        platform_fee_percent: BASE_PLATFORM_FEE_PERCENT,
      },
      Track::HighPerformer => Rates {
        direct_percent: 40,
        pool_percent: 30,
        platform_fee_percent: BASE_PLATFORM_FEE_PERCENT,
      },
      Track::Independent => {
        Rates { direct_percent: 60, pool_percent: 0, platform_fee_percent: 30 }
      }
    }
  }

  /// Rates applied to an unrecognised track: nothing to the affiliate,
  /// the base platform fee still applies.
  pub const UNKNOWN: Rates = Rates {
    direct_percent: 0,
    pool_percent: 0,
    platform_fee_percent: BASE_PLATFORM_FEE_PERCENT,
  };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Split {
  pub direct_commission_cents: i64,
  pub override_commission_cents: i64,
  pub pool_contribution_cents: i64,
  pub platform_fee_cents: i64,
  /// Raw track value of the direct referrer, snapshotted as given.
  pub direct_track: String,
}

impl Split {
  pub fn calculate(
    amount_cents: i64,
    direct_track: &str,
    has_override: bool,
  ) -> Split {
    let rates = match Track::parse(direct_track) {
      Some(track) => Rates::of(track),
      None => {
        error!(
          track = direct_track,
          "Unknown affiliate track, paying no direct commission"
        );
        Rates::UNKNOWN
      }
    };

    Split {
      direct_commission_cents: percent(amount_cents, rates.direct_percent),
      override_commission_cents: if has_override {
        OVERRIDE_COMMISSION_CENTS
      } else {
        0
      },
      pool_contribution_cents: percent(amount_cents, rates.pool_percent),
      platform_fee_cents: percent(amount_cents, rates.platform_fee_percent),
      direct_track: direct_track.to_string(),
    }
  }
}

// Widened so no sale amount can overflow; rates never exceed 100%, so
// the result fits back into i64.
fn percent(amount_cents: i64, percent: i64) -> i64 {
  (i128::from(amount_cents) * i128::from(percent) / 100) as i64
}
