//! Enrollment periods and the interval algebra applied to them.
//!
//! Periods are closed on both ends. Two periods that touch, or that are one
//! microsecond apart, are contiguous and merge into one.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// 1900-01-01T00:00:00Z and 2100-01-01T00:00:00Z.
const T_MIN_SECS: i64 = -2_208_988_800;
const T_MAX_SECS: i64 = 4_102_444_800;

/// Lower bound of every enrollment.
pub fn t_min() -> DateTime<Utc> {
  DateTime::<Utc>::from_timestamp(T_MIN_SECS, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Upper bound of every enrollment.
pub fn t_max() -> DateTime<Utc> {
  DateTime::<Utc>::from_timestamp(T_MAX_SECS, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Smallest gap still considered contiguous.
fn tick() -> Duration { Duration::microseconds(1) }

/// A closed interval `[start, end]` inside `[t_min(), t_max()]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
  pub start: DateTime<Utc>,
  pub end:   DateTime<Utc>,
}

impl Period {
  /// Build a period, defaulting absent bounds to [`t_min`] / [`t_max`].
  ///
  /// Fails with [`Error::InvalidValue`] when either bound lies outside the
  /// registry range or when `start > end`.
  pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<Self> {
    let start = start.unwrap_or_else(t_min);
    let end = end.unwrap_or_else(t_max);

    for (label, value) in [("start", start), ("end", end)] {
      if value < t_min() || value > t_max() {
        return Err(Error::invalid(format!(
          "{label} date {} is out of bounds",
          value.to_rfc3339_opts(SecondsFormat::Secs, true)
        )));
      }
    }
    if start > end {
      return Err(Error::invalid(format!(
        "start date {} cannot be greater than end date {}",
        start.to_rfc3339_opts(SecondsFormat::Secs, true),
        end.to_rfc3339_opts(SecondsFormat::Secs, true)
      )));
    }
    Ok(Self { start, end })
  }

  /// `[t_min(), t_max()]`.
  pub fn full() -> Self { Self { start: t_min(), end: t_max() } }

  /// Clamp arbitrary bounds into the registry range. Used by importers whose
  /// sources may carry dates outside of it.
  pub fn bounded(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
    Self {
      start: start.max(t_min()),
      end:   end.min(t_max()),
    }
  }

  /// Both periods share at least one instant.
  pub fn overlaps(&self, other: &Period) -> bool {
    self.start <= other.end && other.start <= self.end
  }

  /// Overlapping or separated by no more than one microsecond.
  pub fn touches(&self, other: &Period) -> bool {
    self.start <= other.end + tick() && other.start <= self.end + tick()
  }

  /// `other` lies entirely inside `self`, endpoints included.
  pub fn contains(&self, other: &Period) -> bool {
    self.start <= other.start && other.end <= self.end
  }

  /// Smallest period covering both.
  pub fn span(&self, other: &Period) -> Period {
    Period {
      start: self.start.min(other.start),
      end:   self.end.max(other.end),
    }
  }

  /// What remains of `self` once `cut` is removed: zero, one, or two periods.
  ///
  /// The surviving pieces keep the boundaries of `cut` as their own endpoints,
  /// so withdrawing `[2014, 2016]` from `[2010, 2018]` leaves `[2010, 2014]`
  /// and `[2016, 2018]`. The two pieces never share an instant: a single
  /// instant cut inside `self` starts the right piece one microsecond later.
  ///
  /// A cut that only meets `self` at one of its endpoints leaves it unchanged.
  pub fn subtract(&self, cut: &Period) -> Vec<Period> {
    if !self.overlaps(cut) {
      return vec![*self];
    }
    let mut rest = Vec::with_capacity(2);
    if self.start < cut.start {
      rest.push(Period { start: self.start, end: cut.start });
    }
    if cut.end < self.end {
      let start = match rest.last() {
        Some(left) if left.end == cut.end => cut.end + tick(),
        _ => cut.end,
      };
      rest.push(Period { start, end: self.end });
    }
    rest
  }

  /// Removing `cut` would change `self`.
  pub fn is_cut_by(&self, cut: &Period) -> bool {
    self.subtract(cut) != [*self]
  }
}

/// Union a set of periods: contiguous or overlapping members are replaced by
/// their span until no two remaining periods touch. The result is sorted by
/// `(start, end)` and free of duplicates.
pub fn merge(periods: impl IntoIterator<Item = Period>) -> Vec<Period> {
  let mut sorted: Vec<Period> = periods.into_iter().collect();
  sorted.sort();

  let mut merged: Vec<Period> = Vec::with_capacity(sorted.len());
  for p in sorted {
    match merged.last_mut() {
      Some(last) if last.touches(&p) => *last = last.span(&p),
      _ => merged.push(p),
    }
  }
  merged
}
