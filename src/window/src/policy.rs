use bgen::{DecodeError, ErrorKind, ReaderError};

use crate::WindowError;

/// What the loader does when a variant cannot be read or decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Stop the stream on the first error.
    #[default]
    Abort,
    /// Log a warning, drop the variant and continue. Only applies to oversized blocks and per-variant
    /// I/O failures: malformed or inconsistent blocks still abort.
    SkipAndLog,
}

impl LoadPolicy {
    #[must_use]
    pub fn from_skip_invalid(skip_invalid: bool) -> Self {
        match skip_invalid {
            true  => Self::SkipAndLog,
            false => Self::Abort,
        }
    }

    /// Whether the loader may drop the offending variant and carry on.
    #[must_use]
    pub fn is_skippable(self, err: &anyhow::Error) -> bool {
        match self {
            Self::Abort      => false,
            Self::SkipAndLog => is_recoverable(err),
        }
    }
}

fn is_recoverable(err: &anyhow::Error) -> bool {
    if let Some(decode_error) = err.downcast_ref::<DecodeError>() {
        return decode_error.kind() == ErrorKind::Capacity
    }
    err.downcast_ref::<ReaderError>().is_some() || err.downcast_ref::<std::io::Error>().is_some()
}

/// Sizing of the sliding window, and loading behavior of the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    /// Distance in bp to keep loaded ahead of the current variant.
    pub upstream                 : u32,
    /// Distance in bp to keep behind the lowest active bound.
    pub downstream               : u32,
    /// Loading overshoot. With a factor of two, the buffer loads twice the upstream distance.
    pub upstream_loading_factor  : f64,
    /// Trimming slack. With a factor of two, trimming waits until twice the downstream distance is held.
    pub downstream_loading_factor: f64,
    /// Number of variants read and decoded per loading round.
    pub batch_size               : usize,
    /// Minor allele frequency threshold. Variants with no passing allele are never buffered.
    pub maf                      : f64,
    pub policy                   : LoadPolicy,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            upstream: 1_000_000,
            downstream: 1_000_000,
            upstream_loading_factor: 1.5,
            downstream_loading_factor: 1.05,
            batch_size: 1000,
            maf: 0.05,
            policy: LoadPolicy::Abort,
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<(), WindowError> {
        for (name, value) in [("upstream", self.upstream_loading_factor), ("downstream", self.downstream_loading_factor)] {
            if value.is_nan() || value < 1.0 {
                return Err(WindowError::InvalidLoadingFactor{name, value})
            }
        }
        if self.batch_size == 0 {
            return Err(WindowError::InvalidBatchSize)
        }
        if !(0.0..0.5).contains(&self.maf) {
            return Err(WindowError::InvalidMaf(self.maf))
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn default_config_is_valid() {
        assert!(WindowConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_config() {
        let config = WindowConfig{upstream_loading_factor: 0.9, ..Default::default()};
        assert_eq!(config.validate(), Err(WindowError::InvalidLoadingFactor{name: "upstream", value: 0.9}));

        let config = WindowConfig{downstream_loading_factor: f64::NAN, ..Default::default()};
        assert!(matches!(config.validate(), Err(WindowError::InvalidLoadingFactor{name: "downstream", ..})));

        let config = WindowConfig{batch_size: 0, ..Default::default()};
        assert_eq!(config.validate(), Err(WindowError::InvalidBatchSize));

        let config = WindowConfig{maf: 0.5, ..Default::default()};
        assert_eq!(config.validate(), Err(WindowError::InvalidMaf(0.5)));
    }

    #[test]
    fn skippable_errors() {
        let capacity = anyhow::Error::from(DecodeError::Capacity{variant_id: "v".into(), expected: 1, observed: 2})
            .context("While reading variant v");
        let io = anyhow::Error::from(ReaderError::VariantOutOfRange{index: 3, len: 2});
        let consistency = anyhow::Error::from(DecodeError::Consistency{
            variant_id: "v".into(), invariant: "sample count", expected: 3, observed: 4
        });
        let other = Err::<(), _>(anyhow::anyhow!("unrelated")).context("context").unwrap_err();

        assert!(LoadPolicy::SkipAndLog.is_skippable(&capacity));
        assert!(LoadPolicy::SkipAndLog.is_skippable(&io));
        assert!(!LoadPolicy::SkipAndLog.is_skippable(&consistency));
        assert!(!LoadPolicy::SkipAndLog.is_skippable(&other));
        assert!(!LoadPolicy::Abort.is_skippable(&capacity));
        assert!(!LoadPolicy::Abort.is_skippable(&io));
    }

    #[test]
    fn policy_from_flag() {
        assert_eq!(LoadPolicy::from_skip_invalid(true), LoadPolicy::SkipAndLog);
        assert_eq!(LoadPolicy::from_skip_invalid(false), LoadPolicy::Abort);
    }
}
