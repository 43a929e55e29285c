// thiserror-based error types for the posting API
use crate::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// Every slot of the fixed-capacity entry slab is live.
    #[error("resource exhausted: all {capacity} callback slots in use")]
    ResourceExhausted { capacity: usize },
    #[error("invalid {param}: {value}")]
    InvalidParameter { param: &'static str, value: Duration },
}

pub type Result<T> = std::result::Result<T, SchedError>;

pub(crate) fn check_delay(d: Duration) -> Result<Duration> {
    if d.is_negative() {
        return Err(SchedError::InvalidParameter { param: "delay", value: d });
    }
    Ok(d)
}

pub(crate) fn check_tolerance(t: Duration) -> Result<Duration> {
    if t.is_negative() {
        return Err(SchedError::InvalidParameter { param: "tolerance", value: t });
    }
    Ok(t)
}

pub(crate) fn check_period(p: Duration) -> Result<Duration> {
    if !p.is_positive() {
        return Err(SchedError::InvalidParameter { param: "period", value: p });
    }
    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::milliseconds;

    #[test]
    fn parameter_checks() {
        assert_eq!(check_delay(Duration::ZERO), Ok(Duration::ZERO));
        assert!(matches!(
            check_delay(milliseconds(-1)),
            Err(SchedError::InvalidParameter { param: "delay", .. })
        ));
        assert_eq!(check_tolerance(Duration::ZERO), Ok(Duration::ZERO));
        assert!(check_tolerance(milliseconds(-5)).is_err());
        assert!(check_period(Duration::ZERO).is_err());
        assert_eq!(check_period(milliseconds(1)), Ok(milliseconds(1)));
    }

    #[test]
    fn messages() {
        let e = SchedError::InvalidParameter { param: "period", value: milliseconds(0) };
        assert_eq!(e.to_string(), "invalid period: 0ms");
        let e = SchedError::ResourceExhausted { capacity: 4 };
        assert_eq!(e.to_string(), "resource exhausted: all 4 callback slots in use");
    }
}
