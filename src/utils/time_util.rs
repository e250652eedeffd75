use anyhow::anyhow;
use std::time::{SystemTime, UNIX_EPOCH};

/// seconds since `1970-1-1 00:00:00`, named as [UNIX_EPOCH],
/// in the 32-bit form every ext2 timestamp field uses
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(pub u32);

/// read the wall clock once
pub fn now() -> anyhow::Result<Timestamp> {
    Timestamp::try_from(SystemTime::now())
}

impl From<Timestamp> for u32 {
    fn from(value: Timestamp) -> Self {
        value.0
    }
}

impl From<u32> for Timestamp {
    fn from(value: u32) -> Self {
        Timestamp(value)
    }
}

impl TryFrom<SystemTime> for Timestamp {
    type Error = anyhow::Error;
    fn try_from(value: SystemTime) -> Result<Self, Self::Error> {
        match value.duration_since(UNIX_EPOCH) {
            Ok(duration) => u32::try_from(duration.as_secs()).map(Timestamp).map_err(|_| {
                anyhow!(
                    "{} seconds does not fit a 32-bit timestamp",
                    duration.as_secs()
                )
            }),
            Err(before_epoch_error) => Err(anyhow!(
                "doesn't support time before UNIX_EPOCH: {}",
                before_epoch_error
            )),
        }
    }
}
