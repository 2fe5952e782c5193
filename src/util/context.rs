//! Per-build context threaded through the pipeline.
//!
//! One `BuildContext` is created per hook invocation and passed explicitly
//! through resolve, merge, and assembly. Nothing here is process-global, so
//! repeated invocations in one process cannot leak state between builds.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Default archive timestamp: 2016-01-01 00:00:00 UTC.
///
/// Generated archive entries get this fixed time rather than the wall
/// clock, so building the same tree twice yields identical bytes.
const DEFAULT_EPOCH: i64 = 1_451_606_400;

/// Context for one build invocation.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Project root directory (where the root configuration file lives)
    root: PathBuf,

    /// Fixed timestamp applied to every archive entry
    timestamp: ArchiveTimestamp,
}

impl BuildContext {
    /// Create a context for a project root, honouring `SOURCE_DATE_EPOCH`
    /// when the environment sets it.
    pub fn new(root: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("project root not found: {}", root.display()))?;

        let epoch = std::env::var("SOURCE_DATE_EPOCH")
            .ok()
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(DEFAULT_EPOCH);

        Ok(BuildContext {
            root,
            timestamp: ArchiveTimestamp::from_epoch(epoch),
        })
    }

    /// Create a context with an explicit timestamp (tests).
    pub fn with_epoch(root: &Path, epoch: i64) -> Result<Self> {
        let mut ctx = Self::new(root)?;
        ctx.timestamp = ArchiveTimestamp::from_epoch(epoch);
        Ok(ctx)
    }

    /// The project root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The fixed archive timestamp.
    pub fn timestamp(&self) -> ArchiveTimestamp {
        self.timestamp
    }

    /// Generator string recorded in the wheel's WHEEL file.
    pub fn generator(&self) -> String {
        format!("wharf {}", env!("CARGO_PKG_VERSION"))
    }
}

/// A fixed archive timestamp, usable for both tar (epoch seconds) and zip
/// (calendar fields, which cannot represent dates before 1980).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveTimestamp {
    epoch: i64,
    calendar: (u16, u8, u8, u8, u8, u8),
}

impl ArchiveTimestamp {
    /// Build from Unix epoch seconds.
    pub fn from_epoch(epoch: i64) -> Self {
        let epoch = epoch.max(0);
        let (year, month, day, hour, minute, second) = civil_from_epoch(epoch);
        // zip's MS-DOS time starts at 1980
        let calendar = if year < 1980 {
            (1980, 1, 1, 0, 0, 0)
        } else {
            (year, month, day, hour, minute, second)
        };
        ArchiveTimestamp { epoch, calendar }
    }

    /// Epoch seconds, for tar headers.
    pub fn epoch(&self) -> u64 {
        self.epoch as u64
    }

    /// Calendar fields `(year, month, day, hour, minute, second)`, for zip
    /// headers.
    pub fn calendar(&self) -> (u16, u8, u8, u8, u8, u8) {
        self.calendar
    }
}

/// Convert epoch seconds to UTC calendar fields.
fn civil_from_epoch(epoch: i64) -> (u16, u8, u8, u8, u8, u8) {
    let days = epoch.div_euclid(86_400);
    let secs = epoch.rem_euclid(86_400);

    // Howard Hinnant's civil_from_days
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if m <= 2 { y + 1 } else { y };

    (
        year as u16,
        m as u8,
        d as u8,
        (secs / 3600) as u8,
        ((secs % 3600) / 60) as u8,
        (secs % 60) as u8,
    )
}
