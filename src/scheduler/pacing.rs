use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the scheduler spends the time between two steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingMode {
    /// Sleep for one frame interval after every step
    #[default]
    RealTime,

    /// Only yield to the runtime; runs as fast as rendering and encoding allow
    FreeRunning,
}

impl PacingMode {
    /// Suspend at the end of a step whose wall-clock budget is `budget`
    pub async fn wait(self, budget: Duration) {
        match self {
            Self::RealTime => tokio::time::sleep(budget).await,
            Self::FreeRunning => tokio::task::yield_now().await,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RealTime => "real_time",
            Self::FreeRunning => "free_running",
        }
    }
}

impl std::str::FromStr for PacingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "real_time" | "realtime" | "real-time" => Ok(Self::RealTime),
            "free_running" | "free" | "free-running" => Ok(Self::FreeRunning),
            other => Err(format!("unknown pacing mode '{}'", other)),
        }
    }
}
