use super::{Next, Stage};
use crate::error::Result;
use crate::types::MessageContext;
use chrono::Timelike;
use serde::{Deserialize, Serialize};

/// Skip messages that arrive during a configured quiet-hours window, in the
/// server's local time. `start_hour > end_hour` models an overnight window
/// (e.g. 22 to 7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub quiet_start_hour: u32,
    pub quiet_end_hour: u32,
}

pub struct ScheduleStage {
    config: Config,
}

impl ScheduleStage {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn in_quiet_hours(&self, hour: u32) -> bool {
        if self.config.quiet_start_hour == self.config.quiet_end_hour {
            return false;
        }
        if self.config.quiet_start_hour < self.config.quiet_end_hour {
            hour >= self.config.quiet_start_hour && hour < self.config.quiet_end_hour
        } else {
            hour >= self.config.quiet_start_hour || hour < self.config.quiet_end_hour
        }
    }
}

#[async_trait::async_trait]
impl Stage for ScheduleStage {
    async fn execute<'a>(&'a self, ctx: &'a mut MessageContext, next: Next<'a>) -> Result<()> {
        let hour = chrono::Local::now().hour();
        if self.in_quiet_hours(hour) {
            ctx.skip(format!(
                "schedule stage: hour {hour} falls within quiet hours {}-{}",
                self.config.quiet_start_hour, self.config.quiet_end_hour
            ));
            return Ok(());
        }
        next.run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overnight_window_wraps_past_midnight() {
        let stage = ScheduleStage::new(Config {
            quiet_start_hour: 22,
            quiet_end_hour: 7,
        });
        assert!(stage.in_quiet_hours(23));
        assert!(stage.in_quiet_hours(3));
        assert!(!stage.in_quiet_hours(12));
    }

    #[test]
    fn same_hour_window_never_quiets() {
        let stage = ScheduleStage::new(Config {
            quiet_start_hour: 5,
            quiet_end_hour: 5,
        });
        assert!(!stage.in_quiet_hours(5));
    }

    #[test]
    fn daytime_window_does_not_wrap() {
        let stage = ScheduleStage::new(Config {
            quiet_start_hour: 9,
            quiet_end_hour: 17,
        });
        assert!(stage.in_quiet_hours(10));
        assert!(!stage.in_quiet_hours(20));
    }
}
