use clap::Subcommand;
use kudos_core::SubjectId;

use super::common::build_engine;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Profile, recent events, and active cooldowns
    Realtime {
        /// Subject as user_id:employee_id
        subject: SubjectId,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        StatsAction::Realtime { subject } => {
            let engine = build_engine()?;
            let stats = engine.get_realtime_stats(&subject)?;
            let json = serde_json::json!({
                "profile": stats.profile,
                "recent_events": stats.recent_events,
                "active_cooldowns": stats.active_cooldowns,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}
