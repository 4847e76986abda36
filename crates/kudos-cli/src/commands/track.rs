use clap::Args;
use kudos_core::{ActivityType, SubjectId, TrackRequest, TrackResult};

use super::common::build_engine;

#[derive(Args)]
pub struct TrackArgs {
    /// Subject as user_id:employee_id
    pub subject: SubjectId,
    /// Activity type (e.g. message_sent, file_uploaded, daily_login)
    pub activity: ActivityType,
    /// Correlation id of the triggering entity
    #[arg(long)]
    pub ref_id: Option<String>,
}

pub async fn run(args: TrackArgs) -> Result<(), Box<dyn std::error::Error>> {
    let engine = build_engine()?;
    let mut request = TrackRequest::new(args.subject, args.activity);
    if let Some(ref_id) = args.ref_id {
        request = request.with_ref_id(ref_id);
    }

    match engine.track_activity(request).await? {
        TrackResult::Credited(outcome) => {
            println!(
                "credited {} point(s) (+{} bonus), total {}, level {}, streak {} day(s)",
                outcome.points_awarded,
                outcome.bonus_points,
                outcome.profile.total_points,
                outcome.profile.current_level,
                outcome.streak.streak_days,
            );
            for id in &outcome.unlocked_achievements {
                println!("achievement unlocked: {id}");
            }
        }
        TrackResult::Throttled(rejection) => {
            println!("throttled: {}", serde_json::to_string(&rejection)?);
        }
    }
    Ok(())
}
