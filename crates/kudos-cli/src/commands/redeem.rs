use clap::Args;
use kudos_core::SubjectId;

use super::common::build_engine;

#[derive(Args)]
pub struct RedeemArgs {
    /// Subject as user_id:employee_id
    pub subject: SubjectId,
    /// Reward identifier
    pub reward_id: String,
    /// Point cost of the reward
    pub cost: i64,
}

pub async fn run(args: RedeemArgs) -> Result<(), Box<dyn std::error::Error>> {
    let engine = build_engine()?;
    let outcome = engine
        .redeem_reward(&args.subject, &args.reward_id, args.cost)
        .await?;
    println!(
        "redeemed '{}' for {} point(s), {} remaining",
        args.reward_id, outcome.points_debited, outcome.profile.total_points,
    );
    Ok(())
}
