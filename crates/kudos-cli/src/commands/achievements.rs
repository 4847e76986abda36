use clap::Subcommand;

use super::common::load_catalog;

#[derive(Subcommand)]
pub enum AchievementsAction {
    /// List the achievement catalog
    List,
}

pub fn run(action: AchievementsAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AchievementsAction::List => {
            let catalog = load_catalog()?;
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
    }
    Ok(())
}
