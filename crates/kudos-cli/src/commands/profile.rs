use clap::Subcommand;
use kudos_core::storage::GamificationStore;
use kudos_core::{ActivityType, SubjectId};

use super::common::{build_engine, open_store};

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Show a subject's profile
    Show {
        /// Subject as user_id:employee_id
        subject: SubjectId,
    },
    /// Show a subject's points history, oldest first
    History {
        /// Subject as user_id:employee_id
        subject: SubjectId,
        /// Only entries of this activity type
        #[arg(long)]
        activity: Option<ActivityType>,
    },
}

pub fn run(action: ProfileAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ProfileAction::Show { subject } => {
            let engine = build_engine()?;
            let profile = engine.get_profile(&subject)?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        ProfileAction::History { subject, activity } => {
            let store = open_store()?;
            let entries = store.query_history(&subject, activity.as_ref(), None)?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }
    Ok(())
}
