pub mod aggregates;
pub mod apps;
pub mod focus;
pub mod intercepts;
pub mod rules;
pub mod sessions;
pub mod settings;

pub use aggregates::AggregateQueries;
pub use apps::AppQueries;
pub use focus::FocusQueries;
pub use intercepts::InterceptQueries;
pub use rules::RuleQueries;
pub use sessions::SessionQueries;
pub use settings::SettingsQueries;
