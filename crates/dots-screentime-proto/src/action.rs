use std::fmt;

/// Operations the daemon answers over the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Ping,
    GetTodaySummary,
    GetUsageByDate,
    GetWeeklySummary,
    GetAppDetails,
    GetRecentSessions,
    GetLimitRules,
    UpsertLimitRule,
    AddExtraTime,
    StartFocus,
    StopFocus,
    GetFocusStatus,
    GetNotifications,
    ExportData,
    ClearData,
    VerifyPin,
    SetPin,
    /// Any name this build does not recognise
    Unknown,
}

impl Action {
    pub const ALL: [Action; 17] = [
        Action::Ping,
        Action::GetTodaySummary,
        Action::GetUsageByDate,
        Action::GetWeeklySummary,
        Action::GetAppDetails,
        Action::GetRecentSessions,
        Action::GetLimitRules,
        Action::UpsertLimitRule,
        Action::AddExtraTime,
        Action::StartFocus,
        Action::StopFocus,
        Action::GetFocusStatus,
        Action::GetNotifications,
        Action::ExportData,
        Action::ClearData,
        Action::VerifyPin,
        Action::SetPin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Ping => "Ping",
            Action::GetTodaySummary => "GetTodaySummary",
            Action::GetUsageByDate => "GetUsageByDate",
            Action::GetWeeklySummary => "GetWeeklySummary",
            Action::GetAppDetails => "GetAppDetails",
            Action::GetRecentSessions => "GetRecentSessions",
            Action::GetLimitRules => "GetLimitRules",
            Action::UpsertLimitRule => "UpsertLimitRule",
            Action::AddExtraTime => "AddExtraTime",
            Action::StartFocus => "StartFocus",
            Action::StopFocus => "StopFocus",
            Action::GetFocusStatus => "GetFocusStatus",
            Action::GetNotifications => "GetNotifications",
            Action::ExportData => "ExportData",
            Action::ClearData => "ClearData",
            Action::VerifyPin => "VerifyPin",
            Action::SetPin => "SetPin",
            Action::Unknown => "Unknown",
        }
    }

    /// Look up an action by its wire name. Matching is exact.
    pub fn from_name(name: &str) -> Action {
        Action::ALL.iter().copied().find(|action| action.as_str() == name).unwrap_or(Action::Unknown)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
