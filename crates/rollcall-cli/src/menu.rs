use rollcall_core::ValidationError;
use std::fmt;

pub const MENU: &str = "
===== Attendance System =====
1. Register new person
2. Mark attendance manually
3. Start camera-based attendance
4. View attendance records
5. Exit
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Register,
    MarkManual,
    MarkLive,
    View,
    Exit,
}

impl MenuChoice {
    /// Exact match on "1" through "5"; only the line ending is stripped.
    pub fn parse(line: &str) -> Result<Self, ValidationError> {
        match line.trim_end_matches(['\r', '\n']) {
            "1" => Ok(MenuChoice::Register),
            "2" => Ok(MenuChoice::MarkManual),
            "3" => Ok(MenuChoice::MarkLive),
            "4" => Ok(MenuChoice::View),
            "5" => Ok(MenuChoice::Exit),
            other => Err(ValidationError::UnknownChoice(other.to_string())),
        }
    }
}

impl fmt::Display for MenuChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuChoice::Register => "register",
            MenuChoice::MarkManual => "manual attendance",
            MenuChoice::MarkLive => "camera attendance",
            MenuChoice::View => "view records",
            MenuChoice::Exit => "exit",
        };
        f.write_str(label)
    }
}
